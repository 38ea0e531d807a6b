use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use approx::assert_abs_diff_eq;
use byteorder::{LittleEndian, WriteBytesExt};
use mocap_core::{Acquisition, Event, MetaDataInfo, PointType};

use crate::binary::ByteOrder;
use crate::errors::CodecError;
use crate::file_io::{AcquisitionFileIO, StorageFormat};
use crate::formats::{C3dFileIO, C3dWriteOptions, GrxFileIO, TrcFileIO};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

fn sample_trial() -> Acquisition {
    let mut acq = Acquisition::new();
    acq.init(2, 5, 2, 2).unwrap();
    acq.set_point_frequency(100.0).unwrap();
    acq.set_first_frame(3).unwrap();
    for (i, point) in acq.points_mut().iter_mut().enumerate() {
        point.label = format!("M{}", i + 1);
        point.description = "heel".to_owned();
        for frame in 0..5 {
            let f = frame as f64;
            point
                .set_frame(frame, [10.0 * i as f64 + f, -2.5 * f, 1000.0], 0.5)
                .unwrap();
            point.masks_mut()[frame] = 3.0;
        }
    }
    acq.points_mut()[1].invalidate(2).unwrap();
    acq.points_mut()[1].kind = PointType::Angle;
    for (c, analog) in acq.analogs_mut().iter_mut().enumerate() {
        analog.label = format!("EMG{}", c + 1);
        analog.unit = "mV".to_owned();
        let values: Vec<f64> = (0..10).map(|s| (s + c) as f64 * 0.25 - 1.0).collect();
        analog.set_values(&values);
    }
    acq.append_event(Event::new("Foot Strike", 0.03, "Right"));
    acq.metadata_mut()
        .set_info("SUBJECTS.NAMES", MetaDataInfo::strings(["Jane"]))
        .unwrap();
    acq
}

fn write_then_read(acq: &Acquisition, options: C3dWriteOptions, path: &Path) -> (Acquisition, C3dFileIO) {
    C3dFileIO::with_options(options).write(path, acq).unwrap();
    let mut io = C3dFileIO::new();
    assert!(io.can_read_file(path));
    let read = io.read(path).unwrap();
    (read, io)
}

#[test]
fn trc_fixture_marks_empty_cells_as_occluded() {
    let path = fixture("walk.trc");
    let mut io = TrcFileIO::new();
    assert!(io.can_read_file(&path));

    let acq = io.read(&path).unwrap();
    assert_eq!(acq.point_number(), 2);
    assert_eq!(acq.point_frame_number(), 4);
    assert_eq!(acq.first_frame(), 12);
    assert_eq!(acq.point_frequency(), 50.0);
    assert_eq!(acq.point_unit(PointType::Marker), "mm");

    let heel = acq.find_point("LHEE").unwrap();
    assert_eq!(heel.values()[0], [101.5, -12.25, 50.0]);
    assert!((0..4).all(|frame| heel.is_valid(frame)));

    let right = acq.find_point("RHEE").unwrap();
    assert_eq!(right.residuals(), &[0.0, -1.0, -1.0, 0.0]);
    assert_eq!(right.values()[1], [0.0; 3]);
    assert_eq!(right.values()[3], [304.0, 13.5, 52.5]);
}

#[test]
fn trc_writes_only_markers_and_keeps_occlusions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copy.trc");
    let acq = sample_trial();
    TrcFileIO::new().write(&path, &acq).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("PathFileType\t4\t(X/Y/Z)\tcopy.trc"));

    let read = TrcFileIO::new().read(&path).unwrap();
    assert_eq!(read.point_number(), 1);
    assert_eq!(read.point_frame_number(), 5);
    assert_eq!(read.first_frame(), 3);
    assert_eq!(read.points()[0].label, "M1");
    assert_eq!(read.points()[0].values()[4], [4.0, -10.0, 1000.0]);

    let mut occluded = sample_trial();
    occluded.points_mut()[0].invalidate(1).unwrap();
    TrcFileIO::new().write(&path, &occluded).unwrap();
    let read = TrcFileIO::new().read(&path).unwrap();
    assert!(!read.points()[0].is_valid(1));
    assert!(read.points()[0].is_valid(2));
}

#[test]
fn trc_header_keywords_must_match_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.trc");
    fs::write(
        &path,
        "PathFileType\t4\n\
         DataRate\tNumFrames\tNumMarkers\n\
         100\t2\n",
    )
    .unwrap();
    let err = TrcFileIO::new().read(&path).unwrap_err();
    assert_eq!(err.to_string(), "Error between TRC header keywords and values.");
}

#[test]
fn trc_refuses_to_write_without_frequency() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nofreq.trc");
    let mut acq = Acquisition::new();
    acq.init(1, 3, 0, 1).unwrap();
    let err = TrcFileIO::new().write(&path, &acq).unwrap_err();
    assert!(matches!(err, CodecError::Inconsistent { .. }));
    assert!(!path.exists());

    let err = TrcFileIO::new().write(&path, &Acquisition::new()).unwrap_err();
    assert!(matches!(err, CodecError::Inconsistent { .. }));
}

#[test]
fn c3d_float_storage_keeps_every_collection() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.c3d");
    let acq = sample_trial();
    let (read, io) = write_then_read(&acq, C3dWriteOptions::default(), &path);

    assert_eq!(io.byte_order(), Some(ByteOrder::IeeeLittleEndian));
    assert_eq!(io.storage_format(), Some(StorageFormat::Float));
    assert_eq!(fs::metadata(&path).unwrap().len() % 512, 0);

    assert_eq!(read.point_number(), 2);
    assert_eq!(read.point_frame_number(), 5);
    assert_eq!(read.first_frame(), 3);
    assert_eq!(read.last_frame(), 7);
    assert_eq!(read.point_frequency(), 100.0);
    assert_eq!(read.analog_sample_ratio(), 2);
    assert_eq!(read.analog_frequency(), 200.0);

    let m1 = &read.points()[0];
    assert_eq!(m1.label, "M1");
    assert_eq!(m1.description, "heel");
    assert_eq!(m1.kind, PointType::Marker);
    for frame in 0..5 {
        for axis in 0..3 {
            assert_abs_diff_eq!(
                m1.values()[frame][axis],
                acq.points()[0].values()[frame][axis],
                epsilon = 1e-4
            );
        }
        assert_abs_diff_eq!(m1.residuals()[frame], 0.5, epsilon = 1e-6);
        assert_eq!(m1.masks()[frame], 3.0);
    }

    let m2 = &read.points()[1];
    assert_eq!(m2.kind, PointType::Angle);
    assert!(!m2.is_valid(2));
    assert_eq!(m2.values()[2], [0.0; 3]);
    assert!(m2.is_valid(3));

    for (read, original) in read.analogs().iter().zip(acq.analogs()) {
        assert_eq!(read.label, original.label);
        assert_eq!(read.unit, "mV");
        assert_eq!(read.values(), original.values());
    }

    assert_eq!(read.event_number(), 1);
    let event = &read.events()[0];
    assert_eq!(event.label, "Foot Strike");
    assert_eq!(event.context, "Right");
    assert_abs_diff_eq!(event.time, 0.03, epsilon = 1e-6);

    let names = read.metadata().find_info("SUBJECTS.NAMES").unwrap();
    assert_eq!(names.to_strings(), ["Jane"]);
    assert_eq!(
        read.metadata().find_info("POINT.USED").unwrap().first_i32(),
        Some(2)
    );
}

#[test]
fn c3d_integer_big_endian_stays_within_the_scale_factor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.c3d");
    let acq = sample_trial();
    let options = C3dWriteOptions {
        byte_order: ByteOrder::IeeeBigEndian,
        storage: StorageFormat::Integer,
    };
    let (read, io) = write_then_read(&acq, options, &path);
    assert_eq!(io.byte_order(), Some(ByteOrder::IeeeBigEndian));
    assert_eq!(io.storage_format(), Some(StorageFormat::Integer));

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes[1], 0x50);
    assert_eq!(bytes[512 + 3], 86);

    let scale = 1000.0 / 32000.0;
    for (read, original) in read.points().iter().zip(acq.points()) {
        for frame in 0..5 {
            assert_eq!(read.is_valid(frame), original.is_valid(frame));
            for axis in 0..3 {
                assert_abs_diff_eq!(
                    read.values()[frame][axis],
                    original.values()[frame][axis],
                    epsilon = scale
                );
            }
        }
    }
    for (read, original) in read.analogs().iter().zip(acq.analogs()) {
        let largest = original.values().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        for (r, o) in read.values().iter().zip(original.values()) {
            assert_abs_diff_eq!(*r, *o, epsilon = largest / 32000.0);
        }
    }
}

#[test]
fn c3d_vax_files_are_recognised() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vax.c3d");
    let options = C3dWriteOptions {
        byte_order: ByteOrder::VaxLittleEndian,
        storage: StorageFormat::Float,
    };
    let (read, io) = write_then_read(&sample_trial(), options, &path);
    assert_eq!(io.byte_order(), Some(ByteOrder::VaxLittleEndian));
    assert_abs_diff_eq!(read.points()[0].values()[1][1], -2.5, epsilon = 1e-5);
    assert_eq!(read.point_frequency(), 100.0);
}

#[test]
fn c3d_rewrite_replaces_stale_label_continuations() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.c3d");
    let mut acq = sample_trial();
    acq.metadata_mut()
        .set_info("POINT.LABELS2", MetaDataInfo::strings(["STALE"]))
        .unwrap();
    let (read, _) = write_then_read(&acq, C3dWriteOptions::default(), &path);
    assert!(read.metadata().find("POINT.LABELS2").is_none());
    assert_eq!(read.point_number(), 2);
    assert_eq!(read.points()[1].label, "M2");
}

#[test]
fn c3d_bad_header_key_is_reported_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.c3d");
    let mut bytes = vec![0u8; 1024];
    bytes[0] = 2;
    bytes[1] = 0x51;
    bytes[512 + 3] = 84;
    fs::write(&path, &bytes).unwrap();

    let mut io = C3dFileIO::new();
    assert!(!io.can_read_file(&path));
    let err = io.read(&path).unwrap_err();
    assert!(matches!(err, CodecError::InvalidHeader { codec: "C3D", .. }));
    assert_eq!(err.to_string(), "Invalid header key.");

    let err: mocap_core::Error = err.into();
    assert!(err.is_codec_error());
    assert_eq!(err.what(), "Invalid header key.");
}

#[test]
fn c3d_truncated_data_is_an_unexpected_end_of_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.c3d");
    C3dFileIO::new().write(&path, &sample_trial()).unwrap();
    let bytes = fs::read(&path).unwrap();
    let data_start = 512 * (u16::from_le_bytes([bytes[16], bytes[17]]) as usize - 1);
    fs::write(&path, &bytes[..data_start + 8]).unwrap();

    let err = C3dFileIO::new().read(&path).unwrap_err();
    assert!(matches!(err, CodecError::UnexpectedEof { .. }));
}

#[test]
fn c3d_frame_counts_beyond_the_file_size_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.c3d");
    C3dFileIO::new().write(&path, &sample_trial()).unwrap();
    let mut bytes = fs::read(&path).unwrap();
    // last frame and analog sample ratio
    bytes[8..10].copy_from_slice(&u16::MAX.to_le_bytes());
    bytes[18..20].copy_from_slice(&u16::MAX.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = C3dFileIO::new().read(&path).unwrap_err();
    assert!(matches!(err, CodecError::UnexpectedEof { codec: "C3D" }));
}

#[test]
fn trc_frame_count_larger_than_the_rows_is_an_unexpected_end_of_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("huge.trc");
    fs::write(
        &path,
        "PathFileType\t4\t(X/Y/Z)\thuge.trc\n\
         DataRate\tNumFrames\tNumMarkers\tUnits\n\
         100\t4000000000000000000\t1\tmm\n\
         Frame#\tTime\tC7\n\
         \t\tX1\tY1\tZ1\n\
         1\t0.000\t1.0\t2.0\t3.0\n",
    )
    .unwrap();
    let mut io = TrcFileIO::new();
    assert!(io.can_read_file(&path));
    let err = io.read(&path).unwrap_err();
    assert!(matches!(err, CodecError::UnexpectedEof { codec: "TRC" }));
}

fn grx_bytes(frames: u16, rows: &[[f32; 6]]) -> Vec<u8> {
    let mut header = vec![0u8; 512];
    {
        let mut put = |offset: usize, bytes: &[u8]| {
            header[offset..offset + bytes.len()].copy_from_slice(bytes);
        };
        put(0, &frames.to_le_bytes());
        put(2, &100u16.to_le_bytes());
        put(54, &500u16.to_le_bytes());
        for (i, value) in [600.0f32, 400.0, 50.0].iter().enumerate() {
            put(136 + 4 * i, &value.to_le_bytes());
        }
        let corners = [
            300.0f32, 200.0, 0.0, -300.0, 200.0, 0.0, -300.0, -200.0, 0.0, 300.0, -200.0, 0.0,
        ];
        for (i, value) in corners.iter().enumerate() {
            put(148 + 4 * i, &value.to_le_bytes());
        }
    }
    for row in rows {
        for value in row {
            header.write_f32::<LittleEndian>(*value).unwrap();
        }
    }
    header
}

#[test]
fn grx_channels_are_remapped_to_the_laboratory_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.gr2");
    let rows = [[1.0, 2.0, -700.0, 310.0, 180.0, 5.0], [0.0; 6]];
    fs::write(&path, grx_bytes(2, &rows)).unwrap();

    let mut io = GrxFileIO::new();
    assert!(io.can_read_file(&path));
    assert!(!io.can_write_file(&path));
    let acq = io.read(&path).unwrap();
    let err = io.write(&dir.path().join("copy.gr2"), &acq).unwrap_err();
    assert!(matches!(err, CodecError::WriteUnsupported { codec: "GRx" }));

    assert_eq!(acq.analog_number(), 6);
    assert_eq!(acq.point_frame_number(), 2);
    assert_eq!(acq.point_frequency(), 100.0);
    assert_eq!(acq.first_frame(), 51);
    let labels: Vec<&str> = acq.analogs().iter().map(|a| a.label.as_str()).collect();
    assert_eq!(labels, ["Fx2", "Fy2", "Fz2", "Px2", "Py2", "Mz2"]);
    assert_eq!(acq.analogs()[5].unit, "Nmm");

    let first: Vec<f64> = acq.analogs().iter().map(|a| a.values()[0]).collect();
    assert_eq!(first, [-2.0, 1.0, 700.0, 120.0, 110.0, 5.0]);

    let metadata = acq.metadata();
    assert_eq!(
        metadata.find_info("FORCE_PLATFORM.TYPE").unwrap().to_i32s(),
        [1]
    );
    assert_eq!(
        metadata.find_info("FORCE_PLATFORM.ORIGIN").unwrap().to_f64s(),
        [300.0, 200.0, -25.0]
    );
    assert_eq!(
        metadata.find_info("FORCE_PLATFORM.CORNERS").unwrap().dimensions(),
        [3, 4, 1]
    );
}

#[test]
fn grx_probe_checks_the_declared_length() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trial.gr1");
    let mut file = fs::File::create(&path).unwrap();
    file.write_all(&grx_bytes(3, &[[0.0; 6]; 2])).unwrap();
    drop(file);
    assert!(!GrxFileIO::new().can_read_file(&path));

    let renamed = dir.path().join("trial.dat");
    fs::write(&renamed, grx_bytes(1, &[[0.0; 6]])).unwrap();
    assert!(!GrxFileIO::new().can_read_file(&renamed));
}
