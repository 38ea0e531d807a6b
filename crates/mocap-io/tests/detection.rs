use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use mocap_core::{Acquisition, ErrorKind};
use mocap_io::{
    AcquisitionFileIO, AcquisitionFileReader, C3dFileIO, GrxFileIO, Registry, TrcFileIO,
};

fn trial() -> Result<Acquisition> {
    let mut acq = Acquisition::new();
    acq.init(1, 3, 0, 1)?;
    acq.set_point_frequency(60.0)?;
    acq.points_mut()[0].label = "C7".to_owned();
    for frame in 0..3 {
        acq.points_mut()[0].set_frame(frame, [frame as f64, 1.0, 2.0], 0.0)?;
    }
    Ok(acq)
}

fn codecs() -> Vec<Box<dyn AcquisitionFileIO>> {
    vec![
        Box::new(C3dFileIO::new()),
        Box::new(TrcFileIO::new()),
        Box::new(GrxFileIO::new()),
    ]
}

#[test]
fn probes_reject_empty_missing_and_zero_length_paths() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let empty = dir.path().join("empty.c3d");
    fs::write(&empty, b"")?;
    let candidates: [PathBuf; 4] = [
        PathBuf::new(),
        dir.path().join("missing.trc"),
        empty,
        dir.path().to_path_buf(),
    ];
    for io in codecs() {
        for path in &candidates {
            assert!(!io.can_read_file(path), "{} accepted {:?}", io.name(), path);
        }
        assert!(!io.can_write_file(Path::new("")));
    }
    assert!(Registry::default().detect_reader(&candidates[0]).is_none());
    Ok(())
}

#[test]
fn write_capability_follows_the_extension() {
    assert!(C3dFileIO::new().can_write_file(Path::new("out/trial.C3D")));
    assert!(!C3dFileIO::new().can_write_file(Path::new("out/trial.trc")));
    assert!(TrcFileIO::new().can_write_file(Path::new("trial.trc")));
    for ext in ["gr1", "gr5", "gr9", "c3d"] {
        assert!(!GrxFileIO::new().can_write_file(Path::new(&format!("trial.{ext}"))));
    }
}

#[test]
fn detection_looks_at_content_not_extension() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let misnamed = dir.path().join("misnamed.trc");
    C3dFileIO::new().write(&misnamed, &trial()?)?;

    let reader = AcquisitionFileReader::new();
    reader.set_filename(&misnamed);
    reader.update()?;
    assert_eq!(reader.acquisition_io(), Some(C3dFileIO::NAME));
    assert_eq!(reader.output()?.borrow().points()[0].label, "C7");

    let mut registry = Registry::default();
    assert!(registry.unregister("c3d"));
    assert_eq!(registry.names(), [TrcFileIO::NAME, GrxFileIO::NAME]);
    assert!(registry.detect_reader(&misnamed).is_none());
    Ok(())
}

#[test]
fn reader_reports_usage_errors() -> Result<()> {
    let reader = AcquisitionFileReader::new();
    let err = reader.update().unwrap_err();
    assert_eq!(err.what(), "Filename must be specified");
    assert!(err.is(ErrorKind::AcquisitionFileReader));
    assert!(err.is_logic_error());

    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("nowhere.c3d");
    reader.set_filename(&missing);
    let err = reader.update().unwrap_err();
    assert_eq!(
        err.what(),
        format!("File doesn't exist\nFilename: {}", missing.display())
    );

    let unknown = dir.path().join("notes.txt");
    fs::write(&unknown, "not a trial")?;
    reader.set_filename(&unknown);
    let err = reader.update().unwrap_err();
    assert_eq!(err.what(), "No suitable file format found");
    assert!(err.is(ErrorKind::InvalidArgument));
    Ok(())
}

#[test]
fn explicit_codec_bypasses_detection() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("trial.c3d");
    C3dFileIO::new().write(&path, &trial()?)?;

    let reader = AcquisitionFileReader::new();
    reader.set_acquisition_io(Box::new(TrcFileIO::new()));
    reader.set_filename(&path);
    let err = reader.update().unwrap_err();
    assert!(err.is_runtime_error());
    assert_eq!(err.kind(), ErrorKind::Codec(TrcFileIO::NAME));
    assert_eq!(reader.acquisition_io(), Some(TrcFileIO::NAME));

    reader.clear_acquisition_io();
    reader.update()?;
    assert_eq!(reader.acquisition_io(), Some(C3dFileIO::NAME));
    Ok(())
}
