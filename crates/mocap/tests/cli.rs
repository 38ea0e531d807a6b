use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use anyhow::{ensure, Result};
use mocap_core::Acquisition;
use mocap_io::{read_acquisition, AcquisitionFileIO, ByteOrder, C3dFileIO, StorageFormat, TrcFileIO};

fn mocap(args: &[&str], config: Option<&Path>) -> Result<Output> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_mocap"));
    command.args(args).env_remove("MOCAP_CONFIG").env("RUST_LOG", "warn");
    if let Some(config) = config {
        command.env("MOCAP_CONFIG", config);
    }
    let output = command.output()?;
    Ok(output)
}

fn marker_trial() -> Result<Acquisition> {
    let mut acq = Acquisition::new();
    acq.init(2, 6, 0, 1)?;
    acq.set_point_frequency(120.0)?;
    for (i, point) in acq.points_mut().iter_mut().enumerate() {
        point.label = ["LASI", "RASI"][i].to_owned();
        for frame in 0..6 {
            point.set_frame(frame, [frame as f64, i as f64 * 100.0, 950.0], 0.0)?;
        }
    }
    Ok(acq)
}

#[test]
fn formats_lists_every_codec() -> Result<()> {
    let output = mocap(&["formats"], None)?;
    ensure!(output.status.success(), "formats failed");
    let stdout = String::from_utf8(output.stdout)?;
    for name in ["C3D", "TRC", "GRx"] {
        assert!(stdout.contains(name), "missing {name} in\n{stdout}");
    }
    Ok(())
}

#[test]
fn info_reports_json() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("static.trc");
    TrcFileIO::new().write(&path, &marker_trial()?)?;

    let output = mocap(&["info", path.to_str().unwrap_or_default(), "--json"], None)?;
    ensure!(output.status.success(), "info failed: {:?}", output);
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(summary["format"], "TRC");
    assert_eq!(summary["point_frames"], 6);
    assert_eq!(summary["point_frequency"], 120.0);
    assert_eq!(summary["points"][1]["label"], "RASI");
    assert_eq!(summary["points"][1]["valid_frames"], 6);
    Ok(())
}

#[test]
fn convert_uses_the_configured_c3d_layout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    for name in ["a.trc", "b.trc"] {
        TrcFileIO::new().write(&dir.path().join(name), &marker_trial()?)?;
    }
    let config = dir.path().join("mocap.toml");
    fs::write(&config, "[c3d]\nbyte_order = \"ieee-big-endian\"\nstorage = \"integer\"\n")?;
    let out_dir = dir.path().join("out");
    let pattern = dir.path().join("*.trc");

    let output = mocap(
        &[
            "convert",
            pattern.to_str().unwrap_or_default(),
            "--to",
            "c3d",
            "--out-dir",
            out_dir.to_str().unwrap_or_default(),
        ],
        Some(&config),
    )?;
    ensure!(output.status.success(), "convert failed: {:?}", output);

    let converted = out_dir.join("b.c3d");
    let acq = read_acquisition(&converted)?;
    assert_eq!(acq.point_number(), 2);
    assert_eq!(acq.points()[0].label, "LASI");

    let mut io = C3dFileIO::new();
    io.read(&converted)?;
    assert_eq!(io.byte_order(), Some(ByteOrder::IeeeBigEndian));
    assert_eq!(io.storage_format(), Some(StorageFormat::Integer));
    Ok(())
}

#[test]
fn convert_fails_when_nothing_matches() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pattern = dir.path().join("*.c3d");
    let output = mocap(
        &["convert", pattern.to_str().unwrap_or_default(), "--to", "trc"],
        None,
    )?;
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("no file matches"));
    Ok(())
}
