pub mod convert;
pub mod formats;
pub mod info;
pub mod wrenches;

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use mocap_io::AcquisitionFileReader;

use crate::config::Config;

/// Reader for `path` using the codecs enabled by the configuration.
pub fn open_reader(path: &Path, config: &Config) -> AcquisitionFileReader {
    let reader = AcquisitionFileReader::with_registry(config.registry());
    reader.set_filename(path);
    reader
}

pub fn read_trial(
    path: &Path,
    config: &Config,
) -> Result<(mocap_core::Acquisition, AcquisitionFileReader)> {
    let reader = open_reader(path, config);
    reader
        .update()
        .with_context(|| format!("failed to read {}", path.display()))?;
    let acquisition = reader.output()?.get();
    Ok((acquisition, reader))
}

pub fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);
    table
}
