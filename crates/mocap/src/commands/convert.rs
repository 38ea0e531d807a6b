use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use mocap_io::{AcquisitionFileWriter, C3dFileIO};
use tracing::{info, warn};

use super::open_reader;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Glob pattern of the trials to convert, e.g. "session/*.c3d"
    pub pattern: String,
    /// Extension of the output format (c3d, trc)
    #[arg(long)]
    pub to: String,
    /// Output directory (defaults to the directory of each input)
    #[arg(long)]
    pub out_dir: Option<PathBuf>,
}

pub fn output_path(input: &Path, extension: &str, out_dir: Option<&Path>) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(extension);
    dir.join(name)
}

fn convert_one(input: &Path, output: &Path, args: &ConvertArgs, config: &Config) -> Result<()> {
    let reader = open_reader(input, config);
    let writer = AcquisitionFileWriter::with_registry(config.registry());
    writer.set_filename(output);
    if args.to.eq_ignore_ascii_case("c3d") {
        writer.set_acquisition_io(Box::new(C3dFileIO::with_options(config.c3d)));
    }
    writer.set_input(reader.output_port())?;
    writer.update()?;
    Ok(())
}

pub fn handle_convert(args: ConvertArgs, config: &Config) -> Result<()> {
    let extension = args.to.trim_start_matches('.').to_ascii_lowercase();
    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut success_count = 0;
    let mut failure_count = 0;
    for entry in glob::glob(&args.pattern)
        .with_context(|| format!("invalid glob pattern {}", args.pattern))?
    {
        let input = match entry {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "cannot read path from glob pattern");
                failure_count += 1;
                continue;
            }
        };
        if !input.is_file() {
            continue;
        }
        let output = output_path(&input, &extension, args.out_dir.as_deref());
        if output == input {
            warn!(path = %input.display(), "input and output are the same file; skipped");
            failure_count += 1;
            continue;
        }
        match convert_one(&input, &output, &args, config) {
            Ok(()) => {
                info!(input = %input.display(), output = %output.display(), "converted");
                println!("{} -> {}", input.display(), output.display());
                success_count += 1;
            }
            Err(err) => {
                eprintln!("  -> skipping {}: {}", input.display(), err);
                failure_count += 1;
            }
        }
    }

    if success_count == 0 && failure_count == 0 {
        bail!("no file matches {}", args.pattern);
    }
    println!("\n--- Conversion Summary ---");
    println!("  Converted: {success_count}");
    println!("  Skipped / Failed: {failure_count}");
    if success_count == 0 {
        bail!("no file could be converted");
    }
    Ok(())
}
