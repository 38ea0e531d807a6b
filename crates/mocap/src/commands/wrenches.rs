use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use mocap_core::{
    ForcePlatformsExtractor, GroundReactionWrenchFilter, ProcessObject, Wrench, WrenchCollection,
};

use super::{open_reader, table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct WrenchesArgs {
    /// Trial containing force platform channels
    pub file: PathBuf,
    /// Vertical force threshold (N), overriding `[wrench] threshold`
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, PartialEq)]
pub struct WrenchStats {
    pub label: String,
    pub frames: usize,
    pub valid_frames: usize,
    pub peak_force: f64,
    pub mean_cop: Option<[f64; 2]>,
}

pub fn wrench_stats(wrench: &Wrench) -> WrenchStats {
    let position = &wrench.position;
    let valid: Vec<usize> = (0..position.frame_number())
        .filter(|frame| position.is_valid(*frame))
        .collect();
    let peak_force = wrench
        .force
        .values()
        .iter()
        .map(|f| (f[0] * f[0] + f[1] * f[1] + f[2] * f[2]).sqrt())
        .fold(0.0, f64::max);
    let mean_cop = (!valid.is_empty()).then(|| {
        let n = valid.len() as f64;
        let sum = valid.iter().fold([0.0, 0.0], |acc, frame| {
            let p = position.values()[*frame];
            [acc[0] + p[0], acc[1] + p[1]]
        });
        [sum[0] / n, sum[1] / n]
    });
    WrenchStats {
        label: wrench.label().to_owned(),
        frames: position.frame_number(),
        valid_frames: valid.len(),
        peak_force,
        mean_cop,
    }
}

pub fn handle_wrenches(args: WrenchesArgs, config: &Config) -> Result<()> {
    let reader = open_reader(&args.file, config);
    let extractor = ProcessObject::new(ForcePlatformsExtractor::new());
    extractor.set_input(0, reader.output_port())?;
    let grw = ProcessObject::new(GroundReactionWrenchFilter::new());
    let threshold = args.threshold.or(config.wrench.threshold);
    grw.configure(|filter| filter.set_threshold(threshold));
    grw.set_input(0, extractor.output_port(0))?;
    grw.update()
        .with_context(|| format!("failed to compute wrenches for {}", args.file.display()))?;

    let wrenches = grw.output::<WrenchCollection>(0)?;
    let wrenches = wrenches.borrow();
    if wrenches.is_empty() {
        println!("No force platform found in {}", args.file.display());
        return Ok(());
    }
    let mut summary = table(vec![
        "Wrench",
        "Frames",
        "Valid COP frames",
        "Peak force (N)",
        "Mean COP x",
        "Mean COP y",
    ]);
    for stats in wrenches.iter().map(wrench_stats) {
        let (x, y) = match stats.mean_cop {
            Some([x, y]) => (format!("{x:.1}"), format!("{y:.1}")),
            None => ("-".to_owned(), "-".to_owned()),
        };
        summary.add_row(vec![
            stats.label,
            stats.frames.to_string(),
            stats.valid_frames.to_string(),
            format!("{:.1}", stats.peak_force),
            x,
            y,
        ]);
    }
    println!("{summary}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statistics_skip_invalid_positions() {
        let mut wrench = Wrench::new("GRW1", 3);
        wrench.force.values_mut()[1] = [3.0, 4.0, 12.0];
        wrench.position.set_frame(0, [10.0, 20.0, 0.0], 0.0).unwrap();
        wrench.position.set_frame(1, [30.0, 40.0, 0.0], 0.0).unwrap();
        wrench.position.invalidate(2).unwrap();

        let stats = wrench_stats(&wrench);
        assert_eq!(stats.label, "GRW1");
        assert_eq!(stats.frames, 3);
        assert_eq!(stats.valid_frames, 2);
        assert_eq!(stats.peak_force, 13.0);
        assert_eq!(stats.mean_cop, Some([20.0, 30.0]));
    }

    #[test]
    fn no_valid_frame_means_no_mean_position() {
        let mut wrench = Wrench::new("GRW2", 2);
        wrench.position.invalidate(0).unwrap();
        wrench.position.invalidate(1).unwrap();
        assert_eq!(wrench_stats(&wrench).mean_cop, None);
    }
}
