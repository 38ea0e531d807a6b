use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use mocap_core::Acquisition;
use serde::Serialize;

use super::{read_trial, table};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Trial to inspect
    pub file: PathBuf,
    /// Print a JSON document instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct TrialSummary {
    pub file: String,
    pub format: String,
    pub byte_order: Option<String>,
    pub first_frame: i32,
    pub last_frame: i32,
    pub point_frequency: f64,
    pub analog_frequency: f64,
    pub point_frames: usize,
    pub analog_frames: usize,
    pub points: Vec<PointSummary>,
    pub analogs: Vec<AnalogSummary>,
    pub events: Vec<EventSummary>,
    pub metadata_groups: Vec<GroupSummary>,
}

#[derive(Debug, Serialize)]
pub struct PointSummary {
    pub label: String,
    pub kind: String,
    pub description: String,
    pub valid_frames: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalogSummary {
    pub label: String,
    pub unit: String,
    pub scale: f64,
    pub offset: i32,
}

#[derive(Debug, Serialize)]
pub struct EventSummary {
    pub label: String,
    pub context: String,
    pub time: f64,
}

#[derive(Debug, Serialize)]
pub struct GroupSummary {
    pub label: String,
    pub parameters: usize,
}

pub fn summarize(
    file: String,
    format: &str,
    byte_order: Option<String>,
    acq: &Acquisition,
) -> TrialSummary {
    TrialSummary {
        file,
        format: format.to_owned(),
        byte_order,
        first_frame: acq.first_frame(),
        last_frame: acq.last_frame(),
        point_frequency: acq.point_frequency(),
        analog_frequency: acq.analog_frequency(),
        point_frames: acq.point_frame_number(),
        analog_frames: acq.analog_frame_number(),
        points: acq
            .points()
            .iter()
            .map(|p| PointSummary {
                label: p.label.clone(),
                kind: p.kind.as_str().to_owned(),
                description: p.description.clone(),
                valid_frames: (0..p.frame_number()).filter(|f| p.is_valid(*f)).count(),
            })
            .collect(),
        analogs: acq
            .analogs()
            .iter()
            .map(|a| AnalogSummary {
                label: a.label.clone(),
                unit: a.unit.clone(),
                scale: a.scale,
                offset: a.offset,
            })
            .collect(),
        events: acq
            .events()
            .iter()
            .map(|e| EventSummary {
                label: e.label.clone(),
                context: e.context.clone(),
                time: e.time,
            })
            .collect(),
        metadata_groups: acq
            .metadata()
            .children()
            .iter()
            .map(|g| GroupSummary {
                label: g.label().to_owned(),
                parameters: g.child_count(),
            })
            .collect(),
    }
}

pub fn handle_info(args: InfoArgs, config: &Config) -> Result<()> {
    let (acq, reader) = read_trial(&args.file, config)?;
    let format = reader.acquisition_io().unwrap_or("unknown");
    let byte_order = reader.with_acquisition_io(|io| {
        io.and_then(|io| io.byte_order())
            .map(|order| order.as_str().to_owned())
    });
    let summary = summarize(args.file.display().to_string(), format, byte_order, &acq);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let mut overview = table(vec!["Property", "Value"]);
    overview
        .add_row(vec!["File".to_owned(), summary.file.clone()])
        .add_row(vec!["Format".to_owned(), summary.format.clone()])
        .add_row(vec![
            "Byte order".to_owned(),
            summary.byte_order.clone().unwrap_or_else(|| "-".to_owned()),
        ])
        .add_row(vec![
            "Frames".to_owned(),
            format!("{} to {}", summary.first_frame, summary.last_frame),
        ])
        .add_row(vec![
            "Point frequency (Hz)".to_owned(),
            summary.point_frequency.to_string(),
        ])
        .add_row(vec![
            "Analog frequency (Hz)".to_owned(),
            summary.analog_frequency.to_string(),
        ])
        .add_row(vec![
            "Analog frames".to_owned(),
            summary.analog_frames.to_string(),
        ]);
    println!("{overview}");

    if !summary.points.is_empty() {
        let mut points = table(vec!["Point", "Type", "Valid frames", "Description"]);
        for point in &summary.points {
            points.add_row(vec![
                point.label.clone(),
                point.kind.clone(),
                format!("{}/{}", point.valid_frames, summary.point_frames),
                point.description.clone(),
            ]);
        }
        println!("{points}");
    }
    if !summary.analogs.is_empty() {
        let mut analogs = table(vec!["Analog", "Unit", "Scale", "Offset"]);
        for analog in &summary.analogs {
            analogs.add_row(vec![
                analog.label.clone(),
                analog.unit.clone(),
                format!("{:.6}", analog.scale),
                analog.offset.to_string(),
            ]);
        }
        println!("{analogs}");
    }
    if !summary.events.is_empty() {
        let mut events = table(vec!["Event", "Context", "Time (s)"]);
        for event in &summary.events {
            events.add_row(vec![
                event.label.clone(),
                event.context.clone(),
                format!("{:.3}", event.time),
            ]);
        }
        println!("{events}");
    }
    if !summary.metadata_groups.is_empty() {
        let mut groups = table(vec!["Metadata group", "Parameters"]);
        for group in &summary.metadata_groups {
            groups.add_row(vec![group.label.clone(), group.parameters.to_string()]);
        }
        println!("{groups}");
    }
    Ok(())
}
