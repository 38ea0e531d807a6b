use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{Analog, Event, MetaData, Point, PointType};

pub const ANALOG_RESOLUTIONS: [u32; 5] = [8, 10, 12, 14, 16];

/// A motion-capture trial: points, analog channels, events and metadata.
///
/// Points share one frame count. Analog channels share
/// `point_frame_number * analog_sample_ratio` frames, and the analog frequency
/// is always `point_frequency * analog_sample_ratio`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    points: Vec<Point>,
    analogs: Vec<Analog>,
    events: Vec<Event>,
    metadata: MetaData,
    first_frame: i32,
    point_frequency: f64,
    point_frame_number: usize,
    analog_sample_ratio: usize,
    point_units: BTreeMap<PointType, String>,
    analog_resolution: u32,
    max_interpolation_gap: u32,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::new()
    }
}

impl Acquisition {
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            analogs: Vec::new(),
            events: Vec::new(),
            metadata: MetaData::root(),
            first_frame: 1,
            point_frequency: 0.0,
            point_frame_number: 0,
            analog_sample_ratio: 1,
            point_units: PointType::ALL
                .iter()
                .map(|kind| (*kind, kind.default_unit().to_owned()))
                .collect(),
            analog_resolution: 12,
            max_interpolation_gap: 10,
        }
    }

    /// Sizes every collection in one step: `markers` points and `analogs`
    /// channels, `frames` point frames and `ratio` analog samples per point
    /// frame. Existing entries are kept (and resized); new ones get
    /// placeholder labels.
    pub fn init(&mut self, markers: usize, frames: usize, analogs: usize, ratio: usize) -> Result<()> {
        if ratio == 0 {
            return Err(Error::invalid_argument(
                "the number of analog samples per point frame must be positive",
            ));
        }
        self.point_frame_number = frames;
        self.analog_sample_ratio = ratio;
        self.resize_points(markers);
        self.resize_analogs(analogs);
        self.sync_frame_numbers();
        Ok(())
    }

    /// Back to the default-constructed state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn sync_frame_numbers(&mut self) {
        let point_frames = self.point_frame_number;
        let analog_frames = self.analog_frame_number();
        self.points
            .iter_mut()
            .for_each(|p| p.set_frame_number(point_frames));
        self.analogs
            .iter_mut()
            .for_each(|a| a.set_frame_number(analog_frames));
    }

    pub fn first_frame(&self) -> i32 {
        self.first_frame
    }

    pub fn set_first_frame(&mut self, first_frame: i32) -> Result<()> {
        if first_frame < 1 {
            return Err(Error::invalid_argument(format!(
                "first frame must be at least 1, got {first_frame}"
            )));
        }
        self.first_frame = first_frame;
        Ok(())
    }

    pub fn last_frame(&self) -> i32 {
        self.first_frame + self.point_frame_number as i32 - 1
    }

    /// Point frequency in Hz, 0 when unknown.
    pub fn point_frequency(&self) -> f64 {
        self.point_frequency
    }

    /// Changes the point frequency; the analog frequency follows through the
    /// sample ratio and frame counts stay as they are.
    pub fn set_point_frequency(&mut self, frequency: f64) -> Result<()> {
        if !frequency.is_finite() || frequency <= 0.0 {
            return Err(Error::invalid_argument(format!(
                "point frequency must be positive, got {frequency}"
            )));
        }
        self.point_frequency = frequency;
        Ok(())
    }

    pub fn analog_frequency(&self) -> f64 {
        self.point_frequency * self.analog_sample_ratio as f64
    }

    pub fn analog_sample_ratio(&self) -> usize {
        self.analog_sample_ratio
    }

    pub fn set_analog_sample_ratio(&mut self, ratio: usize) -> Result<()> {
        if ratio == 0 {
            return Err(Error::invalid_argument(
                "the number of analog samples per point frame must be positive",
            ));
        }
        self.analog_sample_ratio = ratio;
        self.sync_frame_numbers();
        Ok(())
    }

    pub fn point_frame_number(&self) -> usize {
        self.point_frame_number
    }

    pub fn set_point_frame_number(&mut self, frames: usize) {
        self.point_frame_number = frames;
        self.sync_frame_numbers();
    }

    pub fn analog_frame_number(&self) -> usize {
        self.point_frame_number * self.analog_sample_ratio
    }

    /// Length of the trial in seconds, 0 when the frequency is unknown.
    pub fn duration(&self) -> f64 {
        if self.point_frequency > 0.0 {
            self.point_frame_number as f64 / self.point_frequency
        } else {
            0.0
        }
    }

    pub fn point_unit(&self, kind: PointType) -> &str {
        self.point_units.get(&kind).map(String::as_str).unwrap_or("")
    }

    pub fn set_point_unit(&mut self, kind: PointType, unit: impl Into<String>) {
        self.point_units.insert(kind, unit.into());
    }

    pub fn analog_resolution(&self) -> u32 {
        self.analog_resolution
    }

    pub fn set_analog_resolution(&mut self, bits: u32) -> Result<()> {
        if !ANALOG_RESOLUTIONS.contains(&bits) {
            return Err(Error::invalid_argument(format!(
                "unsupported analog resolution: {bits} bits"
            )));
        }
        self.analog_resolution = bits;
        Ok(())
    }

    pub fn max_interpolation_gap(&self) -> u32 {
        self.max_interpolation_gap
    }

    pub fn set_max_interpolation_gap(&mut self, gap: u32) {
        self.max_interpolation_gap = gap;
    }

    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetaData {
        &mut self.metadata
    }

    // Points

    pub fn point_number(&self) -> usize {
        self.points.len()
    }

    pub fn marker_number(&self) -> usize {
        self.points_of_type(PointType::Marker).count()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [Point] {
        &mut self.points
    }

    pub fn points_of_type(&self, kind: PointType) -> impl Iterator<Item = &Point> + '_ {
        self.points.iter().filter(move |p| p.kind == kind)
    }

    pub fn point(&self, index: usize) -> Result<&Point> {
        let count = self.points.len();
        self.points.get(index).ok_or_else(|| {
            Error::out_of_range(format!("point index {index} out of range ({count} points)"))
        })
    }

    pub fn point_mut(&mut self, index: usize) -> Result<&mut Point> {
        let count = self.points.len();
        self.points.get_mut(index).ok_or_else(|| {
            Error::out_of_range(format!("point index {index} out of range ({count} points)"))
        })
    }

    pub fn find_point(&self, label: &str) -> Option<&Point> {
        self.points.iter().find(|p| p.label == label)
    }

    pub fn find_point_mut(&mut self, label: &str) -> Option<&mut Point> {
        self.points.iter_mut().find(|p| p.label == label)
    }

    pub fn append_point(&mut self, point: Point) -> Result<()> {
        if point.frame_number() != self.point_frame_number {
            return Err(Error::invalid_argument(format!(
                "point '{}' has {} frames, the acquisition has {}",
                point.label,
                point.frame_number(),
                self.point_frame_number
            )));
        }
        self.points.push(point);
        Ok(())
    }

    pub fn remove_point(&mut self, index: usize) -> Result<Point> {
        self.point(index)?;
        Ok(self.points.remove(index))
    }

    /// Grows or shrinks the point list. New points are markers labelled
    /// `uname*<n>`.
    pub fn resize_points(&mut self, count: usize) {
        let frames = self.point_frame_number;
        let start = self.points.len();
        self.points.truncate(count);
        self.points
            .extend((start..count).map(|i| Point::new(format!("uname*{}", i + 1), frames)));
    }

    // Analogs

    pub fn analog_number(&self) -> usize {
        self.analogs.len()
    }

    pub fn analogs(&self) -> &[Analog] {
        &self.analogs
    }

    pub fn analogs_mut(&mut self) -> &mut [Analog] {
        &mut self.analogs
    }

    pub fn analog(&self, index: usize) -> Result<&Analog> {
        let count = self.analogs.len();
        self.analogs.get(index).ok_or_else(|| {
            Error::out_of_range(format!("analog index {index} out of range ({count} channels)"))
        })
    }

    pub fn analog_mut(&mut self, index: usize) -> Result<&mut Analog> {
        let count = self.analogs.len();
        self.analogs.get_mut(index).ok_or_else(|| {
            Error::out_of_range(format!("analog index {index} out of range ({count} channels)"))
        })
    }

    pub fn find_analog(&self, label: &str) -> Option<&Analog> {
        self.analogs.iter().find(|a| a.label == label)
    }

    pub fn append_analog(&mut self, analog: Analog) -> Result<()> {
        if analog.frame_number() != self.analog_frame_number() {
            return Err(Error::invalid_argument(format!(
                "analog '{}' has {} frames, the acquisition has {}",
                analog.label,
                analog.frame_number(),
                self.analog_frame_number()
            )));
        }
        self.analogs.push(analog);
        Ok(())
    }

    pub fn remove_analog(&mut self, index: usize) -> Result<Analog> {
        self.analog(index)?;
        Ok(self.analogs.remove(index))
    }

    pub fn resize_analogs(&mut self, count: usize) {
        let frames = self.analog_frame_number();
        let start = self.analogs.len();
        self.analogs.truncate(count);
        self.analogs
            .extend((start..count).map(|i| Analog::new(format!("uname*{}", i + 1), frames)));
    }

    // Events

    pub fn event_number(&self) -> usize {
        self.events.len()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut Vec<Event> {
        &mut self.events
    }

    pub fn append_event(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn find_event(&self, label: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.label == label)
    }

    pub fn remove_event(&mut self, index: usize) -> Result<Event> {
        if index >= self.events.len() {
            return Err(Error::out_of_range(format!(
                "event index {index} out of range ({} events)",
                self.events.len()
            )));
        }
        Ok(self.events.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn init_sizes_every_collection() {
        let mut acq = Acquisition::new();
        acq.init(3, 10, 2, 4).unwrap();
        assert_eq!(acq.point_number(), 3);
        assert_eq!(acq.analog_number(), 2);
        assert_eq!(acq.analog_frame_number(), 40);
        assert!(acq.analogs().iter().all(|a| a.frame_number() == 40));
        assert_eq!(acq.points()[2].label, "uname*3");

        acq.init(1, 5, 0, 1).unwrap();
        assert_eq!(acq.point_number(), 1);
        assert_eq!(acq.points()[0].frame_number(), 5);
        assert_eq!(acq.analog_number(), 0);
    }

    #[test]
    fn zero_ratio_is_rejected() {
        let mut acq = Acquisition::new();
        let err = acq.init(1, 1, 1, 0).unwrap_err();
        assert!(err.is(ErrorKind::InvalidArgument));
        assert!(acq.set_analog_sample_ratio(0).is_err());
    }

    #[test]
    fn frequency_and_first_frame_validation() {
        let mut acq = Acquisition::new();
        assert!(acq.set_point_frequency(0.0).is_err());
        assert!(acq.set_first_frame(0).is_err());
        acq.init(0, 100, 0, 10).unwrap();
        acq.set_point_frequency(50.0).unwrap();
        acq.set_first_frame(20).unwrap();
        assert_eq!(acq.analog_frequency(), 500.0);
        assert_eq!(acq.last_frame(), 119);
        assert_eq!(acq.duration(), 2.0);
    }

    #[test]
    fn lookups_report_out_of_range() {
        let mut acq = Acquisition::new();
        acq.init(2, 3, 0, 1).unwrap();
        acq.points_mut()[1].label = String::from("RASI");
        assert!(acq.find_point("RASI").is_some());
        assert!(acq.find_point("LASI").is_none());
        let err = acq.point(5).unwrap_err();
        assert!(err.is(ErrorKind::OutOfRange));
        assert!(err.is_logic_error());
    }

    #[test]
    fn appended_series_must_match_frame_count() {
        let mut acq = Acquisition::new();
        acq.init(0, 4, 0, 2).unwrap();
        assert!(acq.append_point(Point::new("A", 3)).is_err());
        acq.append_point(Point::new("A", 4)).unwrap();
        assert!(acq.append_analog(Analog::new("EMG", 4)).is_err());
        acq.append_analog(Analog::new("EMG", 8)).unwrap();
    }

    #[test]
    fn reset_restores_defaults() {
        let mut acq = Acquisition::new();
        acq.init(4, 4, 4, 2).unwrap();
        acq.set_point_frequency(100.0).unwrap();
        acq.append_event(Event::new("Foot Strike", 0.5, "Left"));
        acq.reset();
        assert_eq!(acq, Acquisition::new());
        assert_eq!(acq.metadata().label(), "ROOT");
        assert_eq!(acq.point_unit(PointType::Moment), "Nmm");
    }
}
