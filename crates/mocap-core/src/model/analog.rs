use serde::{Deserialize, Serialize};

/// Amplifier gain stored with C3D analog channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gain {
    #[default]
    Unknown,
    PlusMinus10,
    PlusMinus5,
    PlusMinus2Dot5,
    PlusMinus1Dot25,
    PlusMinus1,
}

impl Gain {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Gain::PlusMinus10,
            2 => Gain::PlusMinus5,
            3 => Gain::PlusMinus2Dot5,
            4 => Gain::PlusMinus1Dot25,
            5 => Gain::PlusMinus1,
            _ => Gain::Unknown,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Gain::Unknown => 0,
            Gain::PlusMinus10 => 1,
            Gain::PlusMinus5 => 2,
            Gain::PlusMinus2Dot5 => 3,
            Gain::PlusMinus1Dot25 => 4,
            Gain::PlusMinus1 => 5,
        }
    }
}

/// One analog channel sampled at the analog frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analog {
    pub label: String,
    pub description: String,
    pub unit: String,
    pub gain: Gain,
    /// Conversion factor applied to the raw integer samples.
    pub scale: f64,
    /// Raw integer offset subtracted before scaling.
    pub offset: i32,
    values: Vec<f64>,
}

impl Analog {
    pub fn new(label: impl Into<String>, frames: usize) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            unit: String::from("V"),
            gain: Gain::Unknown,
            scale: 1.0,
            offset: 0,
            values: vec![0.0; frames],
        }
    }

    pub fn with_values(label: impl Into<String>, values: Vec<f64>) -> Self {
        let mut analog = Self::new(label, 0);
        analog.values = values;
        analog
    }

    pub fn frame_number(&self) -> usize {
        self.values.len()
    }

    pub fn set_frame_number(&mut self, frames: usize) {
        self.values.resize(frames, 0.0);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Replaces the samples, keeping the current frame count.
    pub fn set_values(&mut self, values: &[f64]) {
        let frames = self.values.len();
        self.values.clear();
        self.values.extend(values.iter().copied().take(frames));
        self.values.resize(frames, 0.0);
    }
}
