use serde::{Deserialize, Serialize};

/// A labelled instant of the trial (foot strike, toe off, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub label: String,
    pub description: String,
    /// Usually `Left`, `Right` or `General`.
    pub context: String,
    pub subject: String,
    /// Seconds from the start of the acquisition.
    pub time: f64,
    /// Frame index, or -1 when only the time is known.
    pub frame: i32,
    pub detection_flags: u32,
}

impl Event {
    pub const MANUAL: u32 = 0x01;
    pub const AUTOMATIC: u32 = 0x02;
    pub const FROM_MARKERS: u32 = 0x04;
    pub const FROM_FORCE_PLATFORM: u32 = 0x08;

    pub fn new(label: impl Into<String>, time: f64, context: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            description: String::new(),
            context: context.into(),
            subject: String::new(),
            time,
            frame: -1,
            detection_flags: Self::MANUAL,
        }
    }

    pub fn with_frame(mut self, frame: i32) -> Self {
        self.frame = frame;
        self
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new("", 0.0, "General")
    }
}
