use std::path::PathBuf;
use std::time::Duration;

use crate::audio::DecodedSource;
use crate::playback::{ControlState, TransportState};

/// Information about the bound source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub path: PathBuf,
    pub format_name: String,
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: usize,
    pub looping: bool,
}

impl SourceInfo {
    pub fn from_source(source: &DecodedSource) -> Self {
        Self {
            path: source.path().to_path_buf(),
            format_name: source.format_name().to_string(),
            duration: source.duration(),
            sample_rate: source.sample_rate(),
            channels: source.channels(),
            looping: source.is_looping(),
        }
    }

    /// File name for display, falling back to the full path
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// e.g. "WAV file, 44100 Hz, 2 ch"
    pub fn format_description(&self) -> String {
        format!("{}, {} Hz, {} ch", self.format_name, self.sample_rate, self.channels)
    }
}

/// Snapshot of everything the status panel shows
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    pub state: TransportState,
    pub controls: ControlState,
    pub source: Option<SourceInfo>,
    pub position: Duration,
    pub output_device: Option<String>,
}

impl PlayerStatus {
    pub fn new() -> Self {
        Self {
            state: TransportState::Stopped,
            controls: ControlState::default(),
            source: None,
            position: Duration::ZERO,
            output_device: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, TransportState::Playing)
    }

    /// Get progress as a fraction (0.0 to 1.0)
    pub fn progress(&self) -> f32 {
        match &self.source {
            Some(source) if !source.duration.is_zero() => {
                (self.position.as_secs_f32() / source.duration.as_secs_f32()).min(1.0)
            }
            _ => 0.0,
        }
    }

    /// Format position as MM:SS
    pub fn position_formatted(&self) -> String {
        format_mm_ss(self.position)
    }

    /// Format duration as MM:SS
    pub fn duration_formatted(&self) -> String {
        self.source
            .as_ref()
            .map(|s| format_mm_ss(s.duration))
            .unwrap_or_else(|| "00:00".to_string())
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self::new()
    }
}

fn format_mm_ss(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}
