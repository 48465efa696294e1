use std::time::Duration;

use crate::error::{AudioError, DecodeError, ErrorSeverity, PlayerError};
use crate::logging::PlayerEvent;
use crate::models::PlayerStatus;
use crate::playback::{ControlState, ControlSurface, TransportState};

/// Status display formatter for the CLI
pub struct StatusDisplay;

impl StatusDisplay {
    /// Render the three controls as one line, e.g. `[Open] [Play] ( stop )`
    pub fn format_controls(controls: &ControlState) -> String {
        format!(
            "{} {} {}",
            Self::format_button("Open", controls.open_enabled),
            Self::format_button("Play", controls.play_enabled),
            Self::format_button("Stop", controls.stop_enabled),
        )
    }

    fn format_button(label: &str, enabled: bool) -> String {
        if enabled {
            format!("[{}]", label)
        } else {
            format!("( {} )", label.to_lowercase())
        }
    }

    pub fn format_state(state: TransportState) -> String {
        match state {
            TransportState::Playing => "▶ Playing".to_string(),
            TransportState::Starting => "… Starting".to_string(),
            TransportState::Stopping => "… Stopping".to_string(),
            TransportState::Stopped => "⏹ Stopped".to_string(),
        }
    }

    /// Display the full player status panel
    pub fn display_status(status: &PlayerStatus) {
        println!("┌─ Player Status ─────────────────────────────────────────┐");

        match &status.source {
            Some(source) => {
                println!("│ File: {}", Self::truncate(&source.display_name(), 50));
                println!("│ Format: {}", source.format_description());
                println!("│ Looping: {}", if source.looping { "on" } else { "off" });
                println!("│");
                println!("│ Status: {}", Self::format_state(status.state));
                println!(
                    "│ Position: {} / {}",
                    Self::format_duration(status.position),
                    Self::format_duration(source.duration)
                );
                println!(
                    "│ Progress: [{}] {:.1}%",
                    Self::create_progress_bar(status.progress(), 40),
                    status.progress() * 100.0
                );
            }
            None => {
                println!("│ No file loaded");
                println!("│ Status: {}", Self::format_state(status.state));
            }
        }

        println!("│");
        println!("│ Controls: {}", Self::format_controls(&status.controls));
        match &status.output_device {
            Some(device) => println!("│ Device: {}", Self::truncate(device, 49)),
            None => println!("│ Device: none (playback is silent)"),
        }
        println!("└─────────────────────────────────────────────────────────┘");
    }

    pub fn display_recent_events(events: &[PlayerEvent]) {
        if events.is_empty() {
            return;
        }

        println!("Recent events:");
        for event in events {
            println!(
                "  {} {:<15} {}",
                event.timestamp.format("%H:%M:%S"),
                event.event_type.as_str(),
                event.details
            );
        }
    }

    /// Display error message with formatting and recovery suggestions
    pub fn display_error(error: &PlayerError) {
        let severity = error.severity();
        let severity_icon = match severity {
            ErrorSeverity::Info => "ℹ",
            ErrorSeverity::Warning => "⚠",
            ErrorSeverity::Error => "✗",
            ErrorSeverity::Critical => "🔥",
        };

        eprintln!(
            "┌─ {} {} ─────────────────────────────────────────────────┐",
            severity_icon,
            severity.as_str()
        );

        for line in Self::wrap_text(&error.user_message(), 55) {
            eprintln!("│ {}", line);
        }

        let suggestions = error.recovery_suggestions();
        if !suggestions.is_empty() {
            eprintln!("│");
            eprintln!("│ Suggestions:");
            for suggestion in suggestions.iter().take(3) {
                for line in Self::wrap_text(&format!("• {}", suggestion), 53) {
                    eprintln!("│   {}", line);
                }
            }
        }

        Self::display_error_context(error);

        eprintln!("└─────────────────────────────────────────────────────────┘");
    }

    fn display_error_context(error: &PlayerError) {
        match error {
            PlayerError::Audio(AudioError::DeviceNotFound { .. }) => {
                eprintln!("│");
                eprintln!("│ Run 'tplay --list-devices' to see available devices");
            }
            PlayerError::Decode(DecodeError::UnsupportedFormat { .. }) => {
                eprintln!("│");
                eprintln!("│ Supported: WAV, MP3, AIFF, FLAC, Ogg Vorbis");
            }
            PlayerError::Config(_) => {
                eprintln!("│");
                eprintln!("│ Configuration will use default values");
            }
            _ => {}
        }
    }

    /// Display a simple error message for non-interactive contexts
    pub fn display_simple_error(error: &PlayerError) {
        eprintln!("[{}] {}", error.severity().as_str(), error.user_message());

        if let Some(suggestion) = error.recovery_suggestions().first() {
            eprintln!("Suggestion: {}", suggestion);
        }
    }

    fn wrap_text(text: &str, width: usize) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current_line = String::new();

        for word in text.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + word.chars().count() < width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }

        if !current_line.is_empty() {
            lines.push(current_line);
        }

        lines
    }

    /// Format duration as MM:SS or HH:MM:SS for longer files
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate string to fit display width
    pub fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len || max_len <= 3 {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len - 3).collect();
            format!("{}...", kept)
        }
    }

    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let filled = ((progress.clamp(0.0, 1.0) * width as f32) as usize).min(width);
        format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
    }
}

/// Console rendering of the control panel.
///
/// Prints a line whenever the projection changes.
#[derive(Debug, Default)]
pub struct ConsolePanel {
    last: Option<(TransportState, ControlState)>,
}

impl ConsolePanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line for the given projection
    pub fn render_line(state: TransportState, controls: &ControlState) -> String {
        format!("{:<12} {}", StatusDisplay::format_state(state), StatusDisplay::format_controls(controls))
    }
}

impl ControlSurface for ConsolePanel {
    fn update(&mut self, state: TransportState, controls: &ControlState) {
        if self.last == Some((state, *controls)) {
            return;
        }
        self.last = Some((state, *controls));
        println!("{}", Self::render_line(state, controls));
    }
}
