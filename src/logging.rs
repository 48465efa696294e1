use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};

use crate::playback::TransportState;

/// Environment variable selecting the log level
pub const LOG_LEVEL_ENV: &str = "TRANSPORT_PLAYER_LOG_LEVEL";

/// Player event kept in the history for diagnostics
#[derive(Debug, Clone)]
pub struct PlayerEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: PlayerEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventType {
    StateChanged,
    SourceLoaded,
    OpenFailed,
    OpenCancelled,
    DeviceStarted,
    StreamError,
}

impl PlayerEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerEventType::StateChanged => "STATE_CHANGED",
            PlayerEventType::SourceLoaded => "SOURCE_LOADED",
            PlayerEventType::OpenFailed => "OPEN_FAILED",
            PlayerEventType::OpenCancelled => "OPEN_CANCELLED",
            PlayerEventType::DeviceStarted => "DEVICE_STARTED",
            PlayerEventType::StreamError => "STREAM_ERROR",
        }
    }
}

/// Logger for player operations with a bounded event history
#[derive(Clone)]
pub struct PlayerLogger {
    events: Arc<Mutex<VecDeque<PlayerEvent>>>,
    max_events: usize,
}

impl PlayerLogger {
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events,
        }
    }

    /// Initialize the `log` backend from `TRANSPORT_PLAYER_LOG_LEVEL`
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        let log_level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "warn".to_string());

        let mut builder = env_logger::Builder::new();

        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        builder.filter_level(Self::parse_level(&log_level));
        builder.try_init()?;

        info!("Player logging initialized with level: {}", log_level);
        Ok(())
    }

    fn parse_level(level: &str) -> log::LevelFilter {
        match level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            "off" => log::LevelFilter::Off,
            _ => log::LevelFilter::Info,
        }
    }

    /// Record an event and forward it to the `log` facade
    pub fn log_event(&self, event_type: PlayerEventType, details: String) {
        match event_type {
            PlayerEventType::StateChanged | PlayerEventType::OpenCancelled => {
                debug!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::SourceLoaded | PlayerEventType::DeviceStarted => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::OpenFailed => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            PlayerEventType::StreamError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }

        let event = PlayerEvent {
            timestamp: Utc::now(),
            event_type,
            details,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }
    }

    pub fn log_state_changed(&self, from: TransportState, to: TransportState) {
        self.log_event(
            PlayerEventType::StateChanged,
            format!("{} -> {}", from.as_str(), to.as_str()),
        );
    }

    pub fn log_source_loaded(&self, path: &str, format_name: &str) {
        self.log_event(
            PlayerEventType::SourceLoaded,
            format!("Loaded {} ({})", path, format_name),
        );
    }

    pub fn log_open_failed(&self, path: &str, reason: &str) {
        self.log_event(
            PlayerEventType::OpenFailed,
            format!("Could not open {}: {}", path, reason),
        );
    }

    pub fn log_open_cancelled(&self) {
        self.log_event(PlayerEventType::OpenCancelled, "File selection dismissed".to_string());
    }

    pub fn log_device_started(&self, device: &str, sample_rate: u32, block_size: usize) {
        self.log_event(
            PlayerEventType::DeviceStarted,
            format!("Output '{}' running at {} Hz, {} frames per block", device, sample_rate, block_size),
        );
    }

    pub fn log_stream_error(&self, error: &str) {
        self.log_event(PlayerEventType::StreamError, error.to_string());
    }

    /// Most recent events, oldest first
    pub fn get_recent_events(&self, count: usize) -> Vec<PlayerEvent> {
        match self.events.lock() {
            Ok(events) => {
                let skip = events.len().saturating_sub(count);
                events.iter().skip(skip).cloned().collect()
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl Default for PlayerLogger {
    fn default() -> Self {
        Self::new()
    }
}
