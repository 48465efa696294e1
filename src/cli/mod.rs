use crate::config::PlayerConfig;
use clap::Parser;
use std::path::PathBuf;

pub mod chooser;
pub mod status;
pub use chooser::{ChooserResult, FileChooser, FileFilter};
pub use status::{ConsolePanel, StatusDisplay};

/// Minimal three-control audio player
#[derive(Debug, Parser)]
#[command(name = "tplay")]
#[command(about = "A minimal audio player with Open, Play and Stop controls")]
#[command(version = "0.1.0")]
pub struct CliApp {
    /// Audio file to open on startup
    pub file: Option<PathBuf>,

    /// Output device name (defaults to the system output)
    #[arg(short, long)]
    pub device: Option<String>,

    /// Frames per audio callback
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(16..=16384))]
    pub block_size: Option<u32>,

    /// Show an error when a selected file cannot be opened
    #[arg(long)]
    pub report_open_failures: bool,

    /// Do not loop opened files
    #[arg(long)]
    pub no_loop: bool,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

/// Commands accepted by the interactive panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Open a file, or launch the chooser when no path is given
    Open { path: Option<PathBuf> },
    Play,
    Stop,
    Status,
    Quit,
}

impl CliApp {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut PlayerConfig) {
        if let Some(device) = &self.device {
            config.preferred_device = Some(device.clone());
        }
        if let Some(block_size) = self.block_size {
            config.block_size = Some(block_size);
        }
        if self.report_open_failures {
            config.report_open_failures = true;
        }
        if self.no_loop {
            config.loop_playback = false;
        }
    }

    /// Expand tilde (~) in path to home directory
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home_dir) = dirs::home_dir() {
                home_dir.join(rest)
            } else {
                PathBuf::from(path)
            }
        } else if path == "~" {
            dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
        } else {
            PathBuf::from(path)
        }
    }

    /// Parse command from string (for interactive mode)
    pub fn parse_command(input: &str) -> Result<Commands, ParseError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseError::EmptyCommand);
        }

        // the remainder is kept verbatim so paths keep their inner whitespace
        let (keyword, remainder) = match input.find(char::is_whitespace) {
            Some(split) => (&input[..split], input[split..].trim()),
            None => (input, ""),
        };
        let command = keyword.to_lowercase();
        let rest: Vec<&str> = remainder.split_whitespace().collect();

        match command.as_str() {
            "open" => {
                if remainder.is_empty() {
                    Ok(Commands::Open { path: None })
                } else {
                    let path = Self::expand_path(remainder);
                    Ok(Commands::Open { path: Some(path) })
                }
            }
            "play" => Self::no_arguments("play", &rest, Commands::Play),
            "stop" => Self::no_arguments("stop", &rest, Commands::Stop),
            "status" => Self::no_arguments("status", &rest, Commands::Status),
            "quit" | "exit" => Ok(Commands::Quit),
            "help" | "?" => Err(ParseError::HelpRequested),
            _ => Err(ParseError::UnknownCommand {
                command: keyword.to_string(),
            }),
        }
    }

    fn no_arguments(command: &str, rest: &[&str], parsed: Commands) -> Result<Commands, ParseError> {
        match rest.first() {
            None => Ok(parsed),
            Some(extra) => Err(ParseError::UnexpectedArgument {
                command: command.to_string(),
                argument: extra.to_string(),
            }),
        }
    }

    /// Display help information
    pub fn display_help() {
        println!("Transport Player - Available Commands:");
        println!();
        println!("  open [path]     - Open a file (without a path, the next line you type is the file)");
        println!("  play            - Start playback");
        println!("  stop            - Stop playback and rewind");
        println!("  status          - Show player status and recent events");
        println!("  help            - Show this help message");
        println!("  exit, quit      - Exit the player");
    }
}

/// Command parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Empty command")]
    EmptyCommand,

    #[error("Unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("{command} takes no arguments, got '{argument}'")]
    UnexpectedArgument { command: String, argument: String },

    #[error("Help requested")]
    HelpRequested,
}


#[cfg(test)]
mod path_tests {
    use super::*;

    #[test]
    fn test_expand_path_tilde_home() {
        let expanded = CliApp::expand_path("~/Music/track.wav");

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("Music"));
    }

    #[test]
    fn test_expand_path_tilde_only() {
        let expanded = CliApp::expand_path("~");
        assert_ne!(expanded.to_string_lossy(), "~");
    }

    #[test]
    fn test_expand_path_no_tilde() {
        let path = "/absolute/path/to/track.wav";
        assert_eq!(CliApp::expand_path(path).to_string_lossy(), path);

        let path = "relative/track.wav";
        assert_eq!(CliApp::expand_path(path).to_string_lossy(), path);
    }
}
