//! Console stand-in for an asynchronous file dialog.
//!
//! Launching the chooser only marks it as open and prompts; the next console
//! line completes it. The result is delivered on a channel back to the UI
//! loop, so nothing ever waits on the user.

use std::path::{Path, PathBuf};

use log::debug;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::cli::CliApp;

/// Wildcard filter such as `*.wav; *.mp3`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    // lowercase extensions without the dot; empty means everything
    extensions: Vec<String>,
    pattern: String,
}

impl FileFilter {
    /// Parse a `;` or `,` separated wildcard list. `*` and `*.*` match any file.
    pub fn parse(pattern: &str) -> Self {
        let mut extensions = Vec::new();
        let mut match_all = false;

        for part in pattern.split(|c: char| c == ';' || c == ',') {
            let part = part.trim();
            match part {
                "" => {}
                "*" | "*.*" => match_all = true,
                _ => {
                    let ext = part.trim_start_matches('*').trim_start_matches('.').to_lowercase();
                    if !ext.is_empty() && !extensions.contains(&ext) {
                        extensions.push(ext);
                    }
                }
            }
        }

        if match_all {
            extensions.clear();
        }

        Self {
            extensions,
            pattern: pattern.trim().to_string(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }
}

/// How a chooser session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChooserResult {
    Selected(PathBuf),
    /// Dismissed without a selection
    Cancelled,
    /// The path does not pass the filter; handled like a cancel
    Rejected(PathBuf),
}

pub struct FileChooser {
    filter: FileFilter,
    pending: bool,
    results: UnboundedSender<ChooserResult>,
}

impl FileChooser {
    pub fn new(filter: FileFilter) -> (Self, UnboundedReceiver<ChooserResult>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                filter,
                pending: false,
                results: tx,
            },
            rx,
        )
    }

    pub fn filter(&self) -> &FileFilter {
        &self.filter
    }

    /// Open the chooser with `filter`. Returns false if one is already open.
    pub fn launch_async(&mut self, filter: FileFilter) -> bool {
        if self.pending {
            return false;
        }

        self.filter = filter;
        self.pending = true;
        println!("Select a file ({}), or press Enter to cancel:", self.filter.pattern());
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Feed a console line to an open chooser; an empty line cancels.
    /// Returns false if no chooser was open and the line was not consumed.
    pub fn complete(&mut self, line: &str) -> bool {
        if !self.pending {
            return false;
        }

        let line = line.trim();
        if line.is_empty() {
            self.pending = false;
            self.deliver(ChooserResult::Cancelled);
        } else {
            self.choose(CliApp::expand_path(line));
        }
        true
    }

    /// Complete with `path` directly, as `open <path>` does
    pub fn choose(&mut self, path: PathBuf) {
        self.pending = false;
        let result = if self.filter.matches(&path) {
            ChooserResult::Selected(path)
        } else {
            ChooserResult::Rejected(path)
        };
        self.deliver(result);
    }

    fn deliver(&self, result: ChooserResult) {
        debug!("Chooser finished: {:?}", result);
        // The receiver lives as long as the UI loop
        let _ = self.results.send(result);
    }
}
