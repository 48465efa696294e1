//! Transport lifecycle and its transition table.
//!
//! The table is pure: it computes the next state, the control projection
//! and the transport side effect, and leaves applying them to the caller.

use std::fmt;

/// Lifecycle phase of the transport as seen by the controls.
///
/// `Starting` and `Stopping` express intent; `Playing` and `Stopped` are
/// only reached once the transport confirms (or on open/rewind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Starting,
    Playing,
    Stopping,
}

impl TransportState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportState::Stopped => "Stopped",
            TransportState::Starting => "Starting",
            TransportState::Playing => "Playing",
            TransportState::Stopping => "Stopping",
        }
    }

    /// Whether the state is an unconfirmed request
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportState::Starting | TransportState::Stopping)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side effect a state entry asks of the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    Start,
    Stop,
    /// Seek back to position zero
    Rewind,
}

/// Enabled flags of the three controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub open_enabled: bool,
    pub play_enabled: bool,
    pub stop_enabled: bool,
}

impl ControlState {
    pub fn for_state(state: TransportState) -> Self {
        let (play_enabled, stop_enabled) = match state {
            TransportState::Stopped | TransportState::Stopping => (true, false),
            TransportState::Starting | TransportState::Playing => (false, true),
        };

        Self {
            open_enabled: true,
            play_enabled,
            stop_enabled,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::for_state(TransportState::Stopped)
    }
}

/// Result of entering a new state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: TransportState,
    pub to: TransportState,
    pub controls: ControlState,
    pub action: Option<TransportAction>,
}

/// Compute the transition from `current` to `requested`.
///
/// Returns `None` when the states are equal, so repeated requests cause
/// neither a transport call nor a control update.
pub fn transition(current: TransportState, requested: TransportState) -> Option<Transition> {
    if current == requested {
        return None;
    }

    let action = match requested {
        TransportState::Stopped => Some(TransportAction::Rewind),
        TransportState::Starting => Some(TransportAction::Start),
        TransportState::Stopping => Some(TransportAction::Stop),
        TransportState::Playing => None,
    };

    Some(Transition {
        from: current,
        to: requested,
        controls: ControlState::for_state(requested),
        action,
    })
}
