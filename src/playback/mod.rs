pub mod controller;
pub mod state;

pub use controller::{
    AudioCallbackHandler, ControlCommand, OpenFailurePolicy, OpenOutcome, PlaybackController,
};
pub use state::{transition, ControlState, Transition, TransportAction, TransportState};

/// Presentation of the three controls.
///
/// Called after every applied transition; implementations only render.
pub trait ControlSurface {
    fn update(&mut self, state: TransportState, controls: &ControlState);
}
