use std::path::Path;

use log::debug;

use crate::audio::{AudioBlock, AudioTransport, FormatRegistry, SourceHandle, TransportRender};
use crate::error::DecodeError;
use crate::logging::PlayerLogger;
use crate::models::SourceInfo;
use crate::playback::state::{self, ControlState, Transition, TransportAction, TransportState};
use crate::playback::ControlSurface;

/// What to do when a selected file cannot be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenFailurePolicy {
    /// Log and carry on as if nothing was selected
    #[default]
    Silent,
    /// Hand the decode error back to the caller
    Report,
}

/// User intent coming from the Play and Stop controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Play,
    Stop,
}

impl ControlCommand {
    pub fn label(&self) -> &'static str {
        match self {
            ControlCommand::Play => "Play",
            ControlCommand::Stop => "Stop",
        }
    }

    /// Whether the control issuing this command is currently clickable
    pub fn is_enabled(&self, controls: &ControlState) -> bool {
        match self {
            ControlCommand::Play => controls.play_enabled,
            ControlCommand::Stop => controls.stop_enabled,
        }
    }
}

/// Result of [`PlaybackController::open_file`]
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Loaded(SourceInfo),
    /// The file was refused and ignored; the previous source is still bound
    Rejected { reason: String },
}

/// Owns the transport lifecycle and mediates between the controls and the
/// audio transport.
///
/// All methods run on the UI side. Transport notifications arrive through the
/// receiver returned by [`AudioTransport::subscribe`]; each one must trigger
/// [`PlaybackController::transport_changed`], which reads the transport's
/// live status rather than the notification payload.
pub struct PlaybackController<T: AudioTransport, R: FormatRegistry> {
    state: TransportState,
    controls: ControlState,
    current_source: Option<SourceHandle>,
    transport: T,
    registry: R,
    open_failure_policy: OpenFailurePolicy,
    loop_on_open: bool,
    logger: PlayerLogger,
}

impl<T: AudioTransport, R: FormatRegistry> PlaybackController<T, R> {
    pub fn new(transport: T, registry: R) -> Self {
        Self {
            state: TransportState::default(),
            controls: ControlState::default(),
            current_source: None,
            transport,
            registry,
            open_failure_policy: OpenFailurePolicy::default(),
            loop_on_open: true,
            logger: PlayerLogger::new(),
        }
    }

    pub fn with_open_failure_policy(mut self, policy: OpenFailurePolicy) -> Self {
        self.open_failure_policy = policy;
        self
    }

    /// Whether newly opened sources loop (on by default)
    pub fn with_looping(mut self, loop_on_open: bool) -> Self {
        self.loop_on_open = loop_on_open;
        self
    }

    pub fn with_logger(mut self, logger: PlayerLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn controls(&self) -> ControlState {
        self.controls
    }

    pub fn current_source(&self) -> Option<&SourceHandle> {
        self.current_source.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn open_failure_policy(&self) -> OpenFailurePolicy {
        self.open_failure_policy
    }

    /// Render the current control projection
    pub fn present(&self, surface: &mut dyn ControlSurface) {
        surface.update(self.state, &self.controls);
    }

    pub fn is_enabled(&self, command: ControlCommand) -> bool {
        command.is_enabled(&self.controls)
    }

    /// Apply a command from the controls. Commands whose control is
    /// disabled are ignored, as a greyed-out button would be.
    pub fn handle_command(&mut self, command: ControlCommand) -> Option<Transition> {
        if !self.is_enabled(command) {
            debug!("{} ignored while {}", command.label(), self.state.as_str());
            return None;
        }

        match command {
            ControlCommand::Play => self.play_button_clicked(),
            ControlCommand::Stop => self.stop_button_clicked(),
        }
    }

    pub fn play_button_clicked(&mut self) -> Option<Transition> {
        self.change_state(TransportState::Starting)
    }

    pub fn stop_button_clicked(&mut self) -> Option<Transition> {
        self.change_state(TransportState::Stopping)
    }

    /// Reconcile with the transport after a change notification.
    ///
    /// Queued notifications can be stale by the time they are handled (an
    /// open in between unbinds the source without broadcasting), so the
    /// transport is queried instead of trusting the payload.
    pub fn transport_changed(&mut self) -> Option<Transition> {
        if self.transport.is_playing() {
            self.change_state(TransportState::Playing)
        } else {
            self.change_state(TransportState::Stopped)
        }
    }

    /// Open `path` and bind it as the new source.
    ///
    /// On success playback is discarded and the state forced to `Stopped`.
    /// On failure nothing changes and the previous source stays bound; the
    /// error is only returned under [`OpenFailurePolicy::Report`].
    pub fn open_file(&mut self, path: &Path) -> Result<OpenOutcome, DecodeError> {
        let source = match self.registry.create_reader_for(path) {
            Ok(source) => source,
            Err(e) => {
                self.logger.log_open_failed(&path.display().to_string(), &e.to_string());
                return match self.open_failure_policy {
                    OpenFailurePolicy::Silent => Ok(OpenOutcome::Rejected { reason: e.user_message() }),
                    OpenFailurePolicy::Report => Err(e),
                };
            }
        };

        source.set_looping(self.loop_on_open);
        self.transport.set_source(Some(SourceHandle::clone(&source)));
        // set_source already rewound the transport; this brings the controls along
        self.change_state(TransportState::Stopped);

        let info = SourceInfo::from_source(&source);
        self.logger.log_source_loaded(&path.display().to_string(), source.format_name());

        if let Some(previous) = self.current_source.replace(source) {
            debug!("Releasing previous source {}", previous.path().display());
        }

        Ok(OpenOutcome::Loaded(info))
    }

    /// The chooser was dismissed without a selection
    pub fn open_cancelled(&self) {
        self.logger.log_open_cancelled();
    }

    fn change_state(&mut self, requested: TransportState) -> Option<Transition> {
        let transition = state::transition(self.state, requested)?;

        self.state = transition.to;
        self.controls = transition.controls;
        self.logger.log_state_changed(transition.from, transition.to);

        match transition.action {
            Some(TransportAction::Start) => self.transport.start(),
            Some(TransportAction::Stop) => self.transport.stop(),
            Some(TransportAction::Rewind) => self.transport.set_position(0.0),
            None => {}
        }

        Some(transition)
    }
}

impl<T: AudioTransport, R: FormatRegistry> Drop for PlaybackController<T, R> {
    fn drop(&mut self) {
        if self.current_source.is_some() {
            // unbind before the slot is released
            self.transport.set_source(None);
        }
    }
}

/// Device-facing wrapper around the audio half of a transport.
///
/// Runs on the realtime thread: no locks, no allocation, no logging.
pub struct AudioCallbackHandler<A: TransportRender> {
    renderer: A,
    prepared: bool,
}

impl<A: TransportRender> AudioCallbackHandler<A> {
    pub fn new(renderer: A) -> Self {
        Self {
            renderer,
            prepared: false,
        }
    }

    pub fn prepare_to_play(&mut self, block_size: usize, sample_rate: u32) {
        self.renderer.prepare_to_play(block_size, sample_rate);
        self.prepared = true;
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Zero `block`, then let the transport add its output
    pub fn render_block(&mut self, block: &mut AudioBlock<'_>) {
        block.clear();
        self.renderer.get_next_audio_block(block);
    }

    pub fn release_resources(&mut self) {
        if self.prepared {
            self.renderer.release_resources();
            self.prepared = false;
        }
    }
}

impl<A: TransportRender> Drop for AudioCallbackHandler<A> {
    fn drop(&mut self) {
        self.release_resources();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DecodedSource, TransportChange};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

    #[derive(Default)]
    struct MockTransport {
        source: Option<SourceHandle>,
        position: f64,
        playing: bool,
        start_calls: usize,
        stop_calls: usize,
        seek_calls: usize,
        set_source_calls: usize,
        listeners: Vec<UnboundedSender<TransportChange>>,
    }

    impl MockTransport {
        fn notify(&mut self, playing: bool) {
            self.playing = playing;
            for listener in &self.listeners {
                let _ = listener.send(TransportChange { playing });
            }
        }
    }

    impl AudioTransport for MockTransport {
        fn set_source(&mut self, source: Option<SourceHandle>) {
            self.set_source_calls += 1;
            self.source = source;
            self.playing = false;
            self.position = 0.0;
        }

        fn start(&mut self) {
            self.start_calls += 1;
        }

        fn stop(&mut self) {
            self.stop_calls += 1;
        }

        fn set_position(&mut self, seconds: f64) {
            self.seek_calls += 1;
            self.position = seconds;
        }

        fn position(&self) -> f64 {
            self.position
        }

        fn is_playing(&self) -> bool {
            self.playing
        }

        fn subscribe(&mut self) -> UnboundedReceiver<TransportChange> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.listeners.push(tx);
            rx
        }
    }

    #[derive(Default)]
    struct MockRegistry {
        files: HashMap<PathBuf, SourceHandle>,
    }

    impl MockRegistry {
        fn with_file(mut self, path: &str) -> Self {
            let source = DecodedSource::new(path, "WAV file", vec![0.5; 200], 2, 44_100);
            self.files.insert(PathBuf::from(path), Arc::new(source));
            self
        }
    }

    impl FormatRegistry for MockRegistry {
        fn create_reader_for(&self, path: &Path) -> Result<SourceHandle, DecodeError> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| DecodeError::Unreadable(path.display().to_string()))
        }
    }

    /// Let the mock report `playing` and deliver the notification
    fn report(
        controller: &mut PlaybackController<MockTransport, MockRegistry>,
        playing: bool,
    ) -> Option<Transition> {
        controller.transport_mut().playing = playing;
        controller.transport_changed()
    }

    fn controller() -> PlaybackController<MockTransport, MockRegistry> {
        PlaybackController::new(
            MockTransport::default(),
            MockRegistry::default().with_file("track.wav").with_file("other.wav"),
        )
    }

    #[derive(Default)]
    struct RecordingSurface {
        updates: Vec<(TransportState, ControlState)>,
    }

    impl ControlSurface for RecordingSurface {
        fn update(&mut self, state: TransportState, controls: &ControlState) {
            self.updates.push((state, *controls));
        }
    }

    #[test]
    fn test_initial_state() {
        let controller = controller();
        assert_eq!(controller.state(), TransportState::Stopped);
        assert!(controller.controls().play_enabled);
        assert!(!controller.controls().stop_enabled);
        assert!(controller.current_source().is_none());
    }

    #[test]
    fn test_repeated_command_has_one_side_effect() {
        let mut controller = controller();

        assert!(controller.handle_command(ControlCommand::Play).is_some());
        assert!(controller.handle_command(ControlCommand::Play).is_none());
        assert_eq!(controller.transport().start_calls, 1);

        assert!(controller.handle_command(ControlCommand::Stop).is_some());
        assert!(controller.handle_command(ControlCommand::Stop).is_none());
        assert_eq!(controller.transport().stop_calls, 1);
    }

    #[test]
    fn test_repeated_notification_is_ignored() {
        let mut controller = controller();
        controller.play_button_clicked();

        assert!(report(&mut controller, true).is_some());
        assert!(report(&mut controller, true).is_none());
        assert_eq!(controller.state(), TransportState::Playing);
    }

    #[test]
    fn test_open_file_forces_stopped_at_zero() {
        let mut controller = controller();
        controller.play_button_clicked();
        report(&mut controller, true);
        controller.transport_mut().position = 3.5;

        let outcome = controller.open_file(Path::new("track.wav")).unwrap();

        assert!(matches!(outcome, OpenOutcome::Loaded(ref info) if info.format_name == "WAV file"));
        assert_eq!(controller.state(), TransportState::Stopped);
        assert_eq!(controller.transport().position(), 0.0);
        assert!(controller.controls().play_enabled);
        assert!(!controller.controls().stop_enabled);
        assert!(controller.transport().source.is_some());
    }

    #[test]
    fn test_open_file_enables_looping() {
        let mut controller = controller();
        controller.open_file(Path::new("track.wav")).unwrap();
        assert!(controller.current_source().unwrap().is_looping());

        let mut controller = controller_without_loop();
        controller.open_file(Path::new("track.wav")).unwrap();
        assert!(!controller.current_source().unwrap().is_looping());
    }

    fn controller_without_loop() -> PlaybackController<MockTransport, MockRegistry> {
        controller().with_looping(false)
    }

    #[test]
    fn test_open_replaces_previous_source() {
        let mut controller = controller();
        controller.open_file(Path::new("track.wav")).unwrap();
        let first = Arc::clone(controller.current_source().unwrap());

        controller.open_file(Path::new("other.wav")).unwrap();

        assert_eq!(controller.current_source().unwrap().path(), Path::new("other.wav"));
        assert!(!Arc::ptr_eq(&first, controller.current_source().unwrap()));
        assert_eq!(controller.transport().set_source_calls, 2);
    }

    #[test]
    fn test_failed_open_changes_nothing() {
        let mut controller = controller();
        controller.open_file(Path::new("track.wav")).unwrap();
        controller.play_button_clicked();

        let outcome = controller.open_file(Path::new("missing.mp3")).unwrap();

        assert!(matches!(outcome, OpenOutcome::Rejected { .. }));
        assert_eq!(controller.state(), TransportState::Starting);
        assert_eq!(controller.current_source().unwrap().path(), Path::new("track.wav"));
        assert_eq!(controller.transport().set_source_calls, 1);
    }

    #[test]
    fn test_report_policy_returns_error() {
        let mut controller = controller().with_open_failure_policy(OpenFailurePolicy::Report);

        let result = controller.open_file(Path::new("missing.mp3"));

        assert!(matches!(result, Err(DecodeError::Unreadable(_))));
        assert_eq!(controller.state(), TransportState::Stopped);
        assert!(controller.current_source().is_none());
    }

    #[test]
    fn test_play_without_file_still_starts_transport() {
        let mut controller = controller();

        controller.play_button_clicked();
        assert_eq!(controller.transport().start_calls, 1);
        assert_eq!(controller.state(), TransportState::Starting);

        report(&mut controller, false);
        assert_eq!(controller.state(), TransportState::Stopped);
    }

    #[test]
    fn test_play_loaded_track() {
        let mut controller = controller();
        controller.open_file(Path::new("track.wav")).unwrap();

        controller.play_button_clicked();
        report(&mut controller, true);

        assert_eq!(controller.state(), TransportState::Playing);
        assert!(!controller.controls().play_enabled);
        assert!(controller.controls().stop_enabled);
    }

    #[test]
    fn test_stop_while_playing_rewinds() {
        let mut controller = controller();
        controller.open_file(Path::new("track.wav")).unwrap();
        controller.play_button_clicked();
        report(&mut controller, true);
        controller.transport_mut().position = 1.25;

        controller.stop_button_clicked();
        assert_eq!(controller.transport().stop_calls, 1);
        assert_eq!(controller.state(), TransportState::Stopping);

        report(&mut controller, false);
        assert_eq!(controller.state(), TransportState::Stopped);
        assert_eq!(controller.transport().position(), 0.0);
    }

    #[test]
    fn test_playing_notification_while_stopping() {
        let mut controller = controller();
        controller.play_button_clicked();
        controller.stop_button_clicked();
        assert_eq!(controller.state(), TransportState::Stopping);

        report(&mut controller, true);
        assert_eq!(controller.state(), TransportState::Playing);

        report(&mut controller, false);
        assert_eq!(controller.state(), TransportState::Stopped);
    }

    #[tokio::test]
    async fn test_notifications_through_subscription() {
        let mut controller = controller();
        let mut changes = controller.transport_mut().subscribe();
        controller.open_file(Path::new("track.wav")).unwrap();

        controller.play_button_clicked();
        controller.transport_mut().notify(true);
        let change = changes.recv().await.unwrap();
        assert!(change.playing);
        controller.transport_changed();

        assert_eq!(controller.state(), TransportState::Playing);
    }

    #[tokio::test]
    async fn test_stale_playing_notification_after_open() {
        let mut controller = controller();
        let mut changes = controller.transport_mut().subscribe();
        controller.open_file(Path::new("track.wav")).unwrap();

        controller.play_button_clicked();
        controller.transport_mut().notify(true);
        // the new source unbinds playback before the queued "playing" is seen
        controller.open_file(Path::new("other.wav")).unwrap();

        assert_eq!(changes.recv().await, Some(TransportChange { playing: true }));
        controller.transport_changed();

        assert_eq!(controller.state(), TransportState::Stopped);
        assert!(controller.is_enabled(ControlCommand::Play));
        assert!(!controller.is_enabled(ControlCommand::Stop));
    }

    #[test]
    fn test_disabled_commands_are_ignored() {
        let mut controller = controller();
        controller.open_file(Path::new("track.wav")).unwrap();

        assert!(controller.handle_command(ControlCommand::Stop).is_none());
        assert_eq!(controller.transport().stop_calls, 0);
        assert_eq!(controller.state(), TransportState::Stopped);

        controller.handle_command(ControlCommand::Play);
        report(&mut controller, true);
        assert_eq!(controller.state(), TransportState::Playing);

        assert!(controller.handle_command(ControlCommand::Play).is_none());
        assert_eq!(controller.transport().start_calls, 1);
        assert_eq!(controller.state(), TransportState::Playing);
    }

    #[test]
    fn test_command_enabled_follows_controls() {
        let stopped = ControlState::for_state(TransportState::Stopped);
        assert!(ControlCommand::Play.is_enabled(&stopped));
        assert!(!ControlCommand::Stop.is_enabled(&stopped));

        let playing = ControlState::for_state(TransportState::Playing);
        assert!(!ControlCommand::Play.is_enabled(&playing));
        assert!(ControlCommand::Stop.is_enabled(&playing));
        assert_eq!(ControlCommand::Stop.label(), "Stop");
    }

    #[test]
    fn test_present_renders_controls() {
        let mut controller = controller();
        let mut surface = RecordingSurface::default();

        controller.present(&mut surface);
        controller.play_button_clicked();
        controller.present(&mut surface);

        assert_eq!(surface.updates.len(), 2);
        assert_eq!(surface.updates[0].0, TransportState::Stopped);
        assert_eq!(surface.updates[1].0, TransportState::Starting);
        assert!(surface.updates[1].1.stop_enabled);
    }

    struct GarbageRenderer {
        prepared_with: Option<(usize, u32)>,
        released: bool,
    }

    impl TransportRender for GarbageRenderer {
        fn prepare_to_play(&mut self, block_size: usize, sample_rate: u32) {
            self.prepared_with = Some((block_size, sample_rate));
        }

        fn get_next_audio_block(&mut self, _block: &mut AudioBlock<'_>) {}

        fn release_resources(&mut self) {
            self.released = true;
        }
    }

    #[test]
    fn test_render_block_zeroes_output() {
        let mut handler = AudioCallbackHandler::new(GarbageRenderer {
            prepared_with: None,
            released: false,
        });
        handler.prepare_to_play(4, 48_000);
        assert_eq!(handler.renderer.prepared_with, Some((4, 48_000)));

        let mut data = vec![0.9f32; 8];
        handler.render_block(&mut AudioBlock::new(&mut data, 2));
        assert!(data.iter().all(|&s| s == 0.0));

        handler.release_resources();
        assert!(handler.renderer.released);
        assert!(!handler.is_prepared());
    }

    #[test]
    fn test_drop_unbinds_source() {
        let registry = MockRegistry::default().with_file("track.wav");
        let mut controller = PlaybackController::new(MockTransport::default(), registry);
        controller.open_file(Path::new("track.wav")).unwrap();
        let source = Arc::clone(controller.current_source().unwrap());
        assert!(Arc::strong_count(&source) >= 3);

        drop(controller);
        assert_eq!(Arc::strong_count(&source), 1);
    }
}
