use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use transport_player::audio::{
    AudioOutput, AudioTransport, DeviceManager, SymphoniaFormatRegistry, Transport, TransportChange,
    TransportRenderer,
};
use transport_player::cli::{
    ChooserResult, CliApp, Commands, ConsolePanel, FileChooser, FileFilter, ParseError, StatusDisplay,
};
use transport_player::config::{ConfigManager, PlayerConfig};
use transport_player::error::{ErrorSeverity, PlayerError};
use transport_player::logging::PlayerLogger;
use transport_player::models::{PlayerStatus, SourceInfo};
use transport_player::playback::{
    AudioCallbackHandler, ControlCommand, OpenOutcome, PlaybackController,
};

type Controller = PlaybackController<Transport, SymphoniaFormatRegistry>;

/// Channels the event loop listens on besides stdin
struct AppEvents {
    changes: UnboundedReceiver<TransportChange>,
    chooser_results: UnboundedReceiver<ChooserResult>,
    stream_errors: UnboundedReceiver<String>,
}

/// Wires the controller, the output device and the console together
pub struct AppController {
    controller: Controller,
    output: Option<AudioOutput>,
    chooser: FileChooser,
    panel: ConsolePanel,
    config_manager: ConfigManager,
    config: PlayerConfig,
    logger: PlayerLogger,
    requested_device: Option<String>,
}

impl AppController {
    fn new(cli: &CliApp) -> (Self, AppEvents) {
        let config_manager = match ConfigManager::new() {
            Ok(manager) => manager,
            Err(e) => {
                warn!("Could not load configuration, using defaults: {}", e);
                StatusDisplay::display_simple_error(&PlayerError::from(e));
                ConfigManager::with_defaults()
            }
        };

        let mut config = config_manager.get_config().clone();
        cli.apply_overrides(&mut config);

        let logger = PlayerLogger::new();
        let (mut transport, renderer) = Transport::new();
        let changes = transport.subscribe();

        let controller = PlaybackController::new(transport, SymphoniaFormatRegistry::with_basic_formats())
            .with_open_failure_policy(config.open_failure_policy())
            .with_looping(config.loop_playback)
            .with_logger(logger.clone());

        let (chooser, chooser_results) = FileChooser::new(FileFilter::parse(&config.file_filter));
        let (error_tx, stream_errors) = mpsc::unbounded_channel();

        let output = Self::open_output(&config, renderer, error_tx, &logger);

        let app = Self {
            controller,
            output,
            chooser,
            panel: ConsolePanel::new(),
            config_manager,
            config,
            logger,
            requested_device: cli.device.clone(),
        };

        let events = AppEvents {
            changes,
            chooser_results,
            stream_errors,
        };

        (app, events)
    }

    /// Start the output device. Without one the panel keeps working silently.
    fn open_output(
        config: &PlayerConfig,
        renderer: TransportRenderer,
        errors: mpsc::UnboundedSender<String>,
        logger: &PlayerLogger,
    ) -> Option<AudioOutput> {
        let result = DeviceManager::new()
            .select(config.preferred_device.as_deref())
            .and_then(|device| {
                AudioOutput::open(&device, AudioCallbackHandler::new(renderer), config.block_size, errors)
            });

        match result {
            Ok(output) => {
                logger.log_device_started(output.device_name(), output.sample_rate(), output.block_size());
                Some(output)
            }
            Err(e) => {
                warn!("Audio output unavailable, playback will be silent: {}", e);
                StatusDisplay::display_simple_error(&PlayerError::from(e));
                None
            }
        }
    }

    fn execute_command(&mut self, command: Commands) {
        match command {
            Commands::Open { path: Some(path) } => self.chooser.choose(path),
            Commands::Open { path: None } => {
                let filter = FileFilter::parse(&self.config.file_filter);
                if !self.chooser.launch_async(filter) {
                    println!("A file selection is already in progress");
                }
            }
            Commands::Play => self.dispatch(ControlCommand::Play),
            Commands::Stop => self.dispatch(ControlCommand::Stop),
            Commands::Status => {
                StatusDisplay::display_status(&self.current_status());
                StatusDisplay::display_recent_events(&self.logger.get_recent_events(5));
            }
            // handled by the event loop
            Commands::Quit => {}
        }
        self.controller.present(&mut self.panel);
    }

    fn dispatch(&mut self, command: ControlCommand) {
        if !self.controller.is_enabled(command) {
            println!(
                "{} is disabled while {}",
                command.label(),
                self.controller.state().as_str().to_lowercase()
            );
            return;
        }
        self.controller.handle_command(command);
    }

    fn open_selected(&mut self, path: PathBuf) {
        match self.controller.open_file(&path) {
            Ok(OpenOutcome::Loaded(info)) => {
                println!("Loaded: {} ({})", info.display_name(), info.format_description());
            }
            Ok(OpenOutcome::Rejected { .. }) => {}
            Err(e) => StatusDisplay::display_error(&PlayerError::from(e)),
        }
        self.controller.present(&mut self.panel);
    }

    fn handle_chooser_result(&mut self, result: ChooserResult) {
        match result {
            ChooserResult::Selected(path) => self.open_selected(path),
            ChooserResult::Cancelled => self.controller.open_cancelled(),
            ChooserResult::Rejected(path) => {
                println!(
                    "{} does not match the file filter ({})",
                    path.display(),
                    self.chooser.filter().pattern()
                );
                self.controller.open_cancelled();
            }
        }
    }

    fn handle_transport_change(&mut self, change: TransportChange) {
        debug!("Transport notification: playing={}", change.playing);
        self.controller.transport_changed();
        self.controller.present(&mut self.panel);
    }

    fn current_status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.controller.state(),
            controls: self.controller.controls(),
            source: self.controller.current_source().map(|s| SourceInfo::from_source(s)),
            position: Duration::from_secs_f64(self.controller.transport().position().max(0.0)),
            output_device: self.output.as_ref().map(|o| o.device_name().to_string()),
        }
    }

    fn handle_line(&mut self, line: &str) -> bool {
        if self.chooser.complete(line) {
            return true;
        }

        let line = line.trim();
        if line.is_empty() {
            return true;
        }

        match CliApp::parse_command(line) {
            Ok(Commands::Quit) => {
                println!("Goodbye!");
                return false;
            }
            Ok(command) => self.execute_command(command),
            Err(ParseError::HelpRequested) => CliApp::display_help(),
            Err(e) => self.handle_error(&PlayerError::from(e)),
        }
        true
    }

    fn handle_error(&self, error: &PlayerError) {
        match error.severity() {
            ErrorSeverity::Info => info!("{}", error),
            ErrorSeverity::Warning => warn!("{}", error),
            ErrorSeverity::Error | ErrorSeverity::Critical => error!("{}", error),
        }
        StatusDisplay::display_simple_error(error);
    }

    /// Run the interactive panel until quit, EOF or Ctrl-C
    async fn run_interactive_mode(&mut self, mut events: AppEvents) -> Result<(), PlayerError> {
        println!("Transport Player - type 'help' for commands");
        self.controller.present(&mut self.panel);

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        let shutdown_flag_clone = Arc::clone(&shutdown_flag);
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown_flag_clone.store(true, Ordering::Relaxed);
        }) {
            warn!("Could not install Ctrl-C handler: {}", e);
        }

        // Stdin is read on its own thread so the loop never blocks on it
        let (line_tx, mut lines) = mpsc::unbounded_channel::<String>();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if line_tx.send(line.clone()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut interval = tokio::time::interval(Duration::from_millis(100));

        loop {
            tokio::select! {
                Some(change) = events.changes.recv() => self.handle_transport_change(change),

                Some(result) = events.chooser_results.recv() => self.handle_chooser_result(result),

                Some(message) = events.stream_errors.recv() => {
                    self.logger.log_stream_error(&message);
                }

                line = lines.recv() => match line {
                    Some(line) => {
                        if !self.handle_line(&line) {
                            break;
                        }
                    }
                    None => {
                        println!();
                        break;
                    }
                },

                _ = interval.tick() => {
                    self.controller.transport_mut().poll();
                    if shutdown_flag.load(Ordering::Relaxed) {
                        println!("\nReceived interrupt signal. Shutting down...");
                        break;
                    }
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.controller.transport().is_playing() {
            self.controller.handle_command(ControlCommand::Stop);
        }
        self.output = None;

        if let Err(e) = self.save_current_config() {
            warn!("Could not save configuration: {}", e);
        }
        info!("Shutdown complete");
    }

    /// Remember a device chosen on the command line once it has worked
    fn save_current_config(&mut self) -> Result<(), PlayerError> {
        let used = match (&self.requested_device, &self.config.preferred_device) {
            (Some(requested), Some(preferred)) if requested == preferred => requested.clone(),
            _ => return Ok(()),
        };

        if self.config_manager.get_config().preferred_device.as_deref() != Some(used.as_str()) {
            self.config_manager.set_preferred_device(Some(used))?;
        }
        Ok(())
    }
}

fn list_devices() -> Result<(), PlayerError> {
    let devices = DeviceManager::new().list_devices()?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for device in devices {
        println!(
            "{} {} ({} Hz, {} ch)",
            if device.is_default { "*" } else { " " },
            device.name,
            device.default_sample_rate,
            device.channels
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = PlayerLogger::init() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let cli = CliApp::parse();

    if cli.list_devices {
        if let Err(e) = list_devices() {
            StatusDisplay::display_simple_error(&e);
            std::process::exit(1);
        }
        return;
    }

    let (mut app, events) = AppController::new(&cli);

    if let Some(path) = &cli.file {
        app.open_selected(path.clone());
    }

    if let Err(e) = app.run_interactive_mode(events).await {
        StatusDisplay::display_error(&e);
        std::process::exit(1);
    }
}
