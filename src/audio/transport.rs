//! Playback transport split into a UI-side handle and an audio-side renderer.
//!
//! The two halves talk through pre-allocated single-producer/single-consumer
//! ring buffers and a handful of atomics, so the renderer never locks or
//! allocates. Sources replaced on the audio side are handed back through a
//! second ring and dropped on the UI side.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::audio::{
    AudioBlock, AudioTransport, LinearResampler, SourceHandle, TransportChange, TransportRender,
};

const COMMAND_QUEUE_CAPACITY: usize = 64;
const RETIRED_QUEUE_CAPACITY: usize = 16;

enum TransportCommand {
    SetSource(Option<SourceHandle>),
    Start,
    Stop,
    SetPosition(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Source,
    Run,
    Seek,
}

impl TransportCommand {
    fn kind(&self) -> CommandKind {
        match self {
            TransportCommand::SetSource(_) => CommandKind::Source,
            TransportCommand::Start | TransportCommand::Stop => CommandKind::Run,
            TransportCommand::SetPosition(_) => CommandKind::Seek,
        }
    }
}

impl fmt::Debug for TransportCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportCommand::SetSource(Some(source)) => {
                write!(f, "SetSource({})", source.path().display())
            }
            TransportCommand::SetSource(None) => f.write_str("SetSource(none)"),
            TransportCommand::Start => f.write_str("Start"),
            TransportCommand::Stop => f.write_str("Stop"),
            TransportCommand::SetPosition(seconds) => write!(f, "SetPosition({:.3}s)", seconds),
        }
    }
}

/// State published across the thread boundary
#[derive(Debug, Default)]
struct TransportShared {
    playing: AtomicBool,
    // raised by the renderer when a non-looping source runs out
    finished: AtomicBool,
    position_bits: AtomicU64,
    sample_rate: AtomicU32,
    block_size: AtomicU32,
}

impl TransportShared {
    fn position(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    fn set_position(&self, seconds: f64) {
        self.position_bits.store(seconds.to_bits(), Ordering::Release);
    }
}

/// UI-side handle of the transport
pub struct Transport {
    commands: HeapProd<TransportCommand>,
    retired: HeapCons<SourceHandle>,
    backlog: VecDeque<TransportCommand>,
    shared: Arc<TransportShared>,
    has_source: bool,
    listeners: Vec<UnboundedSender<TransportChange>>,
}

/// Audio-side half of the transport, owned by the device callback
pub struct TransportRenderer {
    commands: HeapCons<TransportCommand>,
    retired: HeapProd<SourceHandle>,
    shared: Arc<TransportShared>,
    source: Option<SourceHandle>,
    // a replaced source that did not fit in the retired ring
    pending_retire: Option<SourceHandle>,
    resampler: LinearResampler,
    playing: bool,
    device_rate: u32,
}

impl Transport {
    /// Create a connected transport handle and renderer
    pub fn new() -> (Transport, TransportRenderer) {
        let (command_tx, command_rx) = HeapRb::<TransportCommand>::new(COMMAND_QUEUE_CAPACITY).split();
        let (retired_tx, retired_rx) = HeapRb::<SourceHandle>::new(RETIRED_QUEUE_CAPACITY).split();
        let shared = Arc::new(TransportShared::default());

        let transport = Transport {
            commands: command_tx,
            retired: retired_rx,
            backlog: VecDeque::new(),
            shared: Arc::clone(&shared),
            has_source: false,
            listeners: Vec::new(),
        };

        let renderer = TransportRenderer {
            commands: command_rx,
            retired: retired_tx,
            shared,
            source: None,
            pending_retire: None,
            resampler: LinearResampler::new(0, 0),
            playing: false,
            device_rate: 0,
        };

        (transport, renderer)
    }

    /// Sample rate the renderer was last prepared with, if any
    pub fn sample_rate(&self) -> Option<u32> {
        match self.shared.sample_rate.load(Ordering::Acquire) {
            0 => None,
            rate => Some(rate),
        }
    }

    pub fn block_size(&self) -> Option<usize> {
        match self.shared.block_size.load(Ordering::Acquire) {
            0 => None,
            size => Some(size as usize),
        }
    }

    /// Housekeeping on the UI thread: flush queued commands, drop sources
    /// the renderer has let go of, and turn end-of-stream into a
    /// "stopped" notification.
    pub fn poll(&mut self) {
        self.flush_backlog();

        while let Some(source) = self.retired.try_pop() {
            trace!("Releasing retired source {}", source.path().display());
            drop(source);
        }

        if self.shared.finished.swap(false, Ordering::AcqRel)
            && self.shared.playing.swap(false, Ordering::AcqRel)
        {
            debug!("Source reached its end");
            self.broadcast(TransportChange { playing: false });
        }
    }

    /// Number of commands waiting for room in the queue
    pub fn pending_commands(&self) -> usize {
        self.backlog.len()
    }

    fn send(&mut self, command: TransportCommand) {
        self.flush_backlog();

        if !self.backlog.is_empty() {
            self.defer(command);
            return;
        }

        if let Err(command) = self.commands.try_push(command) {
            warn!("Transport command queue full, deferring {:?}", command);
            self.defer(command);
        }
    }

    /// Park a command behind the full ring. Only the latest command of each
    /// kind is kept, so the backlog stays bounded when nothing drains the ring.
    fn defer(&mut self, command: TransportCommand) {
        let kind = command.kind();
        self.backlog.retain(|queued| queued.kind() != kind);
        self.backlog.push_back(command);
    }

    fn flush_backlog(&mut self) {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(command) = self.commands.try_push(command) {
                self.backlog.push_front(command);
                break;
            }
        }
    }

    fn broadcast(&mut self, change: TransportChange) {
        self.listeners.retain(|listener| listener.send(change).is_ok());
    }
}

impl AudioTransport for Transport {
    fn set_source(&mut self, source: Option<SourceHandle>) {
        self.has_source = source.is_some();
        self.shared.playing.store(false, Ordering::Release);
        self.shared.finished.store(false, Ordering::Release);
        self.shared.set_position(0.0);
        self.send(TransportCommand::SetSource(source));
    }

    fn start(&mut self) {
        if !self.has_source {
            debug!("Start requested with no source bound");
            self.broadcast(TransportChange { playing: false });
            return;
        }

        if !self.shared.playing.swap(true, Ordering::AcqRel) {
            self.shared.finished.store(false, Ordering::Release);
            self.send(TransportCommand::Start);
            self.broadcast(TransportChange { playing: true });
        }
    }

    fn stop(&mut self) {
        if self.shared.playing.swap(false, Ordering::AcqRel) {
            self.send(TransportCommand::Stop);
            self.broadcast(TransportChange { playing: false });
        }
    }

    fn set_position(&mut self, seconds: f64) {
        let seconds = seconds.max(0.0);
        self.shared.finished.store(false, Ordering::Release);
        self.shared.set_position(seconds);
        self.send(TransportCommand::SetPosition(seconds));
    }

    fn position(&self) -> f64 {
        self.shared.position()
    }

    fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    fn subscribe(&mut self) -> UnboundedReceiver<TransportChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }
}

impl TransportRenderer {
    fn apply_commands(&mut self) {
        if !self.flush_retired() {
            return;
        }

        while let Some(command) = self.commands.try_pop() {
            match command {
                TransportCommand::SetSource(source) => {
                    self.playing = false;
                    self.resampler.reset();
                    let src_rate = source.as_ref().map(|s| s.sample_rate()).unwrap_or(0);
                    self.resampler.set_rates(src_rate, self.device_rate);
                    let previous = std::mem::replace(&mut self.source, source);
                    self.retire(previous);
                    // the next source swap waits until the parked one is handed back
                    if self.pending_retire.is_some() {
                        return;
                    }
                }
                TransportCommand::Start => {
                    self.playing = self.source.is_some();
                }
                TransportCommand::Stop => {
                    self.playing = false;
                }
                TransportCommand::SetPosition(seconds) => {
                    self.resampler.seek_seconds(seconds);
                }
            }
        }
    }

    fn retire(&mut self, source: Option<SourceHandle>) {
        if let Some(source) = source {
            if let Err(source) = self.retired.try_push(source) {
                self.pending_retire = Some(source);
            }
        }
    }

    /// Retry handing back a parked source. False while the ring is still full.
    fn flush_retired(&mut self) -> bool {
        match self.pending_retire.take() {
            None => true,
            Some(source) => match self.retired.try_push(source) {
                Ok(()) => true,
                Err(source) => {
                    self.pending_retire = Some(source);
                    false
                }
            },
        }
    }
}

impl TransportRender for TransportRenderer {
    fn prepare_to_play(&mut self, block_size: usize, sample_rate: u32) {
        self.device_rate = sample_rate;
        let src_rate = self.source.as_ref().map(|s| s.sample_rate()).unwrap_or(0);
        self.resampler.set_rates(src_rate, sample_rate);
        self.shared.sample_rate.store(sample_rate, Ordering::Release);
        self.shared.block_size.store(block_size as u32, Ordering::Release);
    }

    fn get_next_audio_block(&mut self, block: &mut AudioBlock<'_>) {
        self.apply_commands();

        let source = match (&self.source, self.playing) {
            (Some(source), true) => source,
            _ => return,
        };

        let outcome = self.resampler.render(source, block);
        self.shared.set_position(self.resampler.position_seconds());

        if outcome.finished {
            self.playing = false;
            self.shared.finished.store(true, Ordering::Release);
        }
    }

    fn release_resources(&mut self) {
        self.playing = false;
    }
}
