pub mod buffer;
pub mod decoder;
pub mod device;
pub mod output;
pub mod resampler;
pub mod source;
pub mod transport;

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use crate::error::DecodeError;

pub use buffer::AudioBlock;
pub use decoder::{AudioFormatEntry, SymphoniaFormatRegistry};
pub use device::{DeviceInfo, DeviceManager};
pub use output::AudioOutput;
pub use resampler::LinearResampler;
pub use source::DecodedSource;
pub use transport::{Transport, TransportRenderer};

/// Shared handle to a decoded source; the controller holds the only
/// long-lived reference outside the transport.
pub type SourceHandle = Arc<DecodedSource>;

/// Playing/stopped status carried by a transport change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportChange {
    pub playing: bool,
}

/// Control side of a playback transport. Called from the UI thread only.
pub trait AudioTransport {
    /// Bind a new source (or none). Playback stops and the position resets.
    fn set_source(&mut self, source: Option<SourceHandle>);

    fn start(&mut self);

    fn stop(&mut self);

    /// Move the play head, in seconds
    fn set_position(&mut self, seconds: f64);

    /// Play head in seconds, as last published by the audio side
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;

    /// Register for change notifications, delivered in order
    fn subscribe(&mut self) -> UnboundedReceiver<TransportChange>;
}

/// Audio side of a playback transport, driven by the device callback.
///
/// Implementations must not block, allocate or touch the filesystem.
pub trait TransportRender: Send {
    fn prepare_to_play(&mut self, block_size: usize, sample_rate: u32);

    /// Write the next block of output. The block arrives zeroed.
    fn get_next_audio_block(&mut self, block: &mut AudioBlock<'_>);

    fn release_resources(&mut self) {}
}

/// Creates decoded sources for files
pub trait FormatRegistry {
    fn create_reader_for(&self, path: &Path) -> Result<SourceHandle, DecodeError>;
}
