use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize};
use log::{info, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::audio::{AudioBlock, TransportRender};
use crate::error::AudioError;
use crate::playback::AudioCallbackHandler;

/// Block size reported to the renderer when the device picks its own
pub const NOMINAL_BLOCK_SIZE: usize = 512;

/// A running cpal output stream feeding an [`AudioCallbackHandler`].
///
/// Dropping it stops the device callback.
pub struct AudioOutput {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
    block_size: usize,
}

impl AudioOutput {
    /// Start `device` and render through `handler` from its callback.
    ///
    /// `prepare_to_play` is called before the first callback. Stream errors
    /// are forwarded as text through `errors` to the UI side.
    pub fn open<A>(
        device: &Device,
        mut handler: AudioCallbackHandler<A>,
        block_size: Option<u32>,
        errors: UnboundedSender<String>,
    ) -> Result<Self, AudioError>
    where
        A: TransportRender + 'static,
    {
        let device_name = device.name().unwrap_or_else(|_| "Unknown device".to_string());

        let default_config = device
            .default_output_config()
            .map_err(|e| AudioError::InitializationFailed(format!("Failed to get default config: {}", e)))?;

        let sample_format = default_config.sample_format();
        let sample_rate = default_config.sample_rate().0;
        let channels = default_config.channels();

        let (buffer_size, block) = match block_size {
            Some(requested) => match default_config.buffer_size() {
                SupportedBufferSize::Range { min, max } if requested < *min || requested > *max => {
                    warn!(
                        "Block size {} outside device range {}..={}, letting the device choose",
                        requested, min, max
                    );
                    (BufferSize::Default, NOMINAL_BLOCK_SIZE)
                }
                _ => (BufferSize::Fixed(requested), requested as usize),
            },
            None => (BufferSize::Default, NOMINAL_BLOCK_SIZE),
        };

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size,
        };

        handler.prepare_to_play(block, sample_rate);

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32, A>(device, &config, handler, block, errors)?,
            SampleFormat::F64 => Self::build_stream::<f64, A>(device, &config, handler, block, errors)?,
            SampleFormat::I16 => Self::build_stream::<i16, A>(device, &config, handler, block, errors)?,
            SampleFormat::I32 => Self::build_stream::<i32, A>(device, &config, handler, block, errors)?,
            SampleFormat::U16 => Self::build_stream::<u16, A>(device, &config, handler, block, errors)?,
            SampleFormat::U8 => Self::build_stream::<u8, A>(device, &config, handler, block, errors)?,
            other => {
                return Err(AudioError::UnsupportedSampleFormat {
                    format: format!("{:?}", other),
                })
            }
        };

        stream
            .play()
            .map_err(|e| AudioError::StreamError(format!("Failed to start output stream: {}", e)))?;

        info!(
            "Output stream started on '{}' ({} Hz, {} channels, {:?})",
            device_name, sample_rate, channels, sample_format
        );

        Ok(Self {
            _stream: stream,
            device_name,
            sample_rate,
            channels,
            block_size: block,
        })
    }

    fn build_stream<T, A>(
        device: &Device,
        config: &StreamConfig,
        mut handler: AudioCallbackHandler<A>,
        block_size: usize,
        errors: UnboundedSender<String>,
    ) -> Result<Stream, AudioError>
    where
        T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
        A: TransportRender + 'static,
    {
        let channels = config.channels.max(1) as usize;
        // Whole frames only, so chunks of the device buffer never split a frame
        let mut scratch = vec![0.0f32; block_size.max(1) * channels];

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let chunk_len = scratch.len();
                    for chunk in data.chunks_mut(chunk_len) {
                        let rendered = &mut scratch[..chunk.len()];
                        {
                            let mut block = AudioBlock::new(rendered, channels);
                            handler.render_block(&mut block);
                        }
                        for (out, sample) in chunk.iter_mut().zip(rendered.iter()) {
                            *out = cpal::Sample::from_sample(*sample);
                        }
                    }
                },
                move |err| {
                    let _ = errors.send(err.to_string());
                },
                None,
            )
            .map_err(|e| AudioError::StreamError(format!("Failed to build output stream: {}", e)))
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}
