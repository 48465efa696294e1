use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio::{DecodedSource, FormatRegistry, SourceHandle};
use crate::error::DecodeError;

/// A container format the registry will try to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFormatEntry {
    pub name: &'static str,
    pub extensions: &'static [&'static str],
}

const BASIC_FORMATS: &[AudioFormatEntry] = &[
    AudioFormatEntry { name: "WAV file", extensions: &["wav", "wave", "bwf"] },
    AudioFormatEntry { name: "AIFF file", extensions: &["aiff", "aif", "aifc"] },
    AudioFormatEntry { name: "FLAC file", extensions: &["flac"] },
    AudioFormatEntry { name: "Ogg-Vorbis file", extensions: &["ogg", "oga"] },
    AudioFormatEntry { name: "MP3 file", extensions: &["mp3"] },
];

/// Format registry backed by symphonia.
///
/// Files are decoded completely into memory when opened, so playback never
/// reads from disk on the audio thread.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaFormatRegistry {
    formats: Vec<AudioFormatEntry>,
}

impl SymphoniaFormatRegistry {
    /// An empty registry; nothing can be opened until formats are registered
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_basic_formats() -> Self {
        let mut registry = Self::new();
        registry.register_basic_formats();
        registry
    }

    pub fn register_basic_formats(&mut self) {
        for format in BASIC_FORMATS {
            self.register_format(format.clone());
        }
    }

    pub fn register_format(&mut self, format: AudioFormatEntry) {
        if !self.formats.contains(&format) {
            self.formats.push(format);
        }
    }

    pub fn formats(&self) -> &[AudioFormatEntry] {
        &self.formats
    }

    /// Wildcard list of every registered extension, e.g. `*.wav;*.mp3`
    pub fn wildcard_filter(&self) -> String {
        self.formats
            .iter()
            .flat_map(|f| f.extensions.iter())
            .map(|ext| format!("*.{}", ext))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn find_format_for(&self, path: &Path) -> Option<&AudioFormatEntry> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.formats
            .iter()
            .find(|f| f.extensions.contains(&extension.as_str()))
    }

    fn decode_file(path: &Path, format: &AudioFormatEntry) -> Result<DecodedSource, DecodeError> {
        let file = File::open(path).map_err(|e| {
            DecodeError::Unreadable(format!("{}: {}", path.display(), e))
        })?;

        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext_str) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext_str);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| DecodeError::CorruptedFile(format!("{} probe failed: {}", format.name, e)))?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::CorruptedFile("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat {
                format: format!("{} codec: {}", format.name, e),
            })?;

        let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
        let mut samples: Vec<f32> = Vec::new();
        let mut sample_buffer: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to read packet: {}", err)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let capacity = decoded.capacity() as u64;

                    if channels == 0 {
                        channels = spec.channels.count();
                    }
                    if sample_rate == 0 {
                        sample_rate = spec.rate;
                    }

                    let needs_new = sample_buffer
                        .as_ref()
                        .map_or(true, |buf| buf.capacity() < decoded.capacity() * spec.channels.count());
                    if needs_new {
                        sample_buffer = Some(SampleBuffer::<f32>::new(capacity, spec));
                    }

                    if let Some(buf) = sample_buffer.as_mut() {
                        buf.copy_interleaved_ref(decoded);
                        samples.extend_from_slice(buf.samples());
                    }
                }
                Err(SymphoniaError::DecodeError(err)) => {
                    // A damaged packet is skipped, the rest of the stream stays usable
                    warn!("Skipping undecodable packet in {}: {}", path.display(), err);
                }
                Err(err) => {
                    return Err(DecodeError::DecodeFailed(format!("Failed to decode packet: {}", err)));
                }
            }
        }

        if samples.is_empty() || channels == 0 || sample_rate == 0 {
            return Err(DecodeError::CorruptedFile("No audio frames could be decoded".to_string()));
        }

        debug!(
            "Decoded {} ({} Hz, {} channels, {} samples)",
            path.display(),
            sample_rate,
            channels,
            samples.len()
        );

        Ok(DecodedSource::new(path, format.name, samples, channels, sample_rate))
    }
}

impl FormatRegistry for SymphoniaFormatRegistry {
    fn create_reader_for(&self, path: &Path) -> Result<SourceHandle, DecodeError> {
        let format = self.find_format_for(path).ok_or_else(|| DecodeError::UnsupportedFormat {
            format: path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no file extension".to_string()),
        })?;

        Self::decode_file(path, format).map(Arc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, channels: u16, sample_rate: u32, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in 0..frames {
            for channel in 0..channels {
                let value = if channel == 0 { 8192 } else { -8192 };
                writer.write_sample((value + frame as i32 % 2) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_basic_formats_registered() {
        let registry = SymphoniaFormatRegistry::with_basic_formats();
        let names: Vec<_> = registry.formats().iter().map(|f| f.name).collect();

        assert!(names.contains(&"WAV file"));
        assert!(names.contains(&"MP3 file"));
        assert!(registry.wildcard_filter().contains("*.wav"));
        assert!(registry.wildcard_filter().contains("*.mp3"));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = SymphoniaFormatRegistry::with_basic_formats();
        let count = registry.formats().len();
        registry.register_basic_formats();
        assert_eq!(registry.formats().len(), count);
    }

    #[test]
    fn test_find_format_is_case_insensitive() {
        let registry = SymphoniaFormatRegistry::with_basic_formats();
        let format = registry.find_format_for(Path::new("/music/Track.WAV")).unwrap();
        assert_eq!(format.name, "WAV file");
        assert!(registry.find_format_for(Path::new("/music/notes.txt")).is_none());
        assert!(registry.find_format_for(Path::new("/music/no_extension")).is_none());
    }

    #[test]
    fn test_decode_wav() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("track.wav");
        write_wav(&path, 2, 44_100, 1000);

        let registry = SymphoniaFormatRegistry::with_basic_formats();
        let source = registry.create_reader_for(&path).unwrap();

        assert_eq!(source.format_name(), "WAV file");
        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 44_100);
        assert_eq!(source.frames(), 1000);
        assert!((source.sample(0, 0) - 0.25).abs() < 1e-3);
        assert!((source.sample(0, 1) + 0.25).abs() < 1e-3);
        assert!(!source.is_looping());
    }

    #[test]
    fn test_unregistered_extension_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let registry = SymphoniaFormatRegistry::with_basic_formats();
        match registry.create_reader_for(&path) {
            Err(DecodeError::UnsupportedFormat { format }) => assert_eq!(format, "txt"),
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_registry_rejects_everything() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("track.wav");
        write_wav(&path, 1, 8_000, 10);

        let registry = SymphoniaFormatRegistry::new();
        assert!(matches!(
            registry.create_reader_for(&path),
            Err(DecodeError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let registry = SymphoniaFormatRegistry::with_basic_formats();
        assert!(matches!(
            registry.create_reader_for(Path::new("/nonexistent/track.wav")),
            Err(DecodeError::Unreadable(_))
        ));
    }

    #[test]
    fn test_garbage_content_is_corrupted() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("fake.wav");
        std::fs::write(&path, b"this is not audio data at all").unwrap();

        let registry = SymphoniaFormatRegistry::with_basic_formats();
        assert!(matches!(
            registry.create_reader_for(&path),
            Err(DecodeError::CorruptedFile(_))
        ));
    }
}
