use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A fully decoded, seekable audio stream held in memory as interleaved f32.
///
/// Decoding happens up front so the audio callback only ever reads memory.
#[derive(Debug)]
pub struct DecodedSource {
    path: PathBuf,
    format_name: String,
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    looping: AtomicBool,
}

impl DecodedSource {
    pub fn new(
        path: impl Into<PathBuf>,
        format_name: impl Into<String>,
        samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> Self {
        let channels = channels.max(1);
        let mut samples = samples;
        samples.truncate(samples.len() - samples.len() % channels);

        Self {
            path: path.into(),
            format_name: format_name.into(),
            samples,
            channels,
            sample_rate,
            looping: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human readable container name, e.g. "WAV file"
    pub fn format_name(&self) -> &str {
        &self.format_name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Sample of `channel` at `frame`; out-of-range reads are silent
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples
            .get(frame * self.channels + channel)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_and_duration() {
        let source = DecodedSource::new("a.wav", "WAV file", vec![0.0; 88_200], 2, 44_100);
        assert_eq!(source.frames(), 44_100);
        assert_eq!(source.duration(), Duration::from_secs(1));
        assert_eq!(source.format_name(), "WAV file");
        assert_eq!(source.path(), Path::new("a.wav"));
    }

    #[test]
    fn test_partial_frame_is_dropped() {
        let source = DecodedSource::new("a.wav", "WAV file", vec![0.1, 0.2, 0.3], 2, 8_000);
        assert_eq!(source.frames(), 1);
        assert_eq!(source.sample(1, 0), 0.0);
    }

    #[test]
    fn test_sample_lookup() {
        let source = DecodedSource::new("a.wav", "WAV file", vec![0.1, 0.2, 0.3, 0.4], 2, 8_000);
        assert_eq!(source.sample(0, 0), 0.1);
        assert_eq!(source.sample(0, 1), 0.2);
        assert_eq!(source.sample(1, 1), 0.4);
        assert_eq!(source.sample(5, 0), 0.0);
    }

    #[test]
    fn test_looping_flag() {
        let source = DecodedSource::new("a.mp3", "MP3 file", vec![0.0; 4], 1, 8_000);
        assert!(!source.is_looping());
        source.set_looping(true);
        assert!(source.is_looping());
    }

    #[test]
    fn test_zero_sample_rate_has_no_duration() {
        let source = DecodedSource::new("a.wav", "WAV file", vec![0.0; 4], 1, 0);
        assert_eq!(source.duration(), Duration::ZERO);
    }
}
