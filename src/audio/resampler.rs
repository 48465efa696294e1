/*!
Linear-interpolating play head over a [`DecodedSource`].

- Converts from the source sample rate to the device rate while reading.
- Maps source channels onto output channels (output channel `c` reads
  source channel `c % source_channels`, so mono feeds every output).
- Wraps around at the end of looping sources and reports the end otherwise.
- Keeps no buffers of its own; safe to drive from the audio callback.
*/

use crate::audio::{AudioBlock, DecodedSource};

/// Outcome of one [`LinearResampler::render`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOutcome {
    pub frames_written: usize,
    /// A non-looping source ran out during this block
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    // source frames per output frame
    step: f64,
    // play head in source frames
    position: f64,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32) -> Self {
        Self {
            src_rate,
            dst_rate,
            step: Self::compute_step(src_rate, dst_rate),
            position: 0.0,
        }
    }

    fn compute_step(src_rate: u32, dst_rate: u32) -> f64 {
        if src_rate == 0 || dst_rate == 0 {
            1.0
        } else {
            src_rate as f64 / dst_rate as f64
        }
    }

    pub fn set_rates(&mut self, src_rate: u32, dst_rate: u32) {
        self.src_rate = src_rate;
        self.dst_rate = dst_rate;
        self.step = Self::compute_step(src_rate, dst_rate);
    }

    pub fn rates(&self) -> (u32, u32) {
        (self.src_rate, self.dst_rate)
    }

    pub fn reset(&mut self) {
        self.position = 0.0;
    }

    /// Move the play head, in seconds of source time
    pub fn seek_seconds(&mut self, seconds: f64) {
        self.position = (seconds.max(0.0) * self.src_rate as f64).max(0.0);
    }

    pub fn position_seconds(&self) -> f64 {
        if self.src_rate == 0 {
            0.0
        } else {
            self.position / self.src_rate as f64
        }
    }

    /// Write interpolated frames from `source` into `block`, starting at the
    /// play head. Frames past the end of a non-looping source are left as is.
    pub fn render(&mut self, source: &DecodedSource, block: &mut AudioBlock<'_>) -> RenderOutcome {
        let total = source.frames();
        if total == 0 {
            return RenderOutcome { frames_written: 0, finished: true };
        }

        let looping = source.is_looping();
        let src_channels = source.channels();
        let out_channels = block.channels();
        let end = total as f64;
        let mut written = 0;

        for frame in 0..block.frames() {
            if self.position >= end {
                if looping {
                    self.position %= end;
                } else {
                    return RenderOutcome { frames_written: written, finished: true };
                }
            }

            let index = self.position as usize;
            let next = if index + 1 < total {
                index + 1
            } else if looping {
                0
            } else {
                index
            };
            let frac = (self.position - index as f64) as f32;

            let out = block.frame_mut(frame);
            for (channel, slot) in out.iter_mut().enumerate().take(out_channels) {
                let src_channel = channel % src_channels;
                let a = source.sample(index, src_channel);
                let b = source.sample(next, src_channel);
                *slot = a + (b - a) * frac;
            }

            self.position += self.step;
            written += 1;
        }

        let finished = !looping && self.position >= end;
        RenderOutcome { frames_written: written, finished }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_source(frames: usize, channels: usize, rate: u32) -> DecodedSource {
        let samples = (0..frames)
            .flat_map(|f| (0..channels).map(move |c| f as f32 + c as f32 * 0.5))
            .collect();
        DecodedSource::new("ramp.wav", "WAV file", samples, channels, rate)
    }

    #[test]
    fn test_same_rate_copies_frames() {
        let source = ramp_source(8, 2, 48_000);
        let mut rs = LinearResampler::new(48_000, 48_000);
        let mut data = vec![0.0f32; 8];
        let outcome = rs.render(&source, &mut AudioBlock::new(&mut data, 2));

        assert_eq!(outcome, RenderOutcome { frames_written: 4, finished: false });
        assert_eq!(data, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
    }

    #[test]
    fn test_upsampling_interpolates() {
        let source = ramp_source(4, 1, 24_000);
        let mut rs = LinearResampler::new(24_000, 48_000);
        let mut data = vec![0.0f32; 4];
        rs.render(&source, &mut AudioBlock::new(&mut data, 1));

        assert_eq!(data, vec![0.0, 0.5, 1.0, 1.5]);
        assert!((rs.position_seconds() - 2.0 / 24_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_mono_feeds_all_outputs() {
        let source = ramp_source(2, 1, 8_000);
        let mut rs = LinearResampler::new(8_000, 8_000);
        let mut data = vec![0.0f32; 4];
        rs.render(&source, &mut AudioBlock::new(&mut data, 2));

        assert_eq!(data, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_non_looping_end_leaves_tail_untouched() {
        let source = ramp_source(3, 1, 4);
        let mut rs = LinearResampler::new(4, 4);
        rs.seek_seconds(0.25);
        let mut data = vec![-1.0f32; 5];
        let outcome = rs.render(&source, &mut AudioBlock::new(&mut data, 1));

        assert_eq!(outcome, RenderOutcome { frames_written: 2, finished: true });
        assert_eq!(data, vec![1.0, 2.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_looping_wraps_around() {
        let source = ramp_source(3, 1, 8_000);
        source.set_looping(true);
        let mut rs = LinearResampler::new(8_000, 8_000);
        let mut data = vec![0.0f32; 7];
        let outcome = rs.render(&source, &mut AudioBlock::new(&mut data, 1));

        assert_eq!(outcome, RenderOutcome { frames_written: 7, finished: false });
        assert_eq!(data, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_empty_source_finishes_immediately() {
        let source = DecodedSource::new("empty.wav", "WAV file", Vec::new(), 2, 44_100);
        let mut rs = LinearResampler::new(44_100, 44_100);
        let mut data = vec![0.0f32; 4];
        let outcome = rs.render(&source, &mut AudioBlock::new(&mut data, 2));

        assert!(outcome.finished);
        assert_eq!(outcome.frames_written, 0);
    }

    #[test]
    fn test_seek_and_reset() {
        let mut rs = LinearResampler::new(44_100, 48_000);
        rs.seek_seconds(2.0);
        assert!((rs.position_seconds() - 2.0).abs() < 1e-9);

        rs.seek_seconds(-3.0);
        assert_eq!(rs.position_seconds(), 0.0);

        rs.seek_seconds(1.0);
        rs.reset();
        assert_eq!(rs.position_seconds(), 0.0);
        assert_eq!(rs.rates(), (44_100, 48_000));
    }
}
