/// One interleaved block of output samples handed to the device callback.
///
/// Borrows the device's memory; never allocates.
pub struct AudioBlock<'a> {
    samples: &'a mut [f32],
    channels: usize,
}

impl<'a> AudioBlock<'a> {
    /// Wrap an interleaved buffer. `samples.len()` should be a multiple of
    /// `channels`; a trailing partial frame is left untouched by `frame_mut`.
    pub fn new(samples: &'a mut [f32], channels: usize) -> Self {
        Self {
            samples,
            channels: channels.max(1),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &*self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut *self.samples
    }

    /// Interleaved samples of one frame
    pub fn frame_mut(&mut self, frame: usize) -> &mut [f32] {
        let start = frame * self.channels;
        &mut self.samples[start..start + self.channels]
    }

    /// Zero the whole block
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }
}
