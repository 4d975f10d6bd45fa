//! Immutable decoded audio buffers
//!
//! A `DecodedBuffer` is produced once per load and never mutated afterwards.
//! It is shared behind an `Arc` and outlives any single source node built
//! from it, which is what makes transparent node rebuilds possible.

/// Channel count of every decoded buffer. Mono input is duplicated and
/// multi-channel input is downmixed at decode time.
pub const CHANNELS: usize = 2;

/// One decoded audio asset: interleaved stereo f32 frames at a fixed sample
/// rate.
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    /// Interleaved samples [L, R, L, R, ...]
    samples: Vec<f32>,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Build a buffer from interleaved stereo samples. A trailing orphan
    /// sample (odd length) is dropped.
    pub fn from_interleaved(mut samples: Vec<f32>, sample_rate: u32) -> Self {
        if samples.len() % CHANNELS != 0 {
            samples.truncate(samples.len() - samples.len() % CHANNELS);
        }
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of stereo frames.
    pub fn frames(&self) -> usize {
        self.samples.len() / CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f32 / self.sample_rate as f32
    }

    /// Read the frame at `index`. Out-of-range reads return silence.
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        let i = index * CHANNELS;
        if i + 1 >= self.samples.len() {
            return (0.0, 0.0);
        }
        (self.samples[i], self.samples[i + 1])
    }
}
