//! Intensity (gain) stage
//!
//! Maps the normalized intensity level [0,1] straight onto signal amplitude.
//! The change is deliberately immediate rather than ramped: the assessor
//! needs to hear an instantaneous, repeatable level change while sweeping
//! the slider. Newly built graphs start at zero to avoid a startle artifact
//! on the first play.

/// Linear gain stage for the stimulus chain.
#[derive(Debug, Clone, Copy)]
pub struct GainStage {
    level: f32,
}

impl GainStage {
    /// A muted stage; the caller's initialization applies the real level.
    pub fn muted() -> Self {
        Self { level: 0.0 }
    }

    /// Set the intensity level, clamped to [0,1]. Applied immediately.
    pub fn set_level(&mut self, level: f32) {
        self.level = if level.is_finite() {
            level.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Scale one stereo frame.
    #[inline]
    pub fn process(&self, left: f32, right: f32) -> (f32, f32) {
        (left * self.level, right * self.level)
    }
}
