//! Band-shaping filter stage
//!
//! One reconfigurable biquad sits between the source node and the gain
//! stage. Frequency-test pages drive it with human-readable range labels
//! ("0-1k", "2-3k", ...); the label is translated into concrete filter
//! parameters here. Coefficients follow the RBJ cookbook; the filter runs
//! as transposed direct form II with independent state per channel.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Frequencies below this are treated as degenerate and floored.
const MIN_FREQUENCY_HZ: f32 = 20.0;

/// Q clamp range; outside this the band becomes numerically unstable or
/// absurdly narrow/wide.
const MIN_Q: f32 = 0.1;
const MAX_Q: f32 = 50.0;

/// Filter response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Lowpass,
    Bandpass,
    Highpass,
}

/// Concrete filter parameters derived from a range label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub mode: FilterMode,
    /// Center (bandpass) or cutoff (lowpass/highpass) frequency in Hz.
    pub frequency: f32,
    pub q: f32,
}

impl FilterSpec {
    /// The default configuration before any band is chosen: a highpass with
    /// a near-zero cutoff, so the unmodified signal is audible.
    pub fn passthrough() -> Self {
        Self {
            mode: FilterMode::Highpass,
            frequency: MIN_FREQUENCY_HZ,
            q: MIN_Q,
        }
    }

    /// Translate a range label like "0-1k" or "2-3k" into filter parameters.
    ///
    /// Each side may carry a `k`/`kHz` suffix meaning x1000; a bare left
    /// side inherits the right side's suffix, so "2-3k" reads as 2k-3k.
    /// Returns `None` for malformed labels and inverted or empty ranges —
    /// callers keep their previous configuration in that case.
    pub fn from_range_label(label: &str) -> Option<Self> {
        let (low, high) = parse_range(label)?;

        if low == 0.0 && high <= 1000.0 {
            return Some(Self {
                mode: FilterMode::Lowpass,
                frequency: high.max(MIN_FREQUENCY_HZ),
                q: 1.0,
            });
        }

        let center = (low + high) / 2.0;
        let bandwidth = (high - low).max(1.0);
        let mut q = center / bandwidth;
        if !q.is_finite() || q <= 0.0 {
            q = 1.0;
        }
        Some(Self {
            mode: FilterMode::Bandpass,
            frequency: center.max(MIN_FREQUENCY_HZ),
            q: q.clamp(MIN_Q, MAX_Q),
        })
    }
}

/// Parse one side of a range label, honoring `k`/`kHz` suffixes.
/// Returns the value and whether a suffix was present.
fn parse_side(s: &str) -> Option<(f32, bool)> {
    let t = s.trim().to_ascii_lowercase();
    if let Some(v) = t.strip_suffix("khz") {
        return v.trim().parse::<f32>().ok().map(|v| (v * 1000.0, true));
    }
    if let Some(v) = t.strip_suffix('k') {
        return v.trim().parse::<f32>().ok().map(|v| (v * 1000.0, true));
    }
    t.parse::<f32>().ok().map(|v| (v, false))
}

/// Parse a "low-high" label into a (low, high) pair in Hz.
fn parse_range(label: &str) -> Option<(f32, f32)> {
    let mut parts = label.splitn(2, '-');
    let left = parts.next()?;
    let right = parts.next()?;

    let (mut low, low_suffixed) = parse_side(left)?;
    let (high, high_suffixed) = parse_side(right)?;

    // "2-3k" means 2k-3k: a bare left side inherits the right suffix.
    if high_suffixed && !low_suffixed {
        low *= 1000.0;
    }

    if !low.is_finite() || !high.is_finite() || high <= low || low < 0.0 {
        return None;
    }
    Some((low, high))
}

/// RBJ biquad with independent delay state per stereo channel.
pub struct BiquadFilter {
    spec: FilterSpec,
    sample_rate: f32,
    // Coefficients (normalized by a0)
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    // Transposed DF2 state, one pair per channel
    z1: [f32; 2],
    z2: [f32; 2],
}

impl BiquadFilter {
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            spec: FilterSpec::passthrough(),
            sample_rate: sample_rate.max(1.0),
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: [0.0; 2],
            z2: [0.0; 2],
        };
        filter.update_coeffs();
        filter
    }

    pub fn spec(&self) -> FilterSpec {
        self.spec
    }

    /// Reconfigure in place. Delay state is kept so a band change is
    /// click-free mid-playback.
    pub fn set_spec(&mut self, spec: FilterSpec) {
        self.spec = spec;
        self.update_coeffs();
    }

    /// Drop accumulated delay state (used when a new stimulus is installed).
    pub fn reset_state(&mut self) {
        self.z1 = [0.0; 2];
        self.z2 = [0.0; 2];
    }

    /// Process one stereo frame.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.process_channel(0, left), self.process_channel(1, right))
    }

    #[inline]
    fn process_channel(&mut self, ch: usize, input: f32) -> f32 {
        let out = self.b0 * input + self.z1[ch];
        self.z1[ch] = self.b1 * input + self.z2[ch] - self.a1 * out;
        self.z2[ch] = self.b2 * input - self.a2 * out;
        out
    }

    fn update_coeffs(&mut self) {
        let nyquist = self.sample_rate * 0.49;
        let freq = self.spec.frequency.clamp(MIN_FREQUENCY_HZ * 0.5, nyquist.max(MIN_FREQUENCY_HZ));
        let q = self.spec.q.clamp(MIN_Q, MAX_Q);

        let omega = 2.0 * PI * freq / self.sample_rate;
        let sin_w0 = omega.sin();
        let cos_w0 = omega.cos();
        let alpha = sin_w0 / (2.0 * q);

        let (b0, b1, b2, a0, a1, a2) = match self.spec.mode {
            FilterMode::Lowpass => {
                let b1 = 1.0 - cos_w0;
                let b0 = b1 / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterMode::Highpass => {
                let b1 = -(1.0 + cos_w0);
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterMode::Bandpass => {
                // Constant-skirt bandpass; gain parameter not used.
                (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
        };

        let a0 = if a0.abs() < 1e-12 { 1.0 } else { a0 };
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowpass_mapping() {
        let spec = FilterSpec::from_range_label("0-1k").unwrap();
        assert_eq!(spec.mode, FilterMode::Lowpass);
        assert_eq!(spec.frequency, 1000.0);
        assert_eq!(spec.q, 1.0);

        let spec = FilterSpec::from_range_label("0-500").unwrap();
        assert_eq!(spec.mode, FilterMode::Lowpass);
        assert_eq!(spec.frequency, 500.0);
    }

    #[test]
    fn test_degenerate_lowpass_cutoff_floored() {
        let spec = FilterSpec::from_range_label("0-10").unwrap();
        assert_eq!(spec.mode, FilterMode::Lowpass);
        assert_eq!(spec.frequency, 20.0);
    }

    #[test]
    fn test_bandpass_mapping() {
        // "2-3k" reads as 2000-3000 Hz.
        let spec = FilterSpec::from_range_label("2-3k").unwrap();
        assert_eq!(spec.mode, FilterMode::Bandpass);
        assert_eq!(spec.frequency, 2500.0);
        assert!((spec.q - 2.5).abs() < 1e-6);

        let spec = FilterSpec::from_range_label("1k-2kHz").unwrap();
        assert_eq!(spec.mode, FilterMode::Bandpass);
        assert_eq!(spec.frequency, 1500.0);
        assert!((spec.q - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_q_is_clamped() {
        // 19k-20k: center 19500, bandwidth 1000 -> Q 19.5, inside the clamp.
        let spec = FilterSpec::from_range_label("19-20k").unwrap();
        assert!(spec.q >= MIN_Q && spec.q <= MAX_Q);

        // A very narrow band would compute an enormous Q; it must clamp.
        let spec = FilterSpec::from_range_label("9999-10000").unwrap();
        assert_eq!(spec.q, MAX_Q);
    }

    #[test]
    fn test_invalid_labels_rejected() {
        // "2-1k" reads as 2k-1k, which is inverted.
        assert!(FilterSpec::from_range_label("2-1k").is_none());
        assert!(FilterSpec::from_range_label("abc").is_none());
        assert!(FilterSpec::from_range_label("1k").is_none());
        assert!(FilterSpec::from_range_label("").is_none());
        assert!(FilterSpec::from_range_label("5-5").is_none());
    }

    #[test]
    fn test_passthrough_default() {
        let spec = FilterSpec::passthrough();
        assert_eq!(spec.mode, FilterMode::Highpass);
        assert_eq!(spec.frequency, 20.0);
    }

    #[test]
    fn test_biquad_coeffs_finite() {
        let mut filter = BiquadFilter::new(44100.0);
        for label in ["0-1k", "2-3k", "19-20k", "0-10"] {
            filter.set_spec(FilterSpec::from_range_label(label).unwrap());
            let (l, r) = filter.process(0.5, -0.5);
            assert!(l.is_finite() && r.is_finite());
        }
    }

    #[test]
    fn test_passthrough_passes_midband_signal() {
        // A 1 kHz sine should come through the default highpass at 20 Hz
        // essentially unattenuated once the filter settles.
        let sample_rate = 44100.0;
        let mut filter = BiquadFilter::new(sample_rate);
        let mut peak = 0.0f32;
        for n in 0..4410 {
            let x = (2.0 * PI * 1000.0 * n as f32 / sample_rate).sin();
            let (l, _) = filter.process(x, x);
            if n > 2205 {
                peak = peak.max(l.abs());
            }
        }
        assert!(peak > 0.9, "passthrough attenuated signal: peak={}", peak);
    }
}
