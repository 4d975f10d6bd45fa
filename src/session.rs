//! Assessment session state
//!
//! The session is the single shared state bundle behind the wizard pages:
//! identity verification, interview details, stimulus selection, the saved
//! intensity threshold and the annoying-range registry. It owns the audio
//! engine exclusively and is the only authorized mutator of the playback
//! graph; pages read derived flags and issue transport/parameter calls
//! through it. It is passed explicitly to page controllers, never kept as
//! an ambient global.

use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::audio::buffer::DecodedBuffer;
use crate::audio::device::AudioConfig;
use crate::audio::engine::AudioEngine;
use crate::audio::error::AudioError;
use crate::audio::loader::{self, SoundSource};

/// Subject and assessor details collected on the interview page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterviewDetails {
    pub date: Option<NaiveDate>,
    pub child_name: String,
    pub child_age: String,
    pub assessor_name: String,
}

/// One frequency band the assessor marked as provoking annoyance, with the
/// intensity it was marked at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeMark {
    pub range: String,
    pub intensity: f32,
}

/// Opaque side channel that delivers a verification code to an approver.
/// The delivery mechanism (email, SMS, ...) is not this crate's concern.
pub trait CodeSender {
    fn send_code(&self, name: &str, email: &str, code: &str) -> Result<(), String>;
}

/// Serializable snapshot of the persisted assessment fields, consumed by
/// the report/export layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub session_id: Uuid,
    pub is_verified: bool,
    pub interview: InterviewDetails,
    pub selected_sound: String,
    pub intensity_threshold: f32,
    pub annoying_ranges: Vec<RangeMark>,
}

/// Process-wide assessment state, including the lazily created audio
/// engine.
pub struct AssessmentSession {
    id: Uuid,
    is_verified: bool,
    interview: InterviewDetails,
    selected_sound: String,
    intensity_threshold: f32,
    annoying_ranges: Vec<RangeMark>,
    verification_name: String,
    verification_email: String,
    sent_code: String,
    audio_config: AudioConfig,
    engine: Option<AudioEngine>,
    /// Monotonic counter arbitrating overlapping loads: only the result of
    /// the last-issued load may install its buffer.
    load_generation: u64,
}

impl AssessmentSession {
    pub fn new() -> Self {
        Self::with_config(AudioConfig::default())
    }

    pub fn with_config(audio_config: AudioConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_verified: false,
            interview: InterviewDetails::default(),
            selected_sound: String::new(),
            intensity_threshold: 0.0,
            annoying_ranges: Vec::new(),
            verification_name: String::new(),
            verification_email: String::new(),
            sent_code: String::new(),
            audio_config,
            engine: None,
            load_generation: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    // ---- verification -----------------------------------------------------

    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    pub fn set_verified(&mut self, status: bool) {
        self.is_verified = status;
    }

    /// Generate a six-digit code and hand it to the delivery side channel.
    pub fn generate_and_send_code(
        &mut self,
        name: &str,
        email: &str,
        sender: &dyn CodeSender,
    ) -> Result<(), String> {
        let code = format!("{:06}", rand::thread_rng().gen_range(100_000..1_000_000));
        self.sent_code = code.clone();
        self.verification_name = name.to_string();
        self.verification_email = email.to_string();

        sender.send_code(name, email, &code).map_err(|e| {
            log::error!("verification code delivery failed: {}", e);
            e
        })
    }

    /// Check an entered code against the one sent; a match flips the
    /// persisted verified flag.
    pub fn verify_code(&mut self, entered: &str) -> bool {
        if !entered.is_empty() && entered == self.sent_code {
            self.is_verified = true;
            return true;
        }
        false
    }

    // ---- interview details ------------------------------------------------

    pub fn interview(&self) -> &InterviewDetails {
        &self.interview
    }

    pub fn interview_mut(&mut self) -> &mut InterviewDetails {
        &mut self.interview
    }

    // ---- stimulus / engine ------------------------------------------------

    pub fn selected_sound(&self) -> &str {
        &self.selected_sound
    }

    /// Decode and install a new stimulus, creating the engine on first use.
    ///
    /// Fetch/decode failures leave the previously installed buffer (and the
    /// selected-sound label) untouched so the caller can offer a retry.
    pub fn load_sound(&mut self, source: SoundSource, label: &str) -> Result<(), AudioError> {
        self.load_generation += 1;
        let generation = self.load_generation;

        self.ensure_engine()?;
        let buffer = loader::decode(source)?;
        self.install_if_current(generation, buffer, label);
        Ok(())
    }

    /// Install a decoded buffer if its load is still the latest one issued.
    /// Stale results are discarded: last-issued wins.
    fn install_if_current(&mut self, generation: u64, buffer: Arc<DecodedBuffer>, label: &str) -> bool {
        if generation != self.load_generation {
            log::info!(
                "discarding stale load result for '{}' (generation {} < {})",
                label,
                generation,
                self.load_generation
            );
            return false;
        }
        if let Some(engine) = &self.engine {
            engine.handle().install_buffer(buffer);
        }
        self.selected_sound = label.to_string();
        true
    }

    fn ensure_engine(&mut self) -> Result<(), AudioError> {
        if self.engine.is_none() {
            self.engine = Some(AudioEngine::new(self.audio_config.clone())?);
        }
        Ok(())
    }

    pub fn play(&self) {
        if let Some(engine) = &self.engine {
            engine.handle().play();
        }
    }

    pub fn pause(&self) {
        if let Some(engine) = &self.engine {
            engine.handle().pause();
        }
    }

    pub fn resume(&self) {
        if let Some(engine) = &self.engine {
            engine.handle().resume();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.engine
            .as_ref()
            .map(|e| e.handle().is_playing())
            .unwrap_or(false)
    }

    /// Live gain control; silently ignored before any audio is loaded.
    pub fn set_intensity(&self, level: f32) {
        if let Some(engine) = &self.engine {
            engine.handle().set_intensity(level);
        }
    }

    pub fn set_frequency_range(&self, label: &str) {
        if let Some(engine) = &self.engine {
            engine.handle().set_frequency_range(label);
        }
    }

    /// Full audio teardown: stop the node, close the stream, clear the
    /// selected-sound label. Used when switching sounds or retaking the
    /// test.
    pub fn clear_audio(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.handle().shutdown();
            // Dropping the engine closes the output stream.
        }
        self.selected_sound.clear();
    }

    // ---- threshold and annoying ranges ------------------------------------

    pub fn intensity_threshold(&self) -> f32 {
        self.intensity_threshold
    }

    /// Save the dB-like threshold value read off the intensity slider.
    pub fn save_threshold(&mut self, level: f32) {
        self.intensity_threshold = if level.is_finite() { level } else { 0.0 };
    }

    pub fn annoying_ranges(&self) -> &[RangeMark] {
        &self.annoying_ranges
    }

    /// Set-membership toggle keyed by range label: present removes, absent
    /// adds. Insertion order is preserved for display.
    pub fn toggle_annoying_range(&mut self, range: &str, intensity: f32) {
        if let Some(pos) = self.annoying_ranges.iter().position(|m| m.range == range) {
            self.annoying_ranges.remove(pos);
        } else {
            self.annoying_ranges.push(RangeMark {
                range: range.to_string(),
                intensity,
            });
        }
    }

    // ---- report / reset ---------------------------------------------------

    pub fn report_snapshot(&self) -> ReportSnapshot {
        ReportSnapshot {
            session_id: self.id,
            is_verified: self.is_verified,
            interview: self.interview.clone(),
            selected_sound: self.selected_sound.clone(),
            intensity_threshold: self.intensity_threshold,
            annoying_ranges: self.annoying_ranges.clone(),
        }
    }

    /// Tear down audio and return every field to its default, for the
    /// "retake test" / whole-assessment reset action.
    pub fn reset(&mut self) {
        self.clear_audio();
        self.is_verified = false;
        self.interview = InterviewDetails::default();
        self.intensity_threshold = 0.0;
        self.annoying_ranges.clear();
        self.verification_name.clear();
        self.verification_email.clear();
        self.sent_code.clear();
        self.load_generation = 0;
    }
}

impl Default for AssessmentSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct RecordingSender {
        sent: RefCell<Vec<(String, String, String)>>,
    }

    impl RecordingSender {
        fn new() -> Self {
            Self {
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl CodeSender for RecordingSender {
        fn send_code(&self, name: &str, email: &str, code: &str) -> Result<(), String> {
            self.sent
                .borrow_mut()
                .push((name.to_string(), email.to_string(), code.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_toggle_annoying_range_involution() {
        let mut session = AssessmentSession::new();
        session.toggle_annoying_range("2-3k", 60.0);
        assert_eq!(session.annoying_ranges().len(), 1);
        assert_eq!(session.annoying_ranges()[0].range, "2-3k");

        // Toggling the same range again returns the registry to its
        // original state.
        session.toggle_annoying_range("2-3k", 80.0);
        assert!(session.annoying_ranges().is_empty());
    }

    #[test]
    fn test_toggle_preserves_insertion_order() {
        let mut session = AssessmentSession::new();
        session.toggle_annoying_range("0-1k", 40.0);
        session.toggle_annoying_range("4-5k", 55.0);
        session.toggle_annoying_range("2-3k", 70.0);
        session.toggle_annoying_range("4-5k", 0.0); // remove the middle one

        let ranges: Vec<&str> = session
            .annoying_ranges()
            .iter()
            .map(|m| m.range.as_str())
            .collect();
        assert_eq!(ranges, vec!["0-1k", "2-3k"]);
    }

    #[test]
    fn test_verification_flow() {
        let mut session = AssessmentSession::new();
        let sender = RecordingSender::new();

        session
            .generate_and_send_code("Dr. Lane", "lane@example.org", &sender)
            .unwrap();

        let sent = sender.sent.borrow();
        assert_eq!(sent.len(), 1);
        let code = sent[0].2.clone();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        drop(sent);

        assert!(!session.verify_code("000000x"));
        assert!(!session.verify_code(""));
        assert!(!session.is_verified());

        assert!(session.verify_code(&code));
        assert!(session.is_verified());
    }

    #[test]
    fn test_clear_audio_resets_selection_and_playback() {
        let mut session = AssessmentSession::new();
        // No engine exists yet; clear must still normalize state.
        session.clear_audio();
        assert_eq!(session.selected_sound(), "");
        assert!(!session.is_playing());
    }

    #[test]
    fn test_save_threshold_sanitizes_input() {
        let mut session = AssessmentSession::new();
        session.save_threshold(72.0);
        assert_eq!(session.intensity_threshold(), 72.0);
        session.save_threshold(f32::NAN);
        assert_eq!(session.intensity_threshold(), 0.0);
    }

    #[test]
    fn test_stale_load_result_is_discarded() {
        let mut session = AssessmentSession::new();
        let stale = Arc::new(DecodedBuffer::from_interleaved(vec![0.0; 4], 44100));

        // Simulate a slow load issued first (generation 1) resolving after
        // a second load has been issued (generation 2).
        session.load_generation = 2;
        assert!(!session.install_if_current(1, stale, "old-sound"));
        assert_eq!(session.selected_sound(), "");

        let fresh = Arc::new(DecodedBuffer::from_interleaved(vec![0.0; 4], 44100));
        assert!(session.install_if_current(2, fresh, "new-sound"));
        assert_eq!(session.selected_sound(), "new-sound");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut session = AssessmentSession::new();
        session.set_verified(true);
        session.interview_mut().child_name = "Ada".to_string();
        session.save_threshold(66.0);
        session.toggle_annoying_range("9-10k", 66.0);

        session.reset();
        assert!(!session.is_verified());
        assert_eq!(session.interview(), &InterviewDetails::default());
        assert_eq!(session.intensity_threshold(), 0.0);
        assert!(session.annoying_ranges().is_empty());
        assert_eq!(session.selected_sound(), "");
    }

    #[test]
    fn test_report_snapshot_roundtrip() {
        let mut session = AssessmentSession::new();
        session.set_verified(true);
        session.interview_mut().child_name = "Ada".to_string();
        session.interview_mut().date = NaiveDate::from_ymd_opt(2026, 8, 26);
        session.save_threshold(58.0);
        session.toggle_annoying_range("2-3k", 58.0);

        let snapshot = session.report_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: ReportSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.interview, snapshot.interview);
        assert_eq!(back.annoying_ranges, snapshot.annoying_ranges);
        assert_eq!(back.intensity_threshold, 58.0);
        assert!(back.is_verified);
    }
}
