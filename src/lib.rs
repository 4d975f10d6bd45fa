//! sonascreen — audio test-stimulus engine for a guided sound-sensitivity
//! assessment
//!
//! A clinical wizard measures a child's annoyance threshold to sound across
//! identity verification, subject details, intensity calibration and
//! frequency-band marking. This crate implements the part with real
//! invariants: the stimulus engine (decode, loop, filter, gain, transport)
//! and the session state the wizard pages read and write. UI layout,
//! routing and report rendering live elsewhere and call in through
//! [`session::AssessmentSession`].

pub mod audio;
pub mod logging;
pub mod session;

pub use audio::{AudioEngine, AudioEngineHandle, AudioError, DecodedBuffer, EngineState};
pub use audio::{FilterMode, FilterSpec, SoundSource};
pub use session::{AssessmentSession, CodeSender, InterviewDetails, RangeMark, ReportSnapshot};
