//! Audio test-stimulus engine
//!
//! Provides the signal path Source -> Filter -> Gain -> Output over a
//! single continuously-looping decoded buffer, with:
//! - symphonia-based decoding of local, remote and uploaded stimuli
//! - a single-use source node with transparent rebuild-on-replay
//! - a reconfigurable band filter driven by range labels
//! - click-free, immediately applied intensity control

pub mod buffer;
pub mod device;
pub mod engine;
pub mod error;
pub mod filter;
pub mod gain;
pub mod graph;
pub mod loader;
pub mod source;

pub use buffer::DecodedBuffer;
pub use engine::{AudioEngine, AudioEngineHandle, EngineState};
pub use error::AudioError;
pub use filter::{FilterMode, FilterSpec};
pub use loader::SoundSource;
