//! Stimulus playback engine using cpal for real-time audio output
//!
//! Wraps the playback graph in a cpal output stream and exposes a cloneable
//! handle with the five transport/parameter calls the assessment pages use.
//! The engine is an explicitly owned object: the session creates it lazily
//! on the first load and drops it on clear/reset, which closes the stream.

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::buffer::DecodedBuffer;
use super::device::{default_output_device, supported_config, AudioConfig};
use super::error::AudioError;
use super::filter::FilterSpec;
use super::graph::{GraphState, PlaybackGraph};

/// Transport state of the engine as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Stopped,
    Playing,
    Paused,
}

/// Shared state between the handle and the audio thread.
struct SharedState {
    graph: RwLock<PlaybackGraph>,
    is_playing: AtomicBool,
}

/// Handle to control the engine from the UI thread.
#[derive(Clone)]
pub struct AudioEngineHandle {
    shared: Arc<SharedState>,
    sample_rate: u32,
}

impl AudioEngineHandle {
    /// Install a freshly decoded stimulus, tearing down any live node bound
    /// to the previous buffer. Playback stays stopped until `play()`.
    pub fn install_buffer(&self, buffer: Arc<DecodedBuffer>) {
        self.shared.is_playing.store(false, Ordering::SeqCst);
        self.shared.graph.write().install(buffer);
    }

    /// Start or resume playback.
    ///
    /// From paused this resumes in place; from stopped it starts the node,
    /// transparently rebuilding it from the buffer when the previous one was
    /// used up. No-op when nothing is loaded.
    pub fn play(&self) {
        let started = self.shared.graph.write().ensure_started();
        if started {
            self.shared.is_playing.store(true, Ordering::SeqCst);
        } else {
            log::debug!("play() with no stimulus loaded, ignoring");
        }
    }

    /// Suspend rendering without destroying the node graph; the playback
    /// position is preserved for `resume()`.
    pub fn pause(&self) {
        self.shared.is_playing.store(false, Ordering::SeqCst);
    }

    /// Inverse of `pause()`; only meaningful while a node is alive.
    pub fn resume(&self) {
        if self.shared.graph.read().state() == GraphState::Running {
            self.shared.is_playing.store(true, Ordering::SeqCst);
        }
    }

    /// Stop playback and discard the node and buffer.
    pub fn shutdown(&self) {
        self.shared.is_playing.store(false, Ordering::SeqCst);
        self.shared.graph.write().shutdown();
    }

    /// Set the intensity level [0,1], applied immediately (not ramped).
    pub fn set_intensity(&self, level: f32) {
        self.shared.graph.write().set_intensity(level);
    }

    pub fn intensity(&self) -> f32 {
        self.shared.graph.read().intensity()
    }

    /// Reconfigure the band filter from a range label such as "2-3k".
    /// Malformed labels silently keep the previous configuration.
    pub fn set_frequency_range(&self, label: &str) {
        self.shared.graph.write().set_frequency_range(label);
    }

    pub fn filter_spec(&self) -> FilterSpec {
        self.shared.graph.read().filter_spec()
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing.load(Ordering::SeqCst)
    }

    pub fn has_buffer(&self) -> bool {
        self.shared.graph.read().has_buffer()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> EngineState {
        if self.shared.is_playing.load(Ordering::SeqCst) {
            return EngineState::Playing;
        }
        match self.shared.graph.read().state() {
            GraphState::Running => EngineState::Paused,
            _ => EngineState::Stopped,
        }
    }
}

/// The playback engine. Owns the output stream; dropping it releases the
/// audio context.
pub struct AudioEngine {
    _stream: cpal::Stream,
    handle: AudioEngineHandle,
    config: AudioConfig,
}

impl AudioEngine {
    /// Create and start a new engine on the default output device. Fails
    /// with `EnvironmentUnsupported` when no audio subsystem is available.
    pub fn new(config: AudioConfig) -> Result<Self, AudioError> {
        let device = default_output_device()?;
        let stream_config = supported_config(&device, &config)?;

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;

        log::info!(
            "starting stimulus engine: {} Hz, {} channels",
            sample_rate,
            channels
        );

        let shared = Arc::new(SharedState {
            graph: RwLock::new(PlaybackGraph::new(sample_rate as f32)),
            is_playing: AtomicBool::new(false),
        });

        let shared_clone = Arc::clone(&shared);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !shared_clone.is_playing.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    shared_clone.graph.write().render(data, channels);
                },
                move |err| {
                    log::error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| {
                AudioError::EnvironmentUnsupported(format!("cannot build output stream: {}", e))
            })?;

        stream.play().map_err(|e| {
            AudioError::EnvironmentUnsupported(format!("cannot start output stream: {}", e))
        })?;

        let handle = AudioEngineHandle {
            shared,
            sample_rate,
        };

        Ok(Self {
            _stream: stream,
            handle,
            config,
        })
    }

    /// Get a handle to control the engine.
    pub fn handle(&self) -> AudioEngineHandle {
        self.handle.clone()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }
}
