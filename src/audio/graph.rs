//! Playback graph manager
//!
//! Owns the chain Source -> Filter -> Gain -> Output and enforces the one
//! invariant everything else depends on: at most one live, playable source
//! node bound to the current buffer. Because source nodes are single-use,
//! every start site goes through `ensure_started()`, which catches the
//! "already started" failure from a dead node and transparently rebuilds a
//! fresh node from the retained buffer. Callers never see the difference
//! between a first play and a replay after stop.

use std::sync::Arc;

use super::buffer::DecodedBuffer;
use super::error::NodeError;
use super::filter::{BiquadFilter, FilterSpec};
use super::gain::GainStage;
use super::source::SourceNode;

/// Observable graph state, in state-machine order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// No buffer installed.
    Empty,
    /// Buffer installed, node not started yet (or rebuilt after death).
    Ready,
    /// Node started and producing frames.
    Running,
    /// Node was stopped or exhausted; next start must rebuild.
    NeedsRebuild,
}

pub struct PlaybackGraph {
    buffer: Option<Arc<DecodedBuffer>>,
    source: Option<SourceNode>,
    filter: BiquadFilter,
    gain: GainStage,
}

impl PlaybackGraph {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            buffer: None,
            source: None,
            filter: BiquadFilter::new(sample_rate),
            gain: GainStage::muted(),
        }
    }

    /// Install a freshly decoded buffer, tearing down whatever was live.
    ///
    /// The previous node is stopped (tolerating lifecycle errors), the
    /// filter returns to pass-through, and gain resets to zero so the first
    /// play cannot startle the subject.
    pub fn install(&mut self, buffer: Arc<DecodedBuffer>) {
        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.stop() {
                log::debug!("stopping previous source: {}", e);
            }
        }
        self.source = Some(SourceNode::new(Arc::clone(&buffer)));
        self.buffer = Some(buffer);
        self.filter.set_spec(FilterSpec::passthrough());
        self.filter.reset_state();
        self.gain.set_level(0.0);
    }

    /// Start (or restart) playback of the installed buffer.
    ///
    /// Lifecycle errors from a dead node are absorbed: the node is rebuilt
    /// from the buffer and started exactly once more. Returns false only
    /// when nothing is installed.
    pub fn ensure_started(&mut self) -> bool {
        let Some(buffer) = self.buffer.clone() else {
            return false;
        };

        if self.source.is_none() {
            self.source = Some(SourceNode::new(Arc::clone(&buffer)));
        }

        let Some(source) = self.source.as_mut() else {
            return false;
        };
        if source.is_alive() {
            // Resume case: node still running, nothing to do.
            return true;
        }

        match source.start() {
            Ok(()) => true,
            Err(NodeError::AlreadyStarted) => {
                // The node was used up. Rebuild from the buffer and retry
                // once; a fresh node cannot fail to start.
                log::debug!("source node exhausted, rebuilding from buffer");
                let mut rebuilt = SourceNode::new(buffer);
                let started = rebuilt.start().is_ok();
                self.source = Some(rebuilt);
                started
            }
            Err(e) => {
                log::debug!("unexpected node lifecycle error on start: {}", e);
                false
            }
        }
    }

    /// Stop the live node without discarding the buffer. The next
    /// `ensure_started()` rebuilds.
    pub fn stop(&mut self) {
        if let Some(source) = self.source.as_mut() {
            if let Err(e) = source.stop() {
                log::debug!("stopping source: {}", e);
            }
        }
    }

    /// Terminal teardown: stop the node and drop all references.
    pub fn shutdown(&mut self) {
        self.stop();
        self.source = None;
        self.buffer = None;
        self.gain.set_level(0.0);
    }

    pub fn state(&self) -> GraphState {
        if self.buffer.is_none() {
            return GraphState::Empty;
        }
        match self.source.as_ref() {
            None => GraphState::Ready,
            Some(s) if s.is_alive() => GraphState::Running,
            Some(s) => match s.state() {
                super::source::SourceState::Created => GraphState::Ready,
                _ => GraphState::NeedsRebuild,
            },
        }
    }

    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&Arc<DecodedBuffer>> {
        self.buffer.as_ref()
    }

    /// Set the intensity level [0,1], applied immediately. Silently ignored
    /// before any graph exists; the stage itself clamps.
    pub fn set_intensity(&mut self, level: f32) {
        self.gain.set_level(level);
    }

    pub fn intensity(&self) -> f32 {
        self.gain.level()
    }

    /// Reconfigure the band filter from a range label. Malformed labels are
    /// a silent no-op (logged only); the previous configuration stays.
    pub fn set_frequency_range(&mut self, label: &str) {
        match FilterSpec::from_range_label(label) {
            Some(spec) => self.filter.set_spec(spec),
            None => log::debug!("ignoring malformed frequency range label '{}'", label),
        }
    }

    pub fn filter_spec(&self) -> FilterSpec {
        self.filter.spec()
    }

    /// Render interleaved frames into `out`. Produces silence when no node
    /// is running.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            out.fill(0.0);
            return;
        }
        let Some(source) = self.source.as_mut() else {
            out.fill(0.0);
            return;
        };
        if !source.is_alive() {
            out.fill(0.0);
            return;
        }
        for chunk in out.chunks_mut(channels) {
            let (l, r) = source.next_frame();
            let (l, r) = self.filter.process(l, r);
            let (l, r) = self.gain.process(l, r);
            chunk[0] = l.clamp(-1.0, 1.0);
            if chunk.len() > 1 {
                chunk[1] = r.clamp(-1.0, 1.0);
            }
        }
    }
}
