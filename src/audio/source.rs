//! Single-use source nodes
//!
//! A `SourceNode` is the playback unit bound to one decoded buffer. It may
//! be started at most once; once stopped (or ended, for a non-looping node)
//! it is permanently dead and must be rebuilt from the buffer to play again.
//! The playback graph owns exactly one of these at a time and enforces the
//! rebuild.

use std::sync::Arc;

use super::buffer::DecodedBuffer;
use super::error::NodeError;

/// Lifecycle of a source node. The only legal path is
/// `Created -> Started -> Finished`; there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Created,
    Started,
    Finished,
}

/// A single-use playback cursor over a shared decoded buffer.
pub struct SourceNode {
    buffer: Arc<DecodedBuffer>,
    position: usize,
    looping: bool,
    state: SourceState,
}

impl SourceNode {
    /// Build a fresh node. The stimulus is continuous, so looping is on
    /// unconditionally.
    pub fn new(buffer: Arc<DecodedBuffer>) -> Self {
        Self {
            buffer,
            position: 0,
            looping: true,
            state: SourceState::Created,
        }
    }

    /// Start playback. Succeeds at most once per node.
    pub fn start(&mut self) -> Result<(), NodeError> {
        match self.state {
            SourceState::Created => {
                self.state = SourceState::Started;
                Ok(())
            }
            SourceState::Started | SourceState::Finished => Err(NodeError::AlreadyStarted),
        }
    }

    /// Stop playback. Stopping before `start()` is an error; stopping an
    /// already-finished node is tolerated.
    pub fn stop(&mut self) -> Result<(), NodeError> {
        match self.state {
            SourceState::Created => Err(NodeError::NeverStarted),
            SourceState::Started | SourceState::Finished => {
                self.state = SourceState::Finished;
                Ok(())
            }
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// True while the node can still produce audio.
    pub fn is_alive(&self) -> bool {
        self.state == SourceState::Started
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn buffer(&self) -> &Arc<DecodedBuffer> {
        &self.buffer
    }

    /// Pull the next stereo frame and advance the cursor, wrapping at the
    /// end of the buffer when looping. Returns silence unless started.
    #[inline]
    pub fn next_frame(&mut self) -> (f32, f32) {
        if self.state != SourceState::Started || self.buffer.is_empty() {
            return (0.0, 0.0);
        }
        let frame = self.buffer.frame(self.position);
        self.position += 1;
        if self.position >= self.buffer.frames() {
            if self.looping {
                self.position = 0;
            } else {
                self.state = SourceState::Finished;
            }
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer() -> Arc<DecodedBuffer> {
        Arc::new(DecodedBuffer::from_interleaved(
            vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3],
            44100,
        ))
    }

    #[test]
    fn test_start_is_single_use() {
        let mut node = SourceNode::new(test_buffer());
        assert!(node.start().is_ok());
        assert_eq!(node.start(), Err(NodeError::AlreadyStarted));

        node.stop().unwrap();
        // A dead node can never be restarted.
        assert_eq!(node.start(), Err(NodeError::AlreadyStarted));
    }

    #[test]
    fn test_stop_before_start() {
        let mut node = SourceNode::new(test_buffer());
        assert_eq!(node.stop(), Err(NodeError::NeverStarted));
    }

    #[test]
    fn test_stop_after_stop_is_tolerated() {
        let mut node = SourceNode::new(test_buffer());
        node.start().unwrap();
        node.stop().unwrap();
        assert!(node.stop().is_ok());
    }

    #[test]
    fn test_loops_past_buffer_end() {
        let mut node = SourceNode::new(test_buffer());
        node.start().unwrap();
        assert_eq!(node.next_frame(), (0.1, -0.1));
        assert_eq!(node.next_frame(), (0.2, -0.2));
        assert_eq!(node.next_frame(), (0.3, -0.3));
        // Wraps back to the first frame instead of finishing.
        assert_eq!(node.next_frame(), (0.1, -0.1));
        assert!(node.is_alive());
    }

    #[test]
    fn test_silence_before_start() {
        let mut node = SourceNode::new(test_buffer());
        assert_eq!(node.next_frame(), (0.0, 0.0));
    }
}
