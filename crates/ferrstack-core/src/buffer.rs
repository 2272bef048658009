//! Growable frame storage with an optional ceiling.

use crate::error::{Result, StackError};
use crate::types::Frame;

/// Capacity used when no ceiling is configured.
pub const INITIAL_CAPACITY: usize = 2048;

/// Result of appending one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append
{
    /// More frames may be appended
    Accepted,
    /// The frame was stored and the ceiling is now reached
    CeilingReached,
}

/// Ordered frames of the thread currently being collected.
///
/// The buffer is created once per run and reset for every thread, so its
/// storage is reused. With a positive ceiling the capacity equals the ceiling
/// and never changes. Without one the capacity starts at
/// [`INITIAL_CAPACITY`] and doubles whenever it is exhausted.
#[derive(Debug)]
pub struct FrameBuffer
{
    frames: Vec<Frame>,
    capacity: usize,
    ceiling: Option<usize>,
}

impl FrameBuffer
{
    /// Create a buffer for the given ceiling (0 means none).
    ///
    /// ## Errors
    ///
    /// Returns `ResourceExhausted` if the initial storage cannot be allocated.
    pub fn new(max_frames: usize) -> Result<Self>
    {
        let ceiling = (max_frames > 0).then_some(max_frames);
        let capacity = ceiling.unwrap_or(INITIAL_CAPACITY);
        let mut frames = Vec::new();
        frames
            .try_reserve_exact(capacity)
            .map_err(|err| StackError::ResourceExhausted(format!("frame buffer of {capacity} frames: {err}")))?;
        Ok(Self {
            frames,
            capacity,
            ceiling,
        })
    }

    /// Append one frame.
    ///
    /// ## Errors
    ///
    /// Returns `ResourceExhausted` if the buffer had to grow and could not.
    pub fn append(&mut self, frame: Frame) -> Result<Append>
    {
        if self.frames.len() == self.capacity {
            self.grow()?;
        }
        self.frames.push(frame);

        match self.ceiling {
            Some(ceiling) if self.frames.len() >= ceiling => Ok(Append::CeilingReached),
            _ => Ok(Append::Accepted),
        }
    }

    fn grow(&mut self) -> Result<()>
    {
        let additional = self.capacity.max(1);
        self.frames.try_reserve_exact(additional).map_err(|err| {
            StackError::ResourceExhausted(format!("growing frame buffer past {} frames: {err}", self.capacity))
        })?;
        self.capacity += additional;
        Ok(())
    }

    /// Forget all frames, keeping the storage.
    pub fn reset(&mut self)
    {
        self.frames.clear();
    }

    /// Frames in capture order.
    #[must_use]
    pub fn frames(&self) -> &[Frame]
    {
        &self.frames
    }

    /// Number of frames held.
    #[must_use]
    pub fn len(&self) -> usize
    {
        self.frames.len()
    }

    /// Whether no frame is held.
    #[must_use]
    pub fn is_empty(&self) -> bool
    {
        self.frames.is_empty()
    }

    /// Current logical capacity.
    #[must_use]
    pub fn capacity(&self) -> usize
    {
        self.capacity
    }

    /// Configured ceiling, if any.
    #[must_use]
    pub fn ceiling(&self) -> Option<usize>
    {
        self.ceiling
    }

    /// Last captured frame.
    #[must_use]
    pub fn last(&self) -> Option<&Frame>
    {
        self.frames.last()
    }
}
