//! Per-thread frame collection.

use tracing::trace;

use crate::buffer::{Append, FrameBuffer};
use crate::error::{Result, StackError};
use crate::provider::ThreadSource;
use crate::types::ThreadId;

/// How collection of one thread ended.
#[derive(Debug)]
pub enum Collection
{
    /// The unwinder ran out of frames
    Complete,
    /// The ceiling was reached; the remaining frames were not read
    CeilingReached,
    /// The unwinder failed; frames collected before the failure are kept
    Failed(StackError),
}

/// Pulls frames from a [`ThreadSource`] into a [`FrameBuffer`].
#[derive(Debug, Default)]
pub struct FrameCollector;

impl FrameCollector
{
    /// Create a collector.
    #[must_use]
    pub fn new() -> Self
    {
        Self
    }

    /// Collect the frames of one thread into `buffer`, which is reset first.
    ///
    /// Unwinder failures are part of the returned [`Collection`] so the caller
    /// can report them next to the frames that were captured.
    ///
    /// ## Errors
    ///
    /// Only a failure to grow the buffer is returned as an error; it ends the run.
    pub fn collect<S>(&self, source: &mut S, thread: ThreadId, buffer: &mut FrameBuffer) -> Result<Collection>
    where
        S: ThreadSource + ?Sized,
    {
        buffer.reset();

        let stream = match source.frames(thread) {
            Ok(stream) => stream,
            Err(err) => return Ok(Collection::Failed(err)),
        };

        for item in stream {
            let frame = match item {
                Ok(frame) => frame,
                Err(err) => {
                    trace!(tid = thread.raw(), frames = buffer.len(), "unwind stopped: {err}");
                    return Ok(Collection::Failed(err));
                }
            };

            if buffer.append(frame)? == Append::CeilingReached {
                trace!(tid = thread.raw(), frames = buffer.len(), "frame ceiling reached");
                return Ok(Collection::CeilingReached);
            }
        }

        Ok(Collection::Complete)
    }
}
