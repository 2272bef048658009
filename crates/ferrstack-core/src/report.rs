//! Run outcome tracking and exit status policy.

use std::fmt;

use thiserror::Error;

use crate::error::StackError;
use crate::types::{Address, ThreadId};

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus
{
    /// Every thread was shown without problems
    Ok,
    /// Frames were shown, but some non-fatal error happened
    Error,
    /// A fatal error, or no frame was shown at all
    Bad,
    /// The command line was invalid
    Usage,
}

impl ExitStatus
{
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> i32
    {
        match self {
            ExitStatus::Ok => 0,
            ExitStatus::Error => 1,
            ExitStatus::Bad => 2,
            ExitStatus::Usage => 64,
        }
    }
}

/// Which unwind entry point a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindScope
{
    /// Walking every thread of the target
    AllThreads,
    /// Walking only the main thread (`-1`)
    SingleThread,
}

impl fmt::Display for UnwindScope
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            UnwindScope::AllThreads => f.write_str("thread_getframes"),
            UnwindScope::SingleThread => f.write_str("getthread_frames"),
        }
    }
}

/// Non-fatal problem reported on stderr and counted in the [`RunReport`].
#[derive(Debug, Error)]
pub enum Diagnostic
{
    /// The per-thread ceiling cut the stack short
    #[error("tid {tid}: shown max number of frames ({max}, use -n 0 for unlimited)")]
    MaxFramesShown
    {
        /// Thread concerned
        tid: ThreadId,
        /// Configured ceiling
        max: usize,
    },

    /// Unwinding failed after at least one frame
    #[error("{scope} tid {tid} at 0x{pc:x} in {module}: {source}")]
    UnwindFailedAt
    {
        /// Entry point that failed
        scope: UnwindScope,
        /// Thread concerned
        tid: ThreadId,
        /// Adjusted pc of the last captured frame
        pc: Address,
        /// Module of that frame, or `<unknown>`
        module: String,
        /// Why it failed
        source: StackError,
    },

    /// Unwinding failed before any frame
    #[error("{scope} tid {tid}: {source}")]
    UnwindFailed
    {
        /// Entry point that failed
        scope: UnwindScope,
        /// Thread concerned
        tid: ThreadId,
        /// Why it failed
        source: StackError,
    },

    /// The thread list could not be read
    #[error("getthreads: {0}")]
    ThreadsFailed(StackError),
}

/// What happened during a run, read once at exit.
#[derive(Debug, Default)]
pub struct RunReport
{
    any_frame_shown: bool,
    error_count: usize,
}

impl RunReport
{
    /// Fresh report: nothing shown, no errors.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Note that a thread produced at least one frame.
    pub fn mark_frames_shown(&mut self)
    {
        self.any_frame_shown = true;
    }

    /// Count one non-fatal diagnostic.
    pub fn record(&mut self, _diagnostic: &Diagnostic)
    {
        self.error_count += 1;
    }

    /// Whether any thread produced a frame.
    #[must_use]
    pub fn any_frame_shown(&self) -> bool
    {
        self.any_frame_shown
    }

    /// Number of non-fatal diagnostics recorded.
    #[must_use]
    pub fn error_count(&self) -> usize
    {
        self.error_count
    }

    /// Final exit status: BAD without frames, ERROR with errors, else OK.
    #[must_use]
    pub fn exit_status(&self) -> ExitStatus
    {
        if !self.any_frame_shown {
            ExitStatus::Bad
        } else if self.error_count > 0 {
            ExitStatus::Error
        } else {
            ExitStatus::Ok
        }
    }
}
