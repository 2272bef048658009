//! Process, thread and target identity types.

use std::fmt;

/// Process identifier (PID)
///
/// ## Example
///
/// ```rust
/// use ferrstack_core::types::ProcessId;
///
/// let pid = ProcessId::from(12345);
/// assert_eq!(pid.to_string(), "12345");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId(pub u32);

impl From<u32> for ProcessId
{
    fn from(pid: u32) -> Self
    {
        ProcessId(pid)
    }
}

impl From<ProcessId> for u32
{
    fn from(pid: ProcessId) -> Self
    {
        pid.0
    }
}

impl fmt::Display for ProcessId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier
///
/// On Linux this is the kernel TID; for a core file it is the `pr_pid` of the
/// thread's `NT_PRSTATUS` note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId(pub u64);

impl ThreadId
{
    /// Get the raw `u64` representation of the thread identifier
    #[must_use]
    pub fn raw(&self) -> u64
    {
        self.0
    }
}

impl From<u64> for ThreadId
{
    fn from(value: u64) -> Self
    {
        Self(value)
    }
}

impl From<ProcessId> for ThreadId
{
    /// The main thread of a process has the process id as its thread id.
    fn from(pid: ProcessId) -> Self
    {
        Self(u64::from(pid.0))
    }
}

impl fmt::Display for ThreadId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}", self.0)
    }
}

/// What the stacks are being taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind
{
    /// A live process, stopped thread by thread while its stack is read
    Process,
    /// A core dump
    Core,
}

impl fmt::Display for TargetKind
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            TargetKind::Process => f.write_str("process"),
            TargetKind::Core => f.write_str("core"),
        }
    }
}
