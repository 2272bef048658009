//! # Error Types
//!
//! Fatal error handling for stack collection.
//!
//! Anything returned as a [`StackError`] from the session ends the run with
//! the BAD exit status. Per-thread problems that the run survives are
//! reported as [`Diagnostic`](crate::report::Diagnostic)s instead; an unwinder
//! error becomes one of those when the session catches it.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for ferrstack operations
///
/// ## Error Categories
///
/// 1. **Target errors**: ProcessNotFound, PermissionDenied, AttachFailed, CoreFile
/// 2. **Unwind errors**: Unwind, MemoryRead, ThreadNotFound
/// 3. **Debug info errors**: Dwarf, Object
/// 4. **Resource errors**: ResourceExhausted (frame buffer growth)
/// 5. **Usage errors**: InvalidArgument, Unsupported
/// 6. **I/O errors**: Io (reading target files, writing output)
#[derive(Error, Debug)]
pub enum StackError
{
    /// The process with the given PID doesn't exist or has exited
    #[error("Process not found: PID {0}")]
    ProcessNotFound(u32),

    /// Insufficient permissions to trace the target process
    ///
    /// On Linux this usually means `ptrace_scope` forbids attaching, or the
    /// process belongs to another user.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Failed to attach to (or stop) a thread of the target
    #[error("Failed to attach: {0}")]
    AttachFailed(String),

    /// The core file could not be used
    #[error("Cannot use core file {}: {reason}", path.display())]
    CoreFile
    {
        /// Path of the core file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The requested thread is not part of the target
    #[error("No such thread: {0}")]
    ThreadNotFound(u64),

    /// Reading target memory failed
    #[error("Cannot read memory at 0x{0:x}")]
    MemoryRead(u64),

    /// The unwinder could not produce the next frame
    #[error("{0}")]
    Unwind(String),

    /// DWARF data could not be decoded
    #[error("DWARF error: {0}")]
    Dwarf(String),

    /// An object file could not be parsed
    #[error("Cannot parse {}: {reason}", path.display())]
    Object
    {
        /// Path of the object file
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Growing a buffer failed
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Invalid argument passed to an operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The target uses a platform or architecture we cannot handle
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// I/O error (reading target files, writing the stack output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for `Result<T, StackError>`
///
/// ```rust
/// use ferrstack_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, StackError>;

/// Map a gimli error to a `StackError` with context.
pub(crate) fn map_dwarf_error(context: &str, err: gimli::Error) -> StackError
{
    StackError::Dwarf(format!("{context}: {err}"))
}
