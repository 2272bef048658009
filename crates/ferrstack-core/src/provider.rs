//! # Providers
//!
//! The two seams between the stack pipeline and the world outside it.
//!
//! - [`ThreadSource`] enumerates the threads of a target and produces, per
//!   thread, a lazy stream of captured frames.
//! - [`DebugInfoSource`] answers questions about the modules mapped into the
//!   target: which module owns an address, what the symbol table or DWARF
//!   says about it, and which files back it.
//!
//! [`crate::platform::linux::Target`] implements both for live processes and
//! core files. Tests implement them over plain vectors.

use crate::error::Result;
use crate::types::{
    Address, Frame, ModuleDescriptor, ModuleFiles, ModuleId, ProcessId, ScopeChain, SourceLocation, TargetKind, ThreadId,
};

/// Lazy, finite, non-restartable stream of the frames of one thread,
/// innermost first.
///
/// An `Err` item means the unwinder could not continue; nothing after it is
/// read. Dropping the stream releases whatever it holds on the thread.
pub type FrameStream<'a> = Box<dyn Iterator<Item = Result<Frame>> + 'a>;

/// Source of threads and their frames.
pub trait ThreadSource
{
    /// Process id of the target.
    fn pid(&self) -> ProcessId;

    /// Whether this is a live process or a core file.
    fn kind(&self) -> TargetKind;

    /// All threads of the target, in reporting order.
    ///
    /// ## Errors
    ///
    /// Returns an error if the thread list cannot be read.
    fn threads(&mut self) -> Result<Vec<ThreadId>>;

    /// Start unwinding one thread.
    ///
    /// ## Errors
    ///
    /// Returns an error if the thread cannot be stopped or its registers
    /// cannot be read, before any frame was produced.
    fn frames(&mut self, thread: ThreadId) -> Result<FrameStream<'_>>;
}

/// Module, symbol and debug information lookups.
///
/// Every lookup that can come up empty returns an `Option`; a missing answer
/// is never an error at this level.
pub trait DebugInfoSource
{
    /// All modules, in address order.
    ///
    /// ## Errors
    ///
    /// Returns an error if the module list cannot be produced.
    fn modules(&self) -> Result<Vec<ModuleId>>;

    /// Module whose mapping contains `address`.
    fn module_at(&self, address: Address) -> Option<ModuleId>;

    /// Description of a module.
    fn module(&self, id: ModuleId) -> Option<ModuleDescriptor>;

    /// Main and debug files of a module, resolving them if needed.
    fn module_files(&self, id: ModuleId) -> ModuleFiles;

    /// Name of the symbol-table entry covering `address`.
    fn symbol_name(&self, id: ModuleId, address: Address) -> Option<String>;

    /// Lexical scopes enclosing `address`, innermost first.
    fn scopes(&self, id: ModuleId, address: Address) -> Option<ScopeChain>;

    /// Source line of `address` from the line table.
    fn source_line(&self, id: ModuleId, address: Address) -> Option<SourceLocation>;
}
