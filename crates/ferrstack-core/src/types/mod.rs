//! # Types
//!
//! Platform-agnostic types used throughout ferrstack.
//!
//! These types abstract away where a stack comes from, allowing the
//! collection and printing pipeline to work with frames, modules and scopes
//! without knowing whether the target is a live process or a core file.

pub mod address;
pub mod module;
pub mod process;
pub mod registers;
pub mod stack;
pub mod symbols;

// Re-export all public types
pub use address::Address;
pub use module::{AddressClass, BuildId, DebugFile, ModuleDescriptor, ModuleFiles, ModuleId};
pub use process::{ProcessId, TargetKind, ThreadId};
pub use registers::{Architecture, Registers};
pub use stack::Frame;
pub use symbols::{DieHandle, Scope, ScopeChain, ScopeTag, SourceLocation, UnitHandle};
