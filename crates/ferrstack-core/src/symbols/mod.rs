//! # Symbols
//!
//! Everything between a captured program counter and a printable name:
//!
//! - [`ModuleMap`]: file-backed mappings grouped into modules, with lazily
//!   parsed [`BinaryImage`]s and load biases
//! - separate debug file lookup by build-id and `.gnu_debuglink`
//! - DWARF scope chains and line tables
//! - [`SymbolResolver`]: the naming policy (symbol table, DWARF, inlines)
//! - [`Demangler`]: C++ and Rust demangling

mod debuglink;
mod demangle;
mod image;
mod modules;
mod resolver;
mod scopes;

pub use demangle::Demangler;
pub use image::BinaryImage;
pub use modules::{Mapping, ModuleMap};
pub use resolver::{Expansion, ResolvedFrame, ScopeRef, SymbolResolver};
