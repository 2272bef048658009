//! # ferrstack-core
//!
//! Per-thread stack traces of a live process or a core file.
//!
//! The pipeline, one thread at a time:
//!
//! 1. a [`provider::ThreadSource`] yields the thread's frames
//! 2. [`collector::FrameCollector`] stores them in a reusable
//!    [`buffer::FrameBuffer`] until the stream ends or the ceiling is hit
//! 3. [`symbols::SymbolResolver`] names each frame, expanding inlined calls
//! 4. [`printer::FramePrinter`] writes the lines
//!
//! [`session::StackSession`] drives the pipeline and keeps the
//! [`report::RunReport`] that decides the exit status.
//!
//! ## Platform Support
//!
//! - **Linux**: live processes through `ptrace` and procfs (x86_64)
//! - **Core files**: 64-bit ELF cores (x86_64, aarch64), on any host

pub mod buffer;
pub mod collector;
pub mod error;
pub mod options;
pub mod platform;
pub mod printer;
pub mod provider;
pub mod report;
pub mod session;
pub mod symbols;
pub mod types;
pub mod unwind;

pub use error::{Result, StackError};
pub use session::StackSession;
pub use types::{ProcessId, ThreadId};
