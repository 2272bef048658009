//! # Platform-Specific Implementations
//!
//! Targets are read with the operating system's own interfaces:
//!
//! - **Linux**: procfs and `ptrace` for live processes, ELF core dumps
//!   - See: [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//!   - See: [core(5) man page](https://man7.org/linux/man-pages/man5/core.5.html)
//!
//! Core files are plain ELF and are read on any host; live processes need
//! Linux.

pub mod linux;
