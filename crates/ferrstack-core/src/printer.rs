//! # Output Formatting
//!
//! Text rendering of stacks and module maps.
//!
//! ## Frame lines
//!
//! ```text
//! #0  0x00007f3a1c2e4a7d     __GI___poll - /usr/lib/libc.so.6
//!     [1f0e6b…]@0x7f3a1c200000+0xe4a7d
//!     ../sysdeps/unix/sysv/linux/poll.c:29:10
//! #1  0x000055d0c9a01234 - 1 main - /usr/bin/app
//! ```
//!
//! The address is the adjusted program counter, zero padded to 8 hex digits
//! for 32-bit modules and 16 otherwise. The widths are cached per module.

use std::collections::HashMap;
use std::io::{self, Write};

use crate::options::StackOptions;
use crate::symbols::ResolvedFrame;
use crate::types::{DebugFile, ModuleDescriptor, ModuleFiles, ModuleId, ProcessId, TargetKind, ThreadId};

/// Width used when a module's class is unknown.
const DEFAULT_WIDTH: usize = 16;

/// Renders frames, headers and module maps.
#[derive(Debug)]
pub struct FramePrinter
{
    show_activation: bool,
    show_module: bool,
    show_build_id: bool,
    show_source: bool,
    widths: HashMap<ModuleId, usize>,
}

impl FramePrinter
{
    /// Create a printer for the given output options.
    #[must_use]
    pub fn new(options: &StackOptions) -> Self
    {
        Self {
            show_activation: options.show_activation,
            show_module: options.show_module,
            show_build_id: options.show_build_id,
            show_source: options.show_source,
            widths: HashMap::new(),
        }
    }

    /// Hex digits used for addresses of `module`.
    pub fn address_width(&mut self, module: Option<&ModuleDescriptor>) -> usize
    {
        let Some(module) = module else {
            return DEFAULT_WIDTH;
        };
        *self
            .widths
            .entry(module.id)
            .or_insert_with(|| module.class.map_or(DEFAULT_WIDTH, |class| class.hex_width()))
    }

    /// `PID <pid> - process|core`
    ///
    /// ## Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn write_process_header<W: Write>(&self, out: &mut W, pid: ProcessId, kind: TargetKind) -> io::Result<()>
    {
        writeln!(out, "PID {pid} - {kind}")
    }

    /// `TID <tid>:`
    ///
    /// ## Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn write_thread_header<W: Write>(&self, out: &mut W, tid: ThreadId) -> io::Result<()>
    {
        writeln!(out, "TID {tid}:")
    }

    /// Render one frame, including its optional annotation lines.
    ///
    /// ## Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn write_frame<W: Write>(&mut self, out: &mut W, number: usize, frame: &ResolvedFrame) -> io::Result<()>
    {
        let module = frame.module.as_ref();
        let width = self.address_width(module);
        write!(out, "#{number:<2} 0x{:0width$x}", frame.adjusted_pc)?;

        if self.show_activation {
            let marker = if frame.frame.is_activation { "" } else { "- 1" };
            write!(out, "{marker:>4}")?;
        }

        if let Some(name) = &frame.display_name {
            write!(out, " {name}")?;
        }

        if self.show_module {
            if let Some(module) = module {
                write!(out, " - {}", module.name)?;
            }
        }

        if self.show_build_id {
            if let Some((module, build_id)) = module.and_then(|m| m.build_id.as_ref().map(|id| (m, id))) {
                write!(
                    out,
                    "\n    [{build_id}]@0x{:x}+0x{:x}",
                    module.start,
                    frame.adjusted_pc - module.start
                )?;
            }
        }

        if self.show_source {
            if let Some(source) = &frame.source {
                write!(out, "\n    {source}")?;
            }
        }

        writeln!(out)
    }

    /// Header line of the module map.
    ///
    /// ## Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn write_module_map_header<W: Write>(&self, out: &mut W, pid: ProcessId, kind: TargetKind) -> io::Result<()>
    {
        writeln!(out, "PID {pid} - {kind} module memory map")
    }

    /// One module map entry.
    ///
    /// ```text
    /// 0x000055d0c9a00000-0x000055d0c9a25000 app
    ///   [3c9d0b…]
    ///   /usr/bin/app
    ///   /usr/lib/debug/.build-id/3c/9d0b….debug
    /// ```
    ///
    /// ## Errors
    ///
    /// Returns any error from writing to `out`.
    pub fn write_module<W: Write>(&mut self, out: &mut W, module: &ModuleDescriptor, files: &ModuleFiles) -> io::Result<()>
    {
        let width = self.address_width(Some(module));
        writeln!(
            out,
            "0x{:0width$x}-0x{:0width$x} {}",
            module.start,
            module.end,
            module.basename()
        )?;

        if let Some(build_id) = &module.build_id {
            writeln!(out, "  [{build_id}]")?;
        }
        if let Some(main_file) = &files.main_file {
            writeln!(out, "  {}", main_file.display())?;
        }
        match &files.debug_file {
            Some(DebugFile::Separate(path)) => writeln!(out, "  {}", path.display())?,
            Some(DebugFile::Embedded) => writeln!(out, "  -")?,
            None => {}
        }
        Ok(())
    }
}
