//! # Stack Session
//!
//! Drives one run: collect each thread's frames, resolve and print them,
//! report problems, and decide the exit status.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::io;
//!
//! use ferrstack_core::options::{DebugInfoConfig, StackOptions, TargetSpec};
//! use ferrstack_core::platform::linux::Target;
//! use ferrstack_core::session::StackSession;
//! use ferrstack_core::types::ProcessId;
//!
//! let spec = TargetSpec::Process(ProcessId::from(1234));
//! let mut target = Target::open(&spec, &DebugInfoConfig::default())?;
//! let mut session = StackSession::new(StackOptions::default(), io::stdout(), io::stderr())?;
//! session.run(&mut target)?;
//! std::process::exit(session.finish().code());
//! # Ok::<(), ferrstack_core::error::StackError>(())
//! ```

use std::io::Write;

use tracing::debug;

use crate::buffer::FrameBuffer;
use crate::collector::{Collection, FrameCollector};
use crate::error::Result;
use crate::options::StackOptions;
use crate::printer::FramePrinter;
use crate::provider::{DebugInfoSource, ThreadSource};
use crate::report::{Diagnostic, ExitStatus, RunReport, UnwindScope};
use crate::symbols::SymbolResolver;
use crate::types::ThreadId;

/// Name prefixed to diagnostics on stderr.
pub const PROGRAM_NAME: &str = "ferrstack";

/// One run over one target.
///
/// `out` receives the stacks, `err` the diagnostics. Both are owned so tests
/// can pass in byte vectors.
pub struct StackSession<W, E>
{
    options: StackOptions,
    out: W,
    err: E,
    buffer: FrameBuffer,
    collector: FrameCollector,
    resolver: SymbolResolver,
    printer: FramePrinter,
    report: RunReport,
}

impl<W: Write, E: Write> StackSession<W, E>
{
    /// Create a session.
    ///
    /// ## Errors
    ///
    /// Returns `ResourceExhausted` if the frame buffer cannot be allocated.
    pub fn new(options: StackOptions, out: W, err: E) -> Result<Self>
    {
        Ok(Self {
            buffer: FrameBuffer::new(options.max_frames)?,
            collector: FrameCollector::new(),
            resolver: SymbolResolver::new(options.clone()),
            printer: FramePrinter::new(&options),
            report: RunReport::new(),
            options,
            out,
            err,
        })
    }

    /// Print the stacks of `target`.
    ///
    /// Per-thread problems are reported as diagnostics and counted; the run
    /// goes on.
    ///
    /// ## Errors
    ///
    /// Fatal problems: the module map cannot be listed, the frame buffer
    /// cannot grow, or output cannot be written.
    pub fn run<T>(&mut self, target: &mut T) -> Result<()>
    where
        T: ThreadSource + DebugInfoSource + ?Sized,
    {
        if self.options.list_modules {
            self.write_module_map(target)?;
        }

        if self.options.one_thread {
            let tid = ThreadId::from(target.pid());
            self.stack_for(target, tid, UnwindScope::SingleThread)?;
        } else {
            self.printer
                .write_process_header(&mut self.out, target.pid(), target.kind())?;
            match target.threads() {
                Ok(threads) => {
                    debug!(count = threads.len(), "threads found");
                    for tid in threads {
                        self.stack_for(target, tid, UnwindScope::AllThreads)?;
                    }
                }
                Err(err) => self.report_diagnostic(&Diagnostic::ThreadsFailed(err))?,
            }
        }

        self.out.flush()?;
        Ok(())
    }

    /// Exit status of the run, writing the final message when nothing was shown.
    pub fn finish(mut self) -> ExitStatus
    {
        let status = self.report.exit_status();
        if status == ExitStatus::Bad {
            // Output failures here cannot change the outcome any more.
            let _ = self.out.flush();
            let _ = writeln!(self.err, "{PROGRAM_NAME}: Couldn't show any frames.");
        }
        status
    }

    /// The report so far.
    #[must_use]
    pub fn report(&self) -> &RunReport
    {
        &self.report
    }

    /// Give back the output sinks, for inspection in tests.
    pub fn into_parts(self) -> (W, E, RunReport)
    {
        (self.out, self.err, self.report)
    }

    fn write_module_map<T>(&mut self, target: &T) -> Result<()>
    where
        T: ThreadSource + DebugInfoSource + ?Sized,
    {
        self.printer
            .write_module_map_header(&mut self.out, target.pid(), target.kind())?;
        for id in target.modules()? {
            let Some(module) = target.module(id) else {
                continue;
            };
            let files = target.module_files(id);
            self.printer.write_module(&mut self.out, &module, &files)?;
        }
        Ok(())
    }

    fn stack_for<T>(&mut self, target: &mut T, tid: ThreadId, scope: UnwindScope) -> Result<()>
    where
        T: ThreadSource + DebugInfoSource + ?Sized,
    {
        let collection = self.collector.collect(target, tid, &mut self.buffer)?;
        self.print_thread(target, tid, collection, scope)
    }

    fn print_thread<T>(&mut self, target: &T, tid: ThreadId, collection: Collection, scope: UnwindScope) -> Result<()>
    where
        T: DebugInfoSource + ?Sized,
    {
        if !self.buffer.is_empty() {
            self.report.mark_frames_shown();
        }

        self.printer.write_thread_header(&mut self.out, tid)?;

        let ceiling = self.options.ceiling();
        let mut shown = 0usize;
        for frame in self.buffer.frames() {
            if ceiling.is_some_and(|max| shown >= max) {
                break;
            }
            for resolved in self.resolver.resolve(target, *frame) {
                if ceiling.is_some_and(|max| shown >= max) {
                    break;
                }
                self.printer.write_frame(&mut self.out, shown, &resolved)?;
                shown += 1;
            }
        }

        let diagnostic = match (ceiling, collection) {
            (Some(max), _) if !self.buffer.is_empty() && shown == max => Some(Diagnostic::MaxFramesShown { tid, max }),
            (_, Collection::Failed(source)) => Some(self.unwind_failure(target, tid, scope, source)),
            _ => None,
        };
        if let Some(diagnostic) = diagnostic {
            self.report_diagnostic(&diagnostic)?;
        }
        Ok(())
    }

    fn unwind_failure<T>(&self, target: &T, tid: ThreadId, scope: UnwindScope, source: crate::error::StackError) -> Diagnostic
    where
        T: DebugInfoSource + ?Sized,
    {
        let Some(last) = self.buffer.last() else {
            return Diagnostic::UnwindFailed { scope, tid, source };
        };

        let pc = last.lookup_pc();
        let module = target
            .module_at(pc)
            .and_then(|id| target.module(id))
            .map(|module| module.name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "<unknown>".to_string());
        Diagnostic::UnwindFailedAt {
            scope,
            tid,
            pc,
            module,
            source,
        }
    }

    fn report_diagnostic(&mut self, diagnostic: &Diagnostic) -> Result<()>
    {
        self.report.record(diagnostic);
        self.out.flush()?;
        writeln!(self.err, "{PROGRAM_NAME}: {diagnostic}")?;
        Ok(())
    }
}
