//! # Linux Targets
//!
//! [`Target`] is a live process or a core file, together with its module map.
//! It implements both provider traits, so a session runs over either without
//! knowing which one it has.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//!
//! use ferrstack_core::options::{DebugInfoConfig, TargetSpec};
//! use ferrstack_core::platform::linux::Target;
//! use ferrstack_core::provider::ThreadSource;
//!
//! let spec = TargetSpec::Core {
//!     core: PathBuf::from("core.1234"),
//!     executable: None,
//! };
//! let mut target = Target::open(&spec, &DebugInfoConfig::default())?;
//! for tid in target.threads()? {
//!     let frames = target.frames(tid)?.count();
//!     println!("{tid}: {frames} frames");
//! }
//! # Ok::<(), ferrstack_core::error::StackError>(())
//! ```

mod coredump;
#[cfg(target_os = "linux")]
mod live;
mod maps;
mod regs;

use std::path::Path;

use tracing::info;

use self::coredump::CoreFile;
#[cfg(target_os = "linux")]
use self::live::LiveProcess;
use crate::error::{Result, StackError};
use crate::options::{DebugInfoConfig, TargetSpec};
use crate::provider::{DebugInfoSource, FrameStream, ThreadSource};
use crate::symbols::ModuleMap;
use crate::types::{
    Address, ModuleDescriptor, ModuleFiles, ModuleId, ProcessId, ScopeChain, SourceLocation, TargetKind, ThreadId,
};
use crate::unwind::FrameWalker;

enum Backend
{
    #[cfg(target_os = "linux")]
    Live(LiveProcess),
    Core(CoreFile),
}

/// A process or core file ready for unwinding.
pub struct Target
{
    pid: ProcessId,
    modules: ModuleMap,
    backend: Backend,
}

impl Target
{
    /// Open the target described by `spec`.
    ///
    /// ## Errors
    ///
    /// Returns an error if the process does not exist or cannot be read, or
    /// if the core file cannot be parsed.
    pub fn open(spec: &TargetSpec, config: &DebugInfoConfig) -> Result<Self>
    {
        match spec {
            TargetSpec::Process(pid) => Self::attach(*pid, config),
            TargetSpec::Core { core, executable } => Self::core(core, executable.as_deref(), config),
        }
    }

    #[cfg(target_os = "linux")]
    fn attach(pid: ProcessId, config: &DebugInfoConfig) -> Result<Self>
    {
        if pid.0 == 0 {
            return Err(StackError::InvalidArgument("process id 0".to_string()));
        }
        LiveProcess::architecture()?;
        let process = LiveProcess::open(pid)?;
        let modules = ModuleMap::from_mappings(process.mappings()?, config.clone());
        info!(pid = pid.0, modules = modules.len(), "attached to process");
        Ok(Self {
            pid,
            modules,
            backend: Backend::Live(process),
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn attach(_pid: ProcessId, _config: &DebugInfoConfig) -> Result<Self>
    {
        Err(StackError::Unsupported("live processes outside Linux".to_string()))
    }

    fn core(path: &Path, executable: Option<&Path>, config: &DebugInfoConfig) -> Result<Self>
    {
        let core = CoreFile::open(path)?;
        let mut modules = ModuleMap::from_mappings(core.mappings().iter().cloned(), config.clone());
        if let Some(executable) = executable {
            modules.override_path(executable);
        }
        info!(
            core = %path.display(),
            pid = core.pid().0,
            arch = ?core.architecture(),
            modules = modules.len(),
            "opened core file"
        );
        Ok(Self {
            pid: core.pid(),
            modules,
            backend: Backend::Core(core),
        })
    }
}

impl ThreadSource for Target
{
    fn pid(&self) -> ProcessId
    {
        self.pid
    }

    fn kind(&self) -> TargetKind
    {
        match self.backend {
            #[cfg(target_os = "linux")]
            Backend::Live(_) => TargetKind::Process,
            Backend::Core(_) => TargetKind::Core,
        }
    }

    fn threads(&mut self) -> Result<Vec<ThreadId>>
    {
        match &self.backend {
            #[cfg(target_os = "linux")]
            Backend::Live(process) => process.threads(),
            Backend::Core(core) => Ok(core.threads()),
        }
    }

    fn frames(&mut self, thread: ThreadId) -> Result<FrameStream<'_>>
    {
        match &self.backend {
            #[cfg(target_os = "linux")]
            Backend::Live(process) => {
                let memory = process.stop(thread)?;
                let registers = memory
                    .registers()
                    .ok_or_else(|| StackError::Unwind(format!("thread {thread}: no registers")))?;
                Ok(Box::new(FrameWalker::new(&self.modules, memory, registers)))
            }
            Backend::Core(core) => {
                let registers = core
                    .registers(thread)
                    .cloned()
                    .ok_or(StackError::ThreadNotFound(thread.raw()))?;
                Ok(Box::new(FrameWalker::new(&self.modules, core, registers)))
            }
        }
    }
}

impl DebugInfoSource for Target
{
    fn modules(&self) -> Result<Vec<ModuleId>>
    {
        self.modules.modules()
    }

    fn module_at(&self, address: Address) -> Option<ModuleId>
    {
        self.modules.module_at(address)
    }

    fn module(&self, id: ModuleId) -> Option<ModuleDescriptor>
    {
        self.modules.module(id)
    }

    fn module_files(&self, id: ModuleId) -> ModuleFiles
    {
        self.modules.module_files(id)
    }

    fn symbol_name(&self, id: ModuleId, address: Address) -> Option<String>
    {
        self.modules.symbol_name(id, address)
    }

    fn scopes(&self, id: ModuleId, address: Address) -> Option<ScopeChain>
    {
        self.modules.scopes(id, address)
    }

    fn source_line(&self, id: ModuleId, address: Address) -> Option<SourceLocation>
    {
        self.modules.source_line(id, address)
    }
}
