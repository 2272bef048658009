//! Run configuration shared by the collector, resolver and printer.

use std::path::PathBuf;

use crate::types::ProcessId;

/// Default ceiling on frames shown per thread.
pub const DEFAULT_MAX_FRAMES: usize = 256;

/// Default separate debug-info search path.
pub const DEFAULT_DEBUGINFO_PATH: &str = ":.debug:/usr/lib/debug";

/// Which annotations to print and how many frames to collect.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOptions
{
    /// Append `- 1` to frames whose pc was adjusted
    pub show_activation: bool,
    /// Append the module name
    pub show_module: bool,
    /// Print build-id and module-relative offset
    pub show_build_id: bool,
    /// Print the source location
    pub show_source: bool,
    /// Prefer DWARF function names over the symbol table
    pub show_debugname: bool,
    /// Expand inlined calls into separate frames
    pub show_inlines: bool,
    /// Print no function names at all
    pub quiet: bool,
    /// Never demangle
    pub raw: bool,
    /// Only the thread whose id equals the process id
    pub one_thread: bool,
    /// Print the module map before the stacks
    pub list_modules: bool,
    /// Frames shown per thread; 0 means no ceiling
    pub max_frames: usize,
}

impl Default for StackOptions
{
    fn default() -> Self
    {
        Self {
            show_activation: false,
            show_module: false,
            show_build_id: false,
            show_source: false,
            show_debugname: false,
            show_inlines: false,
            quiet: false,
            raw: false,
            one_thread: false,
            list_modules: false,
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl StackOptions
{
    /// Turn on every annotation, as `-v` does.
    #[must_use]
    pub fn verbose(mut self) -> Self
    {
        self.show_activation = true;
        self.show_source = true;
        self.show_module = true;
        self.show_debugname = true;
        self.show_inlines = true;
        self
    }

    /// Ceiling as an option: `None` when unbounded.
    #[must_use]
    pub fn ceiling(&self) -> Option<usize>
    {
        (self.max_frames > 0).then_some(self.max_frames)
    }
}

/// Where stacks are taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec
{
    /// A running process
    Process(ProcessId),
    /// A core file, optionally with the executable that produced it
    Core
    {
        /// Path to the core file
        core: PathBuf,
        /// Executable to use for the main module
        executable: Option<PathBuf>,
    },
}

/// Where separate debug information is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfoConfig
{
    /// Colon separated search path, same syntax as `--debuginfo-path`
    pub search_path: String,
}

impl Default for DebugInfoConfig
{
    fn default() -> Self
    {
        Self {
            search_path: DEFAULT_DEBUGINFO_PATH.to_string(),
        }
    }
}

impl DebugInfoConfig
{
    /// Configuration with a custom search path.
    #[must_use]
    pub fn with_search_path(search_path: impl Into<String>) -> Self
    {
        Self {
            search_path: search_path.into(),
        }
    }

    /// The search path split into entries; empty entries are kept.
    pub fn entries(&self) -> impl Iterator<Item = &str>
    {
        self.search_path.split(':')
    }
}
