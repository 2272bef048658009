//! Command line surface.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use ferrstack_core::options::{DebugInfoConfig, StackOptions, TargetSpec, DEFAULT_DEBUGINFO_PATH, DEFAULT_MAX_FRAMES};
use ferrstack_core::types::ProcessId;
use ferrstack_utils::LogLevel;

/// Print a stack for each thread in a process or core file.
#[derive(Parser, Debug)]
#[command(name = "ferrstack")]
#[command(version)]
#[command(about = "Print a stack for each thread in a process or core file", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["pid", "core"])))]
pub struct Cli
{
    /// Show stack of process PID
    #[arg(short, long, value_name = "PID", value_parser = clap::value_parser!(u32).range(1..))]
    pub pid: Option<u32>,

    /// Show stack found in COREFILE
    #[arg(long, value_name = "COREFILE")]
    pub core: Option<PathBuf>,

    /// (optional) EXECUTABLE that produced COREFILE
    #[arg(short, long, value_name = "EXEC", requires = "core")]
    pub executable: Option<PathBuf>,

    /// Search path for separate debuginfo files
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DEBUGINFO_PATH)]
    pub debuginfo_path: String,

    /// Additionally show frame activation
    #[arg(short, long)]
    pub activation: bool,

    /// Additionally try to lookup DWARF debuginfo name for frame address
    #[arg(short, long)]
    pub debugname: bool,

    /// Additionally show inlined function frames using DWARF debuginfo if available (implies -d)
    #[arg(short, long)]
    pub inlines: bool,

    /// Additionally show module file information
    #[arg(short, long)]
    pub module: bool,

    /// Additionally show source file information
    #[arg(short, long)]
    pub source: bool,

    /// Show all additional information (activation, debugname, inlines, module and source)
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not resolve address to function symbol name
    #[arg(short, long)]
    pub quiet: bool,

    /// Show raw function symbol names, do not try to demangle names
    #[arg(short, long)]
    pub raw: bool,

    /// Show module build-id, load address and pc offset
    #[arg(short, long = "build-id")]
    pub build_id: bool,

    /// Show the backtrace of only one thread
    #[arg(short = '1', requires = "pid")]
    pub one_thread: bool,

    /// Show at most MAXFRAMES per thread (default 256, use 0 for unlimited)
    #[arg(short = 'n', value_name = "MAXFRAMES", default_value_t = DEFAULT_MAX_FRAMES)]
    pub max_frames: usize,

    /// Show module memory map with build-id, elf and debug files detected
    #[arg(short, long = "list-modules")]
    pub list_modules: bool,

    /// Diagnostic log level (overrides RUST_LOG)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl Cli
{
    /// Output options selected by the flags.
    #[must_use]
    pub fn options(&self) -> StackOptions
    {
        let options = StackOptions {
            show_activation: self.activation,
            show_module: self.module,
            show_build_id: self.build_id,
            show_source: self.source,
            show_debugname: self.debugname || self.inlines,
            show_inlines: self.inlines,
            quiet: self.quiet,
            raw: self.raw,
            one_thread: self.one_thread,
            list_modules: self.list_modules,
            max_frames: self.max_frames,
        };
        if self.verbose {
            options.verbose()
        } else {
            options
        }
    }

    /// The process or core to read.
    #[must_use]
    pub fn target(&self) -> TargetSpec
    {
        match (&self.core, self.pid) {
            (Some(core), _) => TargetSpec::Core {
                core: core.clone(),
                executable: self.executable.clone(),
            },
            (None, pid) => TargetSpec::Process(ProcessId(pid.unwrap_or_default())),
        }
    }

    /// Debug file search configuration.
    #[must_use]
    pub fn debuginfo(&self) -> DebugInfoConfig
    {
        DebugInfoConfig::with_search_path(self.debuginfo_path.clone())
    }
}

#[cfg(test)]
mod tests
{
    use clap::error::ErrorKind;

    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error>
    {
        Cli::try_parse_from(std::iter::once("ferrstack").chain(args.iter().copied()))
    }

    #[test]
    fn test_pid_with_defaults()
    {
        let cli = parse(&["-p", "1234"]).unwrap();
        assert_eq!(cli.target(), TargetSpec::Process(ProcessId(1234)));
        let options = cli.options();
        assert_eq!(options.max_frames, 256);
        assert!(!options.show_activation);
        assert!(!options.show_debugname);
        assert_eq!(cli.debuginfo(), DebugInfoConfig::default());
    }

    #[test]
    fn test_core_with_executable()
    {
        let cli = parse(&["--core", "core.1", "-e", "/usr/bin/app"]).unwrap();
        assert_eq!(
            cli.target(),
            TargetSpec::Core {
                core: PathBuf::from("core.1"),
                executable: Some(PathBuf::from("/usr/bin/app")),
            }
        );
    }

    #[test]
    fn test_exactly_one_input()
    {
        assert_eq!(parse(&[]).unwrap_err().kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(
            parse(&["-p", "1", "--core", "core"]).unwrap_err().kind(),
            ErrorKind::ArgumentConflict
        );
    }

    #[test]
    fn test_pid_zero_is_rejected()
    {
        assert_eq!(parse(&["-p", "0"]).unwrap_err().kind(), ErrorKind::ValueValidation);
    }

    #[test]
    fn test_dependent_flags()
    {
        assert!(parse(&["-p", "1", "-e", "/bin/app"]).is_err());
        assert!(parse(&["--core", "core", "-1"]).is_err());
        assert!(parse(&["-p", "1", "-1"]).unwrap().options().one_thread);
    }

    #[test]
    fn test_inlines_imply_debugname()
    {
        let options = parse(&["-p", "1", "-i"]).unwrap().options();
        assert!(options.show_inlines);
        assert!(options.show_debugname);
    }

    #[test]
    fn test_verbose_turns_on_annotations()
    {
        let options = parse(&["-p", "1", "-v", "-n", "0"]).unwrap().options();
        assert!(options.show_activation);
        assert!(options.show_debugname);
        assert!(options.show_inlines);
        assert!(options.show_module);
        assert!(options.show_source);
        assert!(!options.show_build_id);
        assert_eq!(options.ceiling(), None);
    }

    #[test]
    fn test_combined_short_flags()
    {
        let cli = parse(&["-p", "42", "-amsb", "--debuginfo-path", "/dbg", "--log-level", "debug"]).unwrap();
        let options = cli.options();
        assert!(options.show_activation && options.show_module && options.show_source && options.show_build_id);
        assert_eq!(cli.debuginfo().search_path, "/dbg");
        assert!(cli.log_level.is_some());
    }
}
