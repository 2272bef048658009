use std::io::{self, BufWriter};
use std::process;

use clap::Parser;
use ferrstack_core::error::Result;
use ferrstack_core::platform::linux::Target;
use ferrstack_core::report::ExitStatus;
use ferrstack_core::session::{StackSession, PROGRAM_NAME};
use ferrstack_utils::{debug, format_from_env, init_logging, init_logging_with_level};

mod cli;

use cli::Cli;

/// Exit code for command line errors (`EX_USAGE`).
const EXIT_USAGE: i32 = ExitStatus::Usage.code();

fn main()
{
    process::exit(run());
}

fn run() -> i32
{
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version also arrive here and are not failures.
            let code = if err.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = err.print();
            return code;
        }
    };

    // Kept alive until exit so the file writer flushes.
    let _log_guard = match cli.log_level {
        Some(level) => init_logging_with_level(level, format_from_env()),
        None => init_logging(),
    }
    .map_err(|err| eprintln!("{PROGRAM_NAME}: logging disabled: {err}"))
    .ok();

    match print_stacks(&cli) {
        Ok(status) => status.code(),
        Err(err) => {
            eprintln!("{PROGRAM_NAME}: {err}");
            ExitStatus::Bad.code()
        }
    }
}

fn print_stacks(cli: &Cli) -> Result<ExitStatus>
{
    let spec = cli.target();
    debug!(?spec, "opening target");
    let mut target = Target::open(&spec, &cli.debuginfo())?;

    let out = BufWriter::new(io::stdout().lock());
    let mut session = StackSession::new(cli.options(), out, io::stderr())?;
    session.run(&mut target)?;
    Ok(session.finish())
}
