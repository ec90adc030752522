mod plan;

use clap::{CommandFactory, FromArgMatches};

use crate::args::CoordinatorArgs;
use crate::error::AppResult;
use plan::{build_plan, execute_plan};

/// Parses the command line, initializes logging and runs the selected
/// command on a multi-thread runtime.
///
/// # Errors
///
/// Returns an error when arguments or the suite are invalid, the runtime
/// cannot start, or any test of a suite run failed.
pub fn run() -> AppResult<()> {
    let matches = CoordinatorArgs::command().get_matches();
    let args = CoordinatorArgs::from_arg_matches(&matches)?;

    crate::system::logger::init_logging(args.verbose, args.no_color);

    let plan = build_plan(args, &matches)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(execute_plan(plan))
}
