use clap::ArgMatches;

use crate::args::{Command, CoordinatorArgs, SuiteArgs};
use crate::config::types::SuiteFile;
use crate::config::{DEFAULT_SUITE_FILES, load_suite, resolve_run, resolve_suite};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::RunPlan;

pub(crate) fn build_plan(args: CoordinatorArgs, matches: &ArgMatches) -> AppResult<RunPlan> {
    match args.command {
        Command::Phases(suite_args) => {
            let file = load_suite_for(&suite_args)?;
            let suite = resolve_suite(file.as_ref(), &suite_args)?;
            Ok(RunPlan::Phases(suite))
        }
        Command::Run(run_args) => {
            let file = load_suite_for(&run_args.suite)?;
            let run_matches = matches.subcommand_matches("run").unwrap_or(matches);
            let settings = resolve_run(file.as_ref(), &run_args, run_matches)?;
            Ok(RunPlan::Run(Box::new(settings)))
        }
    }
}

/// A suite comes from a file, from `--test` ids, or both.
fn load_suite_for(args: &SuiteArgs) -> AppResult<Option<SuiteFile>> {
    let file = load_suite(args.config.as_deref())?;
    if file.is_none() && args.tests.is_empty() {
        tracing::error!("No suite file found (set --config or --test).");
        return Err(AppError::config(ConfigError::SuiteNotFound {
            candidates: DEFAULT_SUITE_FILES.join(", "),
        }));
    }
    Ok(file)
}
