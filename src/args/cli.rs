use clap::{Args, Parser, Subcommand};
use std::time::Duration;

use crate::protocol::TestPhase;
use crate::registry::TargetType;

use super::parsers::{parse_bool_env, parse_duration_arg, parse_phase};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Coordinator for distributed, phase-driven load tests - runs test suites through setup, warmup, run, verify and teardown phases across agents and workers."
)]
pub struct CoordinatorArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored log output
    #[arg(long = "no-color", env = "NO_COLOR", value_parser = parse_bool_env, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a suite against a simulated in-process cluster
    Run(RunArgs),
    /// Print the phases a suite executes without running it
    Phases(SuiteArgs),
}

/// Suite-level options. Each one overrides the suite file when given.
#[derive(Debug, Args, Clone)]
pub struct SuiteArgs {
    /// Suite file (.toml or .json); defaults to suite.toml or suite.json
    #[arg(long, short = 'c')]
    pub config: Option<String>,

    /// Add a test case by id (repeatable)
    #[arg(long = "test", short = 't', value_name = "ID")]
    pub tests: Vec<String>,

    /// Run phase duration (e.g. 30s, 5m); 0 lets the test decide when it is done
    #[arg(long, short = 'd', value_parser = parse_duration_arg)]
    pub duration: Option<Duration>,

    /// Warmup duration; 0 skips the warmup phases
    #[arg(long, short = 'w', value_parser = parse_duration_arg)]
    pub warmup: Option<Duration>,

    /// Let tests end warmup and run on their own, bounded by the durations
    #[arg(long = "wait-for-test-case")]
    pub wait_for_test_case: bool,

    /// Abort every test after the first critical failure
    #[arg(long = "fail-fast", value_name = "BOOL", value_parser = parse_bool_env)]
    pub fail_fast: Option<bool>,

    /// Skip the verify phases
    #[arg(long = "no-verify")]
    pub no_verify: bool,

    /// Run tests one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Which workers drive load during warmup and run
    #[arg(long = "target-type", value_enum)]
    pub target_type: Option<TargetType>,

    /// Number of workers that drive load; 0 means all matching workers
    #[arg(long = "target-count", value_parser = clap::value_parser!(i32).range(0..))]
    pub target_count: Option<i32>,

    /// Last phase kept in lockstep across parallel tests
    #[arg(long = "sync-to-phase", value_name = "PHASE", value_parser = parse_phase)]
    pub sync_to_phase: Option<TestPhase>,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub suite: SuiteArgs,

    /// Number of simulated agents
    #[arg(long, default_value = "1", help_heading = "Cluster Options")]
    pub agents: usize,

    /// Member workers per agent
    #[arg(long = "workers-per-agent", default_value = "1", help_heading = "Cluster Options")]
    pub workers_per_agent: usize,

    /// Client workers per agent
    #[arg(long = "client-workers", default_value = "0", help_heading = "Cluster Options")]
    pub client_workers: usize,

    /// Time a simulated worker spends in each non-duration phase
    #[arg(
        long = "phase-delay",
        default_value = "50ms",
        value_parser = parse_duration_arg,
        help_heading = "Cluster Options"
    )]
    pub phase_delay: Duration,

    /// How often runners check for completions and failures
    #[arg(
        long = "poll-interval",
        default_value = "1s",
        value_parser = parse_duration_arg,
        help_heading = "Timing Options"
    )]
    pub poll_interval: Duration,

    /// Interval at which run progress lines carry performance numbers; 0 disables them
    #[arg(
        long = "performance-interval",
        default_value = "10s",
        value_parser = parse_duration_arg,
        help_heading = "Timing Options"
    )]
    pub performance_interval: Duration,
}
