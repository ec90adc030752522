use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{RunArgs, SuiteArgs};
use crate::cluster::ClusterShape;
use crate::coordinator::CoordinatorSettings;
use crate::domain::{TestCase, TestSuite};
use crate::error::{AppError, AppResult, ConfigError};
use crate::protocol::TestPhase;

use super::types::{ClusterConfig, CoordinatorConfig, SuiteFile, TestCaseConfig};

/// Everything a `run` needs, resolved from defaults, the suite file and the
/// command line, in that order of precedence.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub suite: TestSuite,
    pub coordinator: CoordinatorSettings,
    pub cluster: ClusterShape,
}

/// Builds a validated suite from a suite file alone.
///
/// # Errors
///
/// Returns an error for an invalid duration or phase name, a suite without
/// tests, an empty test id or a duplicated test id.
pub fn build_suite(file: &SuiteFile) -> AppResult<TestSuite> {
    let suite = suite_from_file(file)?;
    validate_suite(&suite)?;
    Ok(suite)
}

/// Applies suite-level command line overrides on top of an optional suite
/// file. `--test` ids are appended to the file's tests.
///
/// # Errors
///
/// Returns an error when the resulting suite is invalid.
pub fn resolve_suite(file: Option<&SuiteFile>, args: &SuiteArgs) -> AppResult<TestSuite> {
    let mut suite = match file {
        Some(file) => suite_from_file(file)?,
        None => TestSuite::default(),
    };

    suite
        .test_cases
        .extend(args.tests.iter().map(|id| Arc::new(TestCase::new(id.trim()))));
    if let Some(duration) = args.duration {
        suite.duration = duration;
    }
    if let Some(warmup) = args.warmup {
        suite.warmup = warmup;
    }
    if args.wait_for_test_case {
        suite.wait_for_test_case = true;
    }
    if let Some(fail_fast) = args.fail_fast {
        suite.fail_fast = fail_fast;
    }
    if args.no_verify {
        suite.verify_enabled = false;
    }
    if args.sequential {
        suite.parallel = false;
    }
    if let Some(target_type) = args.target_type {
        suite.target_type = target_type;
    }
    if let Some(target_count) = args.target_count {
        suite.target_count = target_count;
    }
    if let Some(phase) = args.sync_to_phase {
        suite.sync_to_phase = Some(phase);
    }

    validate_suite(&suite)?;
    Ok(suite)
}

/// Resolves suite, runner timing and cluster shape for the `run` command.
/// Defaulted flags only override the suite file when given explicitly.
///
/// # Errors
///
/// Returns an error when the suite is invalid, the poll or stats interval is
/// zero, or the cluster would have no agents or no workers.
pub fn resolve_run(
    file: Option<&SuiteFile>,
    args: &RunArgs,
    matches: &ArgMatches,
) -> AppResult<RunSettings> {
    let suite = resolve_suite(file, &args.suite)?;

    let mut coordinator = CoordinatorSettings {
        poll_interval: args.poll_interval,
        performance_monitor_interval: args.performance_interval,
        ..CoordinatorSettings::default()
    };
    if let Some(config) = file.and_then(|file| file.coordinator.as_ref()) {
        apply_coordinator_config(&mut coordinator, config, matches)?;
    }
    ensure_positive_duration(coordinator.poll_interval, "poll_interval")?;
    ensure_positive_duration(coordinator.response_timeout, "response_timeout")?;

    let mut cluster = ClusterShape {
        agents: args.agents,
        members_per_agent: args.workers_per_agent,
        clients_per_agent: args.client_workers,
        phase_delay: args.phase_delay,
        ..ClusterShape::default()
    };
    if let Some(config) = file.and_then(|file| file.cluster.as_ref()) {
        apply_cluster_config(&mut cluster, config, matches)?;
    }
    ensure_positive_usize(cluster.agents, "agents")?;
    ensure_positive_usize(
        cluster
            .members_per_agent
            .saturating_add(cluster.clients_per_agent),
        "workers_per_agent",
    )?;
    ensure_positive_duration(cluster.stats_interval, "stats_interval")?;

    Ok(RunSettings {
        suite,
        coordinator,
        cluster,
    })
}

fn suite_from_file(file: &SuiteFile) -> AppResult<TestSuite> {
    let mut suite = TestSuite {
        test_cases: file.tests.iter().map(test_case_from_config).collect(),
        ..TestSuite::default()
    };

    if let Some(duration) = &file.duration {
        suite.duration = duration.to_duration("duration")?;
    }
    if let Some(warmup) = &file.warmup {
        suite.warmup = warmup.to_duration("warmup")?;
    }
    if let Some(wait) = file.wait_for_test_case {
        suite.wait_for_test_case = wait;
    }
    if let Some(verify) = file.verify {
        suite.verify_enabled = verify;
    }
    if let Some(fail_fast) = file.fail_fast {
        suite.fail_fast = fail_fast;
    }
    if let Some(parallel) = file.parallel {
        suite.parallel = parallel;
    }
    if let Some(target_type) = file.target_type {
        suite.target_type = target_type;
    }
    if let Some(target_count) = file.target_count {
        suite.target_count = target_count;
    }
    if let Some(phase) = &file.sync_to_phase {
        suite.sync_to_phase = Some(phase.parse::<TestPhase>()?);
    }
    if let Some(types) = &file.non_critical_failures {
        suite.non_critical_failures = types.iter().copied().collect::<BTreeSet<_>>();
    }

    Ok(suite)
}

fn test_case_from_config(config: &TestCaseConfig) -> Arc<TestCase> {
    let properties: BTreeMap<String, String> = config
        .properties
        .iter()
        .map(|(key, value)| (key.clone(), value.render()))
        .collect();
    Arc::new(TestCase {
        id: config.id.trim().to_owned(),
        properties,
    })
}

fn validate_suite(suite: &TestSuite) -> Result<(), ConfigError> {
    if suite.test_cases.is_empty() {
        return Err(ConfigError::NoTests);
    }
    let mut seen = HashSet::new();
    for (index, test_case) in suite.test_cases.iter().enumerate() {
        if test_case.id.is_empty() {
            return Err(ConfigError::EmptyTestId { index });
        }
        if !seen.insert(test_case.id.as_str()) {
            return Err(ConfigError::DuplicateTestId {
                id: test_case.id.clone(),
            });
        }
    }
    Ok(())
}

fn apply_coordinator_config(
    settings: &mut CoordinatorSettings,
    config: &CoordinatorConfig,
    matches: &ArgMatches,
) -> Result<(), ConfigError> {
    if !is_cli(matches, "poll_interval")
        && let Some(value) = &config.poll_interval
    {
        settings.poll_interval = value.to_duration("poll_interval")?;
    }
    if !is_cli(matches, "performance_interval")
        && let Some(value) = &config.performance_monitor_interval
    {
        settings.performance_monitor_interval =
            value.to_duration("performance_monitor_interval")?;
    }
    if let Some(value) = &config.response_timeout {
        settings.response_timeout = value.to_duration("response_timeout")?;
    }
    Ok(())
}

fn apply_cluster_config(
    shape: &mut ClusterShape,
    config: &ClusterConfig,
    matches: &ArgMatches,
) -> Result<(), ConfigError> {
    if !is_cli(matches, "agents")
        && let Some(agents) = config.agents
    {
        shape.agents = agents;
    }
    if !is_cli(matches, "workers_per_agent")
        && let Some(members) = config.members_per_agent
    {
        shape.members_per_agent = members;
    }
    if !is_cli(matches, "client_workers")
        && let Some(clients) = config.clients_per_agent
    {
        shape.clients_per_agent = clients;
    }
    if !is_cli(matches, "phase_delay")
        && let Some(value) = &config.phase_delay
    {
        shape.phase_delay = value.to_duration("phase_delay")?;
    }
    if let Some(value) = &config.stats_interval {
        shape.stats_interval = value.to_duration("stats_interval")?;
    }
    Ok(())
}

fn is_cli(matches: &ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(ValueSource::CommandLine)
}

fn ensure_positive_usize(value: usize, field: &'static str) -> AppResult<()> {
    if value == 0 {
        return Err(AppError::config(ConfigError::FieldMustBePositive { field }));
    }
    Ok(())
}

fn ensure_positive_duration(value: Duration, field: &'static str) -> AppResult<()> {
    if value.is_zero() {
        return Err(AppError::config(ConfigError::FieldMustBePositive { field }));
    }
    Ok(())
}
