use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use tempfile::tempdir;

use super::types::{DurationValue, SuiteFile};
use super::{build_suite, load_suite, load_suite_file, parse_duration_value, resolve_run};
use crate::args::{Command, CoordinatorArgs, RunArgs};
use crate::error::{AppError, AppResult, ConfigError};
use crate::protocol::{FailureType, TestPhase};
use crate::registry::TargetType;

fn io_error(err: std::io::Error) -> AppError {
    AppError::coordinator(format!("io failed: {}", err))
}

fn parse_run(argv: &[&str]) -> AppResult<(RunArgs, clap::ArgMatches)> {
    let matches = CoordinatorArgs::command().try_get_matches_from(argv)?;
    let args = CoordinatorArgs::from_arg_matches(&matches)?;
    let Command::Run(run) = args.command else {
        return Err(AppError::coordinator("expected the run command"));
    };
    let run_matches = matches
        .subcommand_matches("run")
        .cloned()
        .ok_or_else(|| AppError::coordinator("missing run matches"))?;
    Ok((run, run_matches))
}

#[test]
fn parse_toml_suite_with_tests_and_tables() -> AppResult<()> {
    let dir = tempdir().map_err(io_error)?;
    let path = dir.path().join("suite.toml");
    let content = r#"
duration = "2m"
warmup = 10
fail_fast = false
parallel = true
target_type = "clients"
target_count = 2
sync_to_phase = "local_prepare"
non_critical_failures = ["worker_finished", "worker_timeout"]

[[tests]]
id = "map"

[tests.properties]
threads = 4
run_for = "2s"
enabled = true

[[tests]]
id = "queue"

[coordinator]
poll_interval = "250ms"

[cluster]
agents = 2
clients_per_agent = 1
"#;
    std::fs::write(&path, content).map_err(io_error)?;

    let file = load_suite_file(&path)?;
    if file.duration != Some(DurationValue::Text("2m".to_owned())) {
        return Err(AppError::coordinator("Unexpected duration"));
    }
    let suite = build_suite(&file)?;
    if suite.duration != Duration::from_secs(120) || suite.warmup != Duration::from_secs(10) {
        return Err(AppError::coordinator("Unexpected suite durations"));
    }
    if suite.fail_fast || !suite.parallel || suite.target_type != TargetType::Clients {
        return Err(AppError::coordinator("Unexpected suite flags"));
    }
    if suite.target_count != 2 || suite.sync_to_phase != Some(TestPhase::LocalPrepare) {
        return Err(AppError::coordinator("Unexpected target or sync phase"));
    }
    if !suite
        .non_critical_failures
        .contains(&FailureType::WorkerTimeout)
    {
        return Err(AppError::coordinator("Missing non-critical failure type"));
    }
    let Some(map) = suite.test_cases.first() else {
        return Err(AppError::coordinator("Missing first test"));
    };
    if map.id != "map" || map.property("threads") != Some("4") {
        return Err(AppError::coordinator("Unexpected first test"));
    }
    if map.property("enabled") != Some("true") || map.property("run_for") != Some("2s") {
        return Err(AppError::coordinator("Unexpected rendered properties"));
    }
    if suite.test_count() != 2 {
        return Err(AppError::coordinator("Expected two tests"));
    }
    Ok(())
}

#[test]
fn parse_json_suite() -> AppResult<()> {
    let dir = tempdir().map_err(io_error)?;
    let path = dir.path().join("suite.json");
    let content = r#"{
        "duration": "0s",
        "verify": false,
        "tests": [{"id": "map"}, {"id": "list", "properties": {"fail_on_phase": "RUN"}}]
    }"#;
    std::fs::write(&path, content).map_err(io_error)?;

    let suite = build_suite(&load_suite_file(&path)?)?;
    if !suite.duration.is_zero() || suite.verify_enabled {
        return Err(AppError::coordinator("Unexpected suite values"));
    }
    if suite.phases().contains(&TestPhase::GlobalVerify) {
        return Err(AppError::coordinator("Verify phases must be skipped"));
    }
    Ok(())
}

#[test]
fn explicit_missing_path_is_a_read_error() -> AppResult<()> {
    let dir = tempdir().map_err(io_error)?;
    let path = dir.path().join("absent.toml");
    let path_text = path.to_string_lossy().into_owned();
    match load_suite(Some(path_text.as_str())) {
        Err(AppError::Config(ConfigError::ReadSuite { .. })) => Ok(()),
        other => Err(AppError::coordinator(format!(
            "expected read error, got {:?}",
            other.map(|file| file.is_some())
        ))),
    }
}

#[test]
fn unsupported_extension_is_rejected() -> AppResult<()> {
    let dir = tempdir().map_err(io_error)?;
    let path = dir.path().join("suite.yaml");
    std::fs::write(&path, "tests: []").map_err(io_error)?;
    match load_suite_file(&path) {
        Err(AppError::Config(ConfigError::UnsupportedExtension { ext })) if ext == "yaml" => Ok(()),
        other => Err(AppError::coordinator(format!(
            "expected unsupported extension, got {:?}",
            other.map(|file| file.tests.len())
        ))),
    }
}

#[test]
fn suite_validation_errors() -> AppResult<()> {
    let empty = SuiteFile::default();
    match build_suite(&empty) {
        Err(AppError::Config(ConfigError::NoTests)) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected NoTests, got {:?}",
                other.map(|suite| suite.test_count())
            )));
        }
    }

    let duplicate: SuiteFile = toml::from_str("[[tests]]\nid = \"map\"\n[[tests]]\nid = \"map\"\n")
        .map_err(|err| AppError::coordinator(format!("toml failed: {}", err)))?;
    match build_suite(&duplicate) {
        Err(AppError::Config(ConfigError::DuplicateTestId { id })) if id == "map" => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected DuplicateTestId, got {:?}",
                other.map(|suite| suite.test_count())
            )));
        }
    }

    let blank: SuiteFile = toml::from_str("[[tests]]\nid = \"  \"\n")
        .map_err(|err| AppError::coordinator(format!("toml failed: {}", err)))?;
    match build_suite(&blank) {
        Err(AppError::Config(ConfigError::EmptyTestId { index: 0 })) => {}
        other => {
            return Err(AppError::coordinator(format!(
                "expected EmptyTestId, got {:?}",
                other.map(|suite| suite.test_count())
            )));
        }
    }

    let bad_phase: SuiteFile =
        toml::from_str("sync_to_phase = \"cleanup\"\n[[tests]]\nid = \"map\"\n")
            .map_err(|err| AppError::coordinator(format!("toml failed: {}", err)))?;
    match build_suite(&bad_phase) {
        Err(AppError::Config(ConfigError::UnknownPhase { value })) if value == "cleanup" => Ok(()),
        other => Err(AppError::coordinator(format!(
            "expected UnknownPhase, got {:?}",
            other.map(|suite| suite.test_count())
        ))),
    }
}

#[test]
fn cli_overrides_suite_file_only_when_given() -> AppResult<()> {
    let file: SuiteFile = toml::from_str(
        r#"
duration = "30s"
parallel = true

[[tests]]
id = "map"

[coordinator]
poll_interval = "250ms"

[cluster]
agents = 3
members_per_agent = 2
"#,
    )
    .map_err(|err| AppError::coordinator(format!("toml failed: {}", err)))?;

    let (args, matches) = parse_run(&[
        "loadcoord",
        "run",
        "--duration",
        "5s",
        "--sequential",
        "--test",
        "queue",
        "--agents",
        "1",
    ])?;
    let settings = resolve_run(Some(&file), &args, &matches)?;

    if settings.suite.duration != Duration::from_secs(5) || settings.suite.parallel {
        return Err(AppError::coordinator("CLI suite overrides not applied"));
    }
    let ids: Vec<&str> = settings
        .suite
        .test_cases
        .iter()
        .map(|test_case| test_case.id.as_str())
        .collect();
    if ids != ["map", "queue"] {
        return Err(AppError::coordinator(format!("unexpected tests {:?}", ids)));
    }
    if settings.coordinator.poll_interval != Duration::from_millis(250) {
        return Err(AppError::coordinator("suite poll interval should win over default"));
    }
    if settings.cluster.agents != 1 || settings.cluster.members_per_agent != 2 {
        return Err(AppError::coordinator("cluster precedence mismatch"));
    }
    Ok(())
}

#[test]
fn run_without_workers_is_rejected() -> AppResult<()> {
    let (args, matches) = parse_run(&[
        "loadcoord",
        "run",
        "--test",
        "map",
        "--workers-per-agent",
        "0",
    ])?;
    match resolve_run(None, &args, &matches) {
        Err(AppError::Config(ConfigError::FieldMustBePositive { field })) => {
            if field != "workers_per_agent" {
                return Err(AppError::coordinator(format!("unexpected field {}", field)));
            }
            Ok(())
        }
        other => Err(AppError::coordinator(format!(
            "expected positive check, got {:?}",
            other.map(|settings| settings.cluster)
        ))),
    }
}

#[test]
fn durations_accept_units_and_zero() -> AppResult<()> {
    let cases = [
        ("0", Duration::ZERO),
        ("250ms", Duration::from_millis(250)),
        ("5", Duration::from_secs(5)),
        ("5s", Duration::from_secs(5)),
        ("2m", Duration::from_secs(120)),
        ("1h", Duration::from_secs(3_600)),
    ];
    for (text, expected) in cases {
        let parsed = parse_duration_value(text).map_err(AppError::coordinator)?;
        if parsed != expected {
            return Err(AppError::coordinator(format!(
                "{} parsed as {:?}",
                text, parsed
            )));
        }
    }
    for text in ["", "s", "5d", "ms5"] {
        if parse_duration_value(text).is_ok() {
            return Err(AppError::coordinator(format!("{:?} should be rejected", text)));
        }
    }
    Ok(())
}
