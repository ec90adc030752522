use std::sync::Arc;

use tracing::info;

use crate::cluster::LocalCluster;
use crate::config::RunSettings;
use crate::coordinator::Coordinator;
use crate::coordinator::format::{pad_right, seconds_to_human};
use crate::domain::TestSuite;
use crate::error::AppResult;
use crate::registry::ComponentRegistry;

use super::types::RunPlan;

pub(crate) async fn execute_plan(plan: RunPlan) -> AppResult<()> {
    match plan {
        RunPlan::Phases(suite) => {
            print_phases(&suite);
            Ok(())
        }
        RunPlan::Run(settings) => run_suite(*settings).await,
    }
}

async fn run_suite(settings: RunSettings) -> AppResult<()> {
    let RunSettings {
        suite,
        coordinator,
        cluster,
    } = settings;

    let registry = Arc::new(ComponentRegistry::new());
    let cluster = LocalCluster::start(&registry, cluster)?;
    info!(
        "Simulated cluster up: {} agent(s), {} worker(s)",
        registry.agent_count(),
        registry.worker_count()
    );

    let coordinator = Coordinator::new(cluster.connector(), Arc::clone(&registry), coordinator);
    let result = coordinator.run_suite(suite).await;
    cluster.shutdown();

    let report = result?;
    report.ensure_success()?;
    Ok(())
}

fn print_phases(suite: &TestSuite) {
    let warmup = if suite.is_warmup_enabled() {
        seconds_to_human(suite.warmup)
    } else {
        "disabled".to_owned()
    };
    let duration = if suite.duration.is_zero() {
        "until the test completes".to_owned()
    } else {
        seconds_to_human(suite.duration)
    };
    println!(
        "{} test(s), {}, warmup {}, run {}",
        suite.test_count(),
        if suite.parallel { "parallel" } else { "sequential" },
        warmup,
        duration
    );
    for test_case in &suite.test_cases {
        println!("  test {}", test_case.id);
    }
    for (position, phase) in suite.phases().into_iter().enumerate() {
        let scope = if phase.is_global() { "global" } else { "local" };
        let synced = if suite.parallel && suite.is_synced(phase) {
            "synced"
        } else {
            ""
        };
        println!(
            "{:>3}. {}{}{}",
            position.saturating_add(1),
            pad_right(phase.as_str(), 22),
            pad_right(scope, 8),
            synced
        );
    }
}
