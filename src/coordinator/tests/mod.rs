use std::sync::Arc;
use std::time::Duration;

use super::{Coordinator, CoordinatorSettings, SuiteReport};
use crate::cluster::{ClusterShape, LocalCluster};
use crate::domain::{TestCase, TestSuite};
use crate::error::{AppError, AppResult};
use crate::protocol::Connector;
use crate::registry::{CompletedStatus, ComponentRegistry};
use recording::{RecordingConnector, Timeline};

mod barrier;
mod runs;

/// Upper bound for any suite run in these tests.
const RUN_LIMIT: Duration = Duration::from_secs(20);

fn fast_settings() -> CoordinatorSettings {
    CoordinatorSettings {
        poll_interval: Duration::from_millis(20),
        phase_log_interval: Duration::from_millis(500),
        phase_log_verbose_delay: Duration::from_secs(2),
        performance_monitor_interval: Duration::from_millis(100),
        response_timeout: Duration::from_secs(5),
    }
}

fn shape(members: usize, clients: usize) -> ClusterShape {
    ClusterShape {
        agents: 1,
        members_per_agent: members,
        clients_per_agent: clients,
        phase_delay: Duration::from_millis(5),
        stats_interval: Duration::from_millis(25),
    }
}

fn suite<I>(tests: I, duration: Duration) -> TestSuite
where
    I: IntoIterator<Item = TestCase>,
{
    TestSuite {
        duration,
        ..TestSuite::with_tests(tests)
    }
}

struct Harness {
    coordinator: Coordinator,
    cluster: LocalCluster,
}

impl Harness {
    fn start(shape: ClusterShape) -> AppResult<Self> {
        Self::start_with(shape, |connector| connector)
    }

    /// Starts a harness whose phase traffic lands in the returned timeline.
    fn start_recording(shape: ClusterShape) -> AppResult<(Self, Arc<Timeline>)> {
        let timeline = Arc::new(Timeline::default());
        let recorded = Arc::clone(&timeline);
        let harness = Self::start_with(shape, move |connector| {
            Arc::new(RecordingConnector::new(connector, recorded)) as Arc<dyn Connector>
        })?;
        Ok((harness, timeline))
    }

    fn start_with<F>(shape: ClusterShape, wrap: F) -> AppResult<Self>
    where
        F: FnOnce(Arc<dyn Connector>) -> Arc<dyn Connector>,
    {
        let registry = Arc::new(ComponentRegistry::new());
        let cluster = LocalCluster::start(&registry, shape)?;
        let coordinator = Coordinator::new(wrap(cluster.connector()), registry, fast_settings());
        Ok(Self {
            coordinator,
            cluster,
        })
    }

    async fn run(&self, suite: TestSuite) -> AppResult<SuiteReport> {
        tokio::time::timeout(RUN_LIMIT, self.coordinator.run_suite(suite))
            .await
            .map_err(|elapsed| AppError::coordinator(format!("suite run hung: {}", elapsed)))?
    }

    fn shutdown(self) {
        self.cluster.shutdown();
    }
}

fn expect_status(report: &SuiteReport, test_id: &str, expected: CompletedStatus) -> AppResult<()> {
    let Some(outcome) = report.outcome(test_id) else {
        return Err(AppError::coordinator(format!("no outcome for {}", test_id)));
    };
    if outcome.status != expected {
        return Err(AppError::coordinator(format!(
            "{} ended {:?}, expected {:?}",
            test_id, outcome.status, expected
        )));
    }
    Ok(())
}
