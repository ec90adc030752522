use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::protocol::FailureType;
use crate::registry::TargetType;

use super::parse::parse_duration_value;

/// A duration written either as bare seconds or as `ms/s/m/h` text.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self, field: &'static str) -> Result<Duration, ConfigError> {
        match self {
            Self::Seconds(seconds) => Ok(Duration::from_secs(*seconds)),
            Self::Text(text) => parse_duration_value(text)
                .map_err(|message| ConfigError::InvalidDuration { field, message }),
        }
    }
}

/// Scalar test case property. Every value reaches the worker as text.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Integer(value) => value.to_string(),
            Self::Float(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TestCaseConfig {
    pub id: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// `[coordinator]` table: runner timing.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub poll_interval: Option<DurationValue>,
    pub performance_monitor_interval: Option<DurationValue>,
    pub response_timeout: Option<DurationValue>,
}

/// `[cluster]` table: shape of the simulated cluster.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    pub agents: Option<usize>,
    pub members_per_agent: Option<usize>,
    pub clients_per_agent: Option<usize>,
    pub phase_delay: Option<DurationValue>,
    pub stats_interval: Option<DurationValue>,
}

/// Contents of a `suite.toml` / `suite.json` file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SuiteFile {
    pub duration: Option<DurationValue>,
    pub warmup: Option<DurationValue>,
    pub wait_for_test_case: Option<bool>,
    pub verify: Option<bool>,
    pub fail_fast: Option<bool>,
    pub parallel: Option<bool>,
    pub target_type: Option<TargetType>,
    pub target_count: Option<i32>,
    pub sync_to_phase: Option<String>,
    pub non_critical_failures: Option<Vec<FailureType>>,
    #[serde(default)]
    pub tests: Vec<TestCaseConfig>,
    pub coordinator: Option<CoordinatorConfig>,
    pub cluster: Option<ClusterConfig>,
}
