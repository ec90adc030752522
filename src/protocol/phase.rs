use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseScope {
    /// Runs on exactly one designated worker and may touch shared state.
    Global,
    /// Runs independently on every worker.
    Local,
}

/// Lifecycle stage of a test case, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestPhase {
    Setup,
    LocalPrepare,
    GlobalPrepare,
    Warmup,
    LocalAfterWarmup,
    GlobalAfterWarmup,
    Run,
    GlobalVerify,
    LocalVerify,
    GlobalTeardown,
    LocalTeardown,
}

impl TestPhase {
    pub const ALL: [Self; 11] = [
        Self::Setup,
        Self::LocalPrepare,
        Self::GlobalPrepare,
        Self::Warmup,
        Self::LocalAfterWarmup,
        Self::GlobalAfterWarmup,
        Self::Run,
        Self::GlobalVerify,
        Self::LocalVerify,
        Self::GlobalTeardown,
        Self::LocalTeardown,
    ];

    #[must_use]
    pub const fn scope(self) -> PhaseScope {
        match self {
            Self::GlobalPrepare
            | Self::GlobalAfterWarmup
            | Self::GlobalVerify
            | Self::GlobalTeardown => PhaseScope::Global,
            Self::Setup
            | Self::LocalPrepare
            | Self::Warmup
            | Self::LocalAfterWarmup
            | Self::Run
            | Self::LocalVerify
            | Self::LocalTeardown => PhaseScope::Local,
        }
    }

    #[must_use]
    pub const fn is_global(self) -> bool {
        matches!(self.scope(), PhaseScope::Global)
    }

    /// Phases that run for a configured duration and are ended by a stop.
    #[must_use]
    pub const fn is_duration_bound(self) -> bool {
        matches!(self, Self::Warmup | Self::Run)
    }

    #[must_use]
    pub const fn is_warmup_related(self) -> bool {
        matches!(
            self,
            Self::Warmup | Self::LocalAfterWarmup | Self::GlobalAfterWarmup
        )
    }

    #[must_use]
    pub const fn is_verify(self) -> bool {
        matches!(self, Self::GlobalVerify | Self::LocalVerify)
    }

    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Setup => Some(Self::LocalPrepare),
            Self::LocalPrepare => Some(Self::GlobalPrepare),
            Self::GlobalPrepare => Some(Self::Warmup),
            Self::Warmup => Some(Self::LocalAfterWarmup),
            Self::LocalAfterWarmup => Some(Self::GlobalAfterWarmup),
            Self::GlobalAfterWarmup => Some(Self::Run),
            Self::Run => Some(Self::GlobalVerify),
            Self::GlobalVerify => Some(Self::LocalVerify),
            Self::LocalVerify => Some(Self::GlobalTeardown),
            Self::GlobalTeardown => Some(Self::LocalTeardown),
            Self::LocalTeardown => None,
        }
    }

    /// Human readable name used in log lines.
    #[must_use]
    pub const fn desc(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::LocalPrepare => "local prepare",
            Self::GlobalPrepare => "global prepare",
            Self::Warmup => "warmup",
            Self::LocalAfterWarmup => "local after warmup",
            Self::GlobalAfterWarmup => "global after warmup",
            Self::Run => "run",
            Self::GlobalVerify => "global verify",
            Self::LocalVerify => "local verify",
            Self::GlobalTeardown => "global tear down",
            Self::LocalTeardown => "local tear down",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Setup => "SETUP",
            Self::LocalPrepare => "LOCAL_PREPARE",
            Self::GlobalPrepare => "GLOBAL_PREPARE",
            Self::Warmup => "WARMUP",
            Self::LocalAfterWarmup => "LOCAL_AFTER_WARMUP",
            Self::GlobalAfterWarmup => "GLOBAL_AFTER_WARMUP",
            Self::Run => "RUN",
            Self::GlobalVerify => "GLOBAL_VERIFY",
            Self::LocalVerify => "LOCAL_VERIFY",
            Self::GlobalTeardown => "GLOBAL_TEARDOWN",
            Self::LocalTeardown => "LOCAL_TEARDOWN",
        }
    }
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestPhase {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().replace(['-', ' '], "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnknownPhase {
                value: value.to_owned(),
            })
    }
}
