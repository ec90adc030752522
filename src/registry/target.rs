use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::WorkerKind;

/// Which workers drive load for a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    All,
    Members,
    Clients,
    /// Clients when any client worker exists, otherwise all workers.
    #[default]
    PreferClients,
}

impl TargetType {
    /// Resolves [`TargetType::PreferClients`] against the current topology;
    /// other variants are returned unchanged.
    #[must_use]
    pub const fn resolve_prefer_clients(self, has_client_workers: bool) -> Self {
        match self {
            Self::PreferClients if has_client_workers => Self::Clients,
            Self::PreferClients => Self::All,
            Self::All | Self::Members | Self::Clients => self,
        }
    }

    #[must_use]
    pub const fn matches(self, kind: WorkerKind) -> bool {
        match self {
            Self::All | Self::PreferClients => true,
            Self::Members => matches!(kind, WorkerKind::Member),
            Self::Clients => matches!(kind, WorkerKind::Client),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Members => "member",
            Self::Clients => "client",
            Self::PreferClients => "prefer client",
        }
    }

    /// Human description of a target set, e.g. `2 client workers`.
    #[must_use]
    pub fn describe(self, target_count: i32) -> String {
        if target_count > 0 {
            format!("{} {} workers", target_count, self.as_str())
        } else {
            match self {
                Self::All => "all workers".to_owned(),
                Self::Members | Self::Clients | Self::PreferClients => {
                    format!("all {} workers", self.as_str())
                }
            }
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
