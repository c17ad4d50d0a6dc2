// ABOUTME: Closed set of supported deployment backends.
// ABOUTME: Unknown discriminators are rejected at parse time, never defaulted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown provider: '{0}' (supported: runpod, northflank)")]
pub struct UnknownProvider(pub String);

/// The backends this tool knows how to drive. A closed enum on purpose:
/// the set is small and resolved once at configuration-validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// RunPod GPU cloud, driven through `runpodctl`.
    Runpod,
    /// Northflank Kubernetes PaaS, driven through the `northflank` CLI.
    Northflank,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Runpod, ProviderKind::Northflank];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Runpod => "runpod",
            ProviderKind::Northflank => "northflank",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "runpod" => Ok(ProviderKind::Runpod),
            "northflank" => Ok(ProviderKind::Northflank),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}
