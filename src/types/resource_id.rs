// ABOUTME: Opaque handle to a remote compute resource.
// ABOUTME: Assigned by the backend (pod id, service id); never synthesized locally.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier returned by a backend for a deployed resource.
///
/// Treated as opaque: the only thing this tool ever does with it is hand it
/// back to the same vendor CLI.
#[must_use = "resource ids reference billed infrastructure and should not be ignored"]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
