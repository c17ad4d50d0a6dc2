// ABOUTME: Validated deployment name, unique within a user's workspace.
// ABOUTME: Restricted to DNS-label characters so every backend accepts it verbatim.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("deployment name cannot be empty")]
    Empty,

    #[error("deployment name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("deployment name cannot start or end with a hyphen")]
    EdgeHyphen,

    #[error("invalid character in deployment name: '{0}' (use lowercase letters, digits, hyphens)")]
    InvalidChar(char),
}

/// Name of a deployment. Backends use it as the pod/service name, so it is
/// restricted to what every vendor accepts: a lowercase DNS label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentName(String);

impl DeploymentName {
    pub fn new(value: &str) -> Result<Self, NameError> {
        if value.is_empty() {
            return Err(NameError::Empty);
        }

        if value.len() > 63 {
            return Err(NameError::TooLong);
        }

        if value.starts_with('-') || value.ends_with('-') {
            return Err(NameError::EdgeHyphen);
        }

        for c in value.chars() {
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(NameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DeploymentName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DeploymentName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        DeploymentName::new(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dns_labels() {
        assert!(DeploymentName::new("gpu1").is_ok());
        assert!(DeploymentName::new("my-workspace-2").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(DeploymentName::new(""), Err(NameError::Empty));
    }

    #[test]
    fn rejects_uppercase_and_punctuation() {
        assert_eq!(
            DeploymentName::new("Gpu1"),
            Err(NameError::InvalidChar('G'))
        );
        assert_eq!(
            DeploymentName::new("a_b"),
            Err(NameError::InvalidChar('_'))
        );
    }

    #[test]
    fn rejects_edge_hyphens() {
        assert_eq!(DeploymentName::new("-a"), Err(NameError::EdgeHyphen));
        assert_eq!(DeploymentName::new("a-"), Err(NameError::EdgeHyphen));
    }

    #[test]
    fn rejects_overlong_names() {
        let long = "a".repeat(64);
        assert_eq!(DeploymentName::new(&long), Err(NameError::TooLong));
    }
}
