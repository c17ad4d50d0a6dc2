// ABOUTME: Schema validation of raw config documents against provider schemas.
// ABOUTME: Collects every violation so users see all problems at once.

use super::backend::{CloudType, GpuType, NorthflankConfig};
use super::DeploymentConfig;
use crate::types::{DeploymentName, ProviderKind};
use serde_yaml::{Mapping, Value};
use std::fmt;

/// One violated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub problem: String,
}

impl Violation {
    fn new(field: &str, problem: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// The config is malformed. Carries every violation found, not just the
/// first; fixing a config should not take one CLI round-trip per field.
#[derive(Debug)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    fn single(field: &str, problem: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation::new(field, problem)],
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "invalid configuration:")?;
        for violation in &self.violations {
            writeln!(f, "  - {violation}")?;
        }
        Ok(())
    }
}

/// Validate an untyped document against the schema selected by its declared
/// `provider`. Side-effect-free; no subprocess runs before this succeeds.
pub fn validate_document(doc: &Value) -> Result<DeploymentConfig, ValidationError> {
    let Some(map) = doc.as_mapping() else {
        return Err(ValidationError::single("config", "document must be a mapping"));
    };

    let mut violations = Vec::new();

    let provider = check_provider(map, &mut violations);
    check_name(map, &mut violations);
    check_optional_str(map, "image", &mut violations);
    check_environment(map, &mut violations);

    match provider {
        Some(ProviderKind::Runpod) => check_runpod(map, &mut violations),
        Some(ProviderKind::Northflank) => check_northflank(map, &mut violations),
        None => {}
    }

    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    // Field checks passed; the typed parse should only fail on exotic
    // representations (e.g. an unparseable timeout string).
    serde_yaml::from_value(doc.clone())
        .map_err(|e| ValidationError::single("config", e.to_string()))
}

fn field<'a>(map: &'a Mapping, name: &str) -> Option<&'a Value> {
    map.get(Value::String(name.to_string()))
}

fn check_provider(map: &Mapping, violations: &mut Vec<Violation>) -> Option<ProviderKind> {
    match field(map, "provider") {
        None => {
            violations.push(Violation::new("provider", "required field is missing"));
            None
        }
        Some(Value::String(s)) => match s.parse::<ProviderKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                violations.push(Violation::new("provider", e.to_string()));
                None
            }
        },
        Some(_) => {
            violations.push(Violation::new("provider", "must be a string"));
            None
        }
    }
}

fn check_name(map: &Mapping, violations: &mut Vec<Violation>) {
    match field(map, "name") {
        None => violations.push(Violation::new("name", "required field is missing")),
        Some(Value::String(s)) => {
            if let Err(e) = DeploymentName::new(s) {
                violations.push(Violation::new("name", e.to_string()));
            }
        }
        Some(_) => violations.push(Violation::new("name", "must be a string")),
    }
}

fn check_optional_str(map: &Mapping, name: &str, violations: &mut Vec<Violation>) {
    if let Some(value) = field(map, name) {
        if !value.is_string() {
            violations.push(Violation::new(name, "must be a string"));
        }
    }
}

fn check_environment(map: &Mapping, violations: &mut Vec<Violation>) {
    match field(map, "environment") {
        None => {}
        Some(Value::Mapping(env)) => {
            for (key, value) in env {
                if !key.is_string() || !value.is_string() {
                    violations.push(Violation::new(
                        "environment",
                        "entries must map string keys to string values",
                    ));
                    break;
                }
            }
        }
        Some(_) => violations.push(Violation::new("environment", "must be a mapping")),
    }
}

fn check_int_range(
    map: &Mapping,
    name: &str,
    min: u64,
    max: u64,
    violations: &mut Vec<Violation>,
) -> Option<u64> {
    match field(map, name) {
        None => None,
        Some(value) => match value.as_u64() {
            Some(n) if (min..=max).contains(&n) => Some(n),
            Some(n) => {
                violations.push(Violation::new(
                    name,
                    format!("must be between {min} and {max}, got {n}"),
                ));
                None
            }
            None => {
                violations.push(Violation::new(name, "must be a positive integer"));
                None
            }
        },
    }
}

fn check_enum(
    map: &Mapping,
    name: &str,
    accepted: &[&str],
    required: bool,
    violations: &mut Vec<Violation>,
) {
    match field(map, name) {
        None if required => violations.push(Violation::new(name, "required field is missing")),
        None => {}
        Some(Value::String(s)) => {
            if !accepted.contains(&s.as_str()) {
                violations.push(Violation::new(
                    name,
                    format!("'{s}' is not one of: {}", accepted.join(", ")),
                ));
            }
        }
        Some(_) => violations.push(Violation::new(name, "must be a string")),
    }
}

fn check_runpod(map: &Mapping, violations: &mut Vec<Violation>) {
    check_enum(map, "gpu_type", &GpuType::ACCEPTED, true, violations);
    check_enum(map, "cloud_type", &CloudType::ACCEPTED, false, violations);
    check_optional_str(map, "region", violations);
    check_int_range(map, "gpu_count", 1, 8, violations);
    check_int_range(map, "container_disk_gb", 1, 1024, violations);
    check_int_range(map, "volume_size_gb", 1, 4096, violations);

    match field(map, "expose_ports") {
        None => {}
        Some(Value::Sequence(ports)) => {
            for port in ports {
                match port.as_u64() {
                    Some(p) if (1..=65535).contains(&p) => {}
                    _ => {
                        violations.push(Violation::new(
                            "expose_ports",
                            "entries must be port numbers between 1 and 65535",
                        ));
                        break;
                    }
                }
            }
        }
        Some(_) => violations.push(Violation::new("expose_ports", "must be a list of ports")),
    }
}

fn check_northflank(map: &Mapping, violations: &mut Vec<Violation>) {
    check_enum(map, "plan", &NorthflankConfig::PLANS, true, violations);
    check_optional_str(map, "project", violations);
    check_int_range(map, "port", 1, 65535, violations);
    let min = check_int_range(map, "min_instances", 1, 20, violations);
    let max = check_int_range(map, "max_instances", 1, 20, violations);

    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            violations.push(Violation::new(
                "min_instances",
                format!("must not exceed max_instances ({min} > {max})"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn valid_runpod_config_produces_typed_config() {
        let config = validate_document(&doc(
            "provider: runpod\nname: gpu1\ngpu_type: A100\n",
        ))
        .unwrap();
        assert_eq!(config.provider(), ProviderKind::Runpod);
        assert_eq!(config.name.as_str(), "gpu1");
    }

    #[test]
    fn unknown_provider_is_rejected_not_defaulted() {
        let err = validate_document(&doc("provider: heroku\nname: x\n")).unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "provider"));
    }

    #[test]
    fn all_violations_are_collected() {
        let err = validate_document(&doc(
            "provider: runpod\ngpu_type: T4\ngpu_count: 99\n",
        ))
        .unwrap_err();

        let fields: Vec<&str> = err.violations.iter().map(|v| v.field.as_str()).collect();
        assert!(fields.contains(&"name"), "missing name reported: {fields:?}");
        assert!(fields.contains(&"gpu_type"), "bad gpu reported: {fields:?}");
        assert!(fields.contains(&"gpu_count"), "bad count reported: {fields:?}");
    }

    #[test]
    fn northflank_plan_is_enumerated() {
        let err = validate_document(&doc(
            "provider: northflank\nname: sp2\nplan: nf-compute-9000\n",
        ))
        .unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "plan"));
    }

    #[test]
    fn northflank_scaling_bounds_are_ordered() {
        let err = validate_document(&doc(
            "provider: northflank\nname: sp2\nplan: nf-compute-50\nmin_instances: 5\nmax_instances: 2\n",
        ))
        .unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "min_instances"));
    }

    #[test]
    fn environment_must_be_string_map() {
        let err = validate_document(&doc(
            "provider: runpod\nname: gpu1\ngpu_type: A100\nenvironment:\n  KEY: 5\n",
        ))
        .unwrap_err();
        assert!(err.violations.iter().any(|v| v.field == "environment"));
    }

    #[test]
    fn non_mapping_document_is_rejected() {
        let err = validate_document(&doc("- just\n- a\n- list\n")).unwrap_err();
        assert_eq!(err.violations.len(), 1);
    }
}
