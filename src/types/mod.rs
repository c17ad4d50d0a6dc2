// ABOUTME: Core domain types shared across the crate.
// ABOUTME: Validated names, provider discriminators, and remote resource ids.

mod deployment_name;
mod provider_kind;
mod resource_id;

pub use deployment_name::{DeploymentName, NameError};
pub use provider_kind::{ProviderKind, UnknownProvider};
pub use resource_id::ResourceId;
