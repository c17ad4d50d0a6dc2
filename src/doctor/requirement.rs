// ABOUTME: Descriptor of an external CLI dependency declared by a provider.
// ABOUTME: Says how to detect it, verify auth, and install it.

use crate::types::ProviderKind;

/// How to verify a tool is authenticated: either a credential env var is set,
/// or the probe command exits zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProbe {
    pub program: String,
    pub args: Vec<String>,
    /// Env var that carries the credential; set means authenticated without
    /// running the probe.
    pub env_var: Option<String>,
}

/// An external CLI a provider depends on. Not persisted; built by the
/// provider that declares it and consumed by the doctor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequirement {
    /// Executable name looked up on PATH.
    pub binary: String,

    pub display_name: String,

    /// Arguments of the version-reporting subcommand.
    pub version_args: Vec<String>,

    pub auth_probe: Option<AuthProbe>,

    /// Human remediation steps shown when the tool is missing.
    pub install_hint: String,

    /// Documented install command for `doctor --fix`; first element is the
    /// program.
    pub install_command: Option<Vec<String>>,

    /// Provider this requirement belongs to, for `doctor --provider` filters.
    pub category: ProviderKind,
}
