// ABOUTME: Provider-specific configuration sections, tagged by `provider`.
// ABOUTME: Field sets mirror what each vendor CLI actually accepts.

use serde::{Deserialize, Serialize};

/// Provider-specific part of a deployment config. Internally tagged by the
/// `provider` field of the document; an unrecognized tag fails to parse,
/// it is never defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum BackendConfig {
    Runpod(RunpodConfig),
    Northflank(NorthflankConfig),
}

/// RunPod GPU pod settings, passed to `runpodctl create pods`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunpodConfig {
    pub gpu_type: GpuType,

    #[serde(default = "default_gpu_count")]
    pub gpu_count: u32,

    #[serde(default)]
    pub cloud_type: CloudType,

    /// RunPod data center id, e.g. "EU-RO-1". Any region when absent.
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default = "default_container_disk_gb")]
    pub container_disk_gb: u32,

    #[serde(default = "default_volume_size_gb")]
    pub volume_size_gb: u32,

    /// Ports exposed through the RunPod proxy.
    #[serde(default)]
    pub expose_ports: Vec<u16>,
}

fn default_gpu_count() -> u32 {
    1
}

fn default_container_disk_gb() -> u32 {
    20
}

fn default_volume_size_gb() -> u32 {
    50
}

/// GPU models offered on RunPod. Accepts the short name or the full
/// vendor identifier in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GpuType {
    #[serde(rename = "A4000", alias = "NVIDIA RTX A4000")]
    A4000,
    #[serde(rename = "A5000", alias = "NVIDIA RTX A5000")]
    A5000,
    #[serde(rename = "RTX4090", alias = "NVIDIA GeForce RTX 4090")]
    Rtx4090,
    #[serde(rename = "A100", alias = "NVIDIA A100 80GB PCIe")]
    A100,
    #[serde(rename = "H100", alias = "NVIDIA H100 80GB HBM3")]
    H100,
}

impl GpuType {
    /// Names accepted in configuration, for validation messages.
    pub const ACCEPTED: [&'static str; 10] = [
        "A4000",
        "A5000",
        "RTX4090",
        "A100",
        "H100",
        "NVIDIA RTX A4000",
        "NVIDIA RTX A5000",
        "NVIDIA GeForce RTX 4090",
        "NVIDIA A100 80GB PCIe",
        "NVIDIA H100 80GB HBM3",
    ];

    /// Identifier runpodctl expects for `--gpuType`.
    pub fn vendor_id(&self) -> &'static str {
        match self {
            GpuType::A4000 => "NVIDIA RTX A4000",
            GpuType::A5000 => "NVIDIA RTX A5000",
            GpuType::Rtx4090 => "NVIDIA GeForce RTX 4090",
            GpuType::A100 => "NVIDIA A100 80GB PCIe",
            GpuType::H100 => "NVIDIA H100 80GB HBM3",
        }
    }

    /// Published community-cloud rate per GPU, for cost estimates.
    pub fn hourly_usd(&self) -> f64 {
        match self {
            GpuType::A4000 => 0.20,
            GpuType::A5000 => 0.30,
            GpuType::Rtx4090 => 0.44,
            GpuType::A100 => 1.10,
            GpuType::H100 => 2.50,
        }
    }
}

/// RunPod cloud tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CloudType {
    #[default]
    Community,
    Secure,
}

impl CloudType {
    pub const ACCEPTED: [&'static str; 2] = ["COMMUNITY", "SECURE"];

    pub fn vendor_id(&self) -> &'static str {
        match self {
            CloudType::Community => "COMMUNITY",
            CloudType::Secure => "SECURE",
        }
    }
}

/// Northflank service settings, passed to the `northflank` CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NorthflankConfig {
    /// Compute plan, e.g. "nf-compute-50".
    pub plan: String,

    /// Northflank project to place the service in; defaults to the
    /// deployment name.
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_instances")]
    pub min_instances: u32,

    #[serde(default = "default_instances")]
    pub max_instances: u32,
}

impl NorthflankConfig {
    /// Plans the validator accepts.
    pub const PLANS: [&'static str; 5] = [
        "nf-compute-10",
        "nf-compute-20",
        "nf-compute-50",
        "nf-compute-100",
        "nf-compute-200",
    ];

    pub fn project_name<'a>(&'a self, deployment: &'a str) -> &'a str {
        self.project.as_deref().unwrap_or(deployment)
    }
}

fn default_port() -> u16 {
    8080
}

fn default_instances() -> u32 {
    1
}
