//! Core data models for the VM inventory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Statistic used to collapse every metric series of a run to one number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationPolicy {
    Average,
    Max,
    #[default]
    P95,
}

impl AggregationPolicy {
    /// Column holding this statistic in the memory queries (avg, p95, max)
    pub fn memory_column(self) -> usize {
        match self {
            Self::Average => 0,
            Self::P95 => 1,
            Self::Max => 2,
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Average => "Average",
            Self::Max => "Max",
            Self::P95 => "P95",
        };
        f.write_str(name)
    }
}

impl FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "average" | "avg" => Ok(Self::Average),
            "max" | "maximum" => Ok(Self::Max),
            "p95" => Ok(Self::P95),
            other => Err(format!(
                "unknown aggregation method '{}', expected one of Average, Max, P95",
                other
            )),
        }
    }
}

/// Coarse OS family tag reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OsFamily {
    Windows,
    Linux,
    Unknown,
}

impl OsFamily {
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::to_ascii_lowercase).as_deref() {
            Some("windows") => Self::Windows,
            Some("linux") => Self::Linux,
            _ => Self::Unknown,
        }
    }
}

/// Reference to a disk attached to a VM, as declared on the VM record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskReference {
    pub name: Option<String>,
    /// Resource id of the managed disk, when the VM record carries one
    pub managed_disk_id: Option<String>,
    /// Size embedded in the VM record itself (often absent)
    pub size_gb: Option<u64>,
}

/// A virtual machine as discovered in the subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMachineDescriptor {
    pub id: String,
    pub name: String,
    pub location: String,
    pub vm_size: String,
    pub os_family: OsFamily,
    /// Real OS name from the instance view, when the provider exposes it
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub nic_ids: Vec<String>,
    pub os_disk: DiskReference,
    pub data_disks: Vec<DiskReference>,
    pub security_type: Option<String>,
    pub secure_boot_enabled: Option<bool>,
}

impl VirtualMachineDescriptor {
    /// Minimal descriptor with no disks, NICs or security settings
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        vm_size: impl Into<String>,
        os_family: OsFamily,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            vm_size: vm_size.into(),
            os_family,
            os_name: None,
            os_version: None,
            nic_ids: Vec::new(),
            os_disk: DiskReference::default(),
            data_disks: Vec::new(),
            security_type: None,
            secure_boot_enabled: None,
        }
    }
}

/// Core count and memory for a VM size label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeProfile {
    pub cores: Option<u32>,
    pub memory_mb: Option<u64>,
}

impl SizeProfile {
    pub fn known(cores: u32, memory_mb: u64) -> Self {
        Self {
            cores: Some(cores),
            memory_mb: Some(memory_mb),
        }
    }

    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_known(&self) -> bool {
        self.cores.is_some() && self.memory_mb.is_some()
    }
}

/// Resolved size of one disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskProfile {
    pub size_gb: Option<u64>,
}

impl DiskProfile {
    pub fn sized(size_gb: u64) -> Self {
        Self {
            size_gb: Some(size_gb),
        }
    }

    pub fn unresolved() -> Self {
        Self::default()
    }
}

/// One bucket of a metric time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesSample {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

/// Firmware type of the VM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootType {
    Uefi,
    Bios,
}

impl BootType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uefi => "UEFI",
            Self::Bios => "BIOS",
        }
    }
}

/// Network throughput in MB per second
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkThroughput {
    pub in_mbps: f64,
    pub out_mbps: f64,
}

/// VM-aggregate disk throughput (MB/s) and IOPS
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskThroughput {
    pub read_mbps: f64,
    pub write_mbps: f64,
    pub read_ops: f64,
    pub write_ops: f64,
}

/// The flat record written for one VM
///
/// `None` renders as an empty cell. CPU, network and disk I/O use a plain
/// number because their "no data" sentinel is a formatted zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub server_name: String,
    pub ip_address: Option<String>,
    pub cores: Option<u32>,
    pub memory_mb: Option<u64>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub os_architecture: Option<String>,
    pub cpu_utilization: f64,
    pub memory_utilization: Option<f64>,
    pub network_adapters: usize,
    pub network: NetworkThroughput,
    pub boot_type: Option<BootType>,
    pub disk_count: usize,
    pub storage_in_use_gb: Option<u64>,
    pub disk1_size_gb: Option<u64>,
    pub disk2_size_gb: Option<u64>,
    /// Written to both the Disk 1 and Disk 2 throughput columns
    pub disk_io: DiskThroughput,
}

impl InventoryRow {
    /// Row carrying only the server name, used when a VM's processing died
    pub fn placeholder(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            ip_address: None,
            cores: None,
            memory_mb: None,
            os_name: None,
            os_version: None,
            os_architecture: None,
            cpu_utilization: 0.0,
            memory_utilization: None,
            network_adapters: 0,
            network: NetworkThroughput::default(),
            boot_type: None,
            disk_count: 1,
            storage_in_use_gb: None,
            disk1_size_gb: None,
            disk2_size_gb: None,
            disk_io: DiskThroughput::default(),
        }
    }
}
