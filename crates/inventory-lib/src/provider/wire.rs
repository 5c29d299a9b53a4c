//! Azure REST response shapes
//!
//! Only the fields the inventory reads are modelled; everything else in the
//! payloads is ignored.

use super::{MetricPoint, MetricSeries, NetworkInterface, QueryTable, SkuCapabilities, VmSizeEntry};
use crate::models::{DiskReference, OsFamily, VirtualMachineDescriptor};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Paged ARM list envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    pub next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub properties: VmProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    pub hardware_profile: Option<HardwareProfile>,
    pub storage_profile: Option<StorageProfile>,
    pub os_profile: Option<OsProfile>,
    pub network_profile: Option<NetworkProfile>,
    pub security_profile: Option<SecurityProfile>,
    pub instance_view: Option<InstanceView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub os_disk: Option<VmDisk>,
    #[serde(default)]
    pub data_disks: Vec<VmDisk>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmDisk {
    pub name: Option<String>,
    pub os_type: Option<String>,
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: Option<u64>,
    pub managed_disk: Option<ManagedDiskRef>,
}

#[derive(Debug, Deserialize)]
pub struct ManagedDiskRef {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    pub windows_configuration: Option<serde_json::Value>,
    pub linux_configuration: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<ResourceRef>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityProfile {
    pub security_type: Option<String>,
    pub uefi_settings: Option<UefiSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UefiSettings {
    pub secure_boot_enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceView {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
}

impl From<VmDisk> for DiskReference {
    fn from(disk: VmDisk) -> Self {
        Self {
            name: disk.name,
            managed_disk_id: disk.managed_disk.and_then(|m| m.id),
            size_gb: disk.disk_size_gb,
        }
    }
}

impl From<VirtualMachine> for VirtualMachineDescriptor {
    fn from(vm: VirtualMachine) -> Self {
        let props = vm.properties;
        let storage = props.storage_profile.unwrap_or_default();

        let os_tag = storage.os_disk.as_ref().and_then(|d| d.os_type.clone());
        let os_family = match (OsFamily::from_tag(os_tag.as_deref()), &props.os_profile) {
            (OsFamily::Unknown, Some(profile)) if profile.windows_configuration.is_some() => {
                OsFamily::Windows
            }
            (OsFamily::Unknown, Some(profile)) if profile.linux_configuration.is_some() => {
                OsFamily::Linux
            }
            (family, _) => family,
        };

        let (os_name, os_version) = props
            .instance_view
            .map(|iv| (iv.os_name, iv.os_version))
            .unwrap_or_default();

        let (security_type, secure_boot_enabled) = props
            .security_profile
            .map(|sp| {
                (
                    sp.security_type,
                    sp.uefi_settings.and_then(|u| u.secure_boot_enabled),
                )
            })
            .unwrap_or_default();

        Self {
            id: vm.id,
            name: vm.name,
            location: vm.location,
            vm_size: props
                .hardware_profile
                .and_then(|h| h.vm_size)
                .unwrap_or_default(),
            os_family,
            os_name,
            os_version,
            nic_ids: props
                .network_profile
                .map(|n| n.network_interfaces.into_iter().map(|r| r.id).collect())
                .unwrap_or_default(),
            os_disk: storage.os_disk.map(DiskReference::from).unwrap_or_default(),
            data_disks: storage.data_disks.into_iter().map(DiskReference::from).collect(),
            security_type,
            secure_boot_enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSize {
    pub name: String,
    pub number_of_cores: Option<u32>,
    #[serde(rename = "memoryInMB")]
    pub memory_in_mb: Option<u64>,
}

impl From<VmSize> for VmSizeEntry {
    fn from(size: VmSize) -> Self {
        Self {
            name: size.name,
            cores: size.number_of_cores,
            memory_mb: size.memory_in_mb,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSku {
    pub resource_type: Option<String>,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<SkuCapability>,
}

#[derive(Debug, Deserialize)]
pub struct SkuCapability {
    pub name: String,
    pub value: String,
}

impl ResourceSku {
    pub fn is_virtual_machine(&self) -> bool {
        self.resource_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("virtualMachines"))
    }
}

impl From<ResourceSku> for SkuCapabilities {
    fn from(sku: ResourceSku) -> Self {
        Self {
            name: sku.name,
            capabilities: sku
                .capabilities
                .into_iter()
                .map(|c| (c.name, c.value))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Disk {
    #[serde(default)]
    pub properties: DiskProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiskProperties {
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Nic {
    pub id: String,
    #[serde(default)]
    pub properties: NicProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
}

#[derive(Debug, Deserialize)]
pub struct IpConfiguration {
    #[serde(default)]
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
}

impl From<Nic> for NetworkInterface {
    fn from(nic: Nic) -> Self {
        Self {
            id: nic.id,
            ip_configurations: nic
                .properties
                .ip_configurations
                .into_iter()
                .map(|c| c.properties.private_ip_address)
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub value: Vec<Metric>,
}

#[derive(Debug, Deserialize)]
pub struct Metric {
    pub name: LocalizableString,
    #[serde(default)]
    pub timeseries: Vec<TimeSeriesElement>,
}

#[derive(Debug, Deserialize)]
pub struct LocalizableString {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct TimeSeriesElement {
    #[serde(default)]
    pub data: Vec<MetricValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub time_stamp: DateTime<Utc>,
    pub average: Option<f64>,
    pub maximum: Option<f64>,
    pub total: Option<f64>,
}

impl From<Metric> for MetricSeries {
    fn from(metric: Metric) -> Self {
        let mut points: Vec<MetricPoint> = metric
            .timeseries
            .into_iter()
            .flat_map(|ts| ts.data)
            .map(|v| MetricPoint {
                timestamp: v.time_stamp,
                average: v.average,
                maximum: v.maximum,
                total: v.total,
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);

        Self {
            name: metric.name.value,
            points,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    #[serde(default)]
    pub properties: WorkspaceProperties,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceProperties {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogQueryResponse {
    #[serde(default)]
    pub tables: Vec<LogTable>,
}

#[derive(Debug, Deserialize)]
pub struct LogTable {
    #[serde(default)]
    pub columns: Vec<LogColumn>,
    #[serde(default)]
    pub rows: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct LogColumn {
    pub name: String,
}

impl From<LogTable> for QueryTable {
    fn from(table: LogTable) -> Self {
        Self {
            columns: table.columns.into_iter().map(|c| c.name).collect(),
            rows: table.rows,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliAccessToken {
    pub access_token: String,
}
