//! Per-VM row assembly
//!
//! Runs every lookup for one VM and merges the results into an
//! [`InventoryRow`]. No lookup can fail the row: each field falls back to its
//! own empty or zero sentinel.

use crate::config::RunConfig;
use crate::detail::LazyVmDetail;
use crate::disks::DiskAccountant;
use crate::lookup::guarded;
use crate::models::{BootType, InventoryRow, OsFamily, VirtualMachineDescriptor};
use crate::provider::Providers;
use crate::size::SizeResolver;
use crate::utilization::UtilizationCollector;
use std::sync::Arc;
use tracing::{debug, info};

pub const WINDOWS_OS_NAME: &str = "Windows Server 2019 Datacenter";
pub const WINDOWS_OS_VERSION: &str = "2019";
pub const LINUX_OS_NAME: &str = "Ubuntu Linux";
pub const LINUX_OS_VERSION: &str = "20.04";
pub const OS_ARCHITECTURE: &str = "x64";

const UEFI_SECURITY_TYPES: [&str; 2] = ["TrustedLaunch", "ConfidentialVM"];

pub struct InventoryRowBuilder {
    providers: Providers,
    config: Arc<RunConfig>,
    sizes: SizeResolver,
    disks: DiskAccountant,
    utilization: UtilizationCollector,
}

impl InventoryRowBuilder {
    pub fn new(providers: Providers, config: Arc<RunConfig>) -> Self {
        let timeout = config.lookup_timeout;
        Self {
            sizes: SizeResolver::new(
                providers.sizes.clone(),
                providers.skus.clone(),
                timeout,
                config.sku_timeout,
            ),
            disks: DiskAccountant::new(providers.disks.clone(), timeout),
            utilization: UtilizationCollector::new(
                providers.metrics.clone(),
                providers.logs.clone(),
                config.clone(),
            ),
            providers,
            config,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Assemble the row for one VM
    pub async fn build(&self, vm: &VirtualMachineDescriptor) -> InventoryRow {
        info!(vm = %vm.name, size = %vm.vm_size, location = %vm.location, "Processing VM");

        let detail = LazyVmDetail::new(self.providers.vms.clone(), vm, self.config.lookup_timeout);

        let (size, disks, utilization, ip_address) = tokio::join!(
            self.sizes.resolve(&vm.vm_size, &vm.location),
            self.disks.account(vm, &detail),
            self.utilization.collect(vm),
            self.primary_ip(vm),
        );

        // Reuses the record fetched for disk resolution, if any
        let record = detail.get().await.unwrap_or(vm);
        let boot_type = boot_type(record);
        let (os_name, os_version) = os_descriptors(record);

        debug!(
            vm = %vm.name,
            cores = ?size.cores,
            memory_mb = ?size.memory_mb,
            disks = disks.count,
            cpu = utilization.cpu_percent,
            memory = ?utilization.memory_percent,
            "VM row assembled"
        );

        InventoryRow {
            server_name: vm.name.clone(),
            ip_address,
            cores: size.cores,
            memory_mb: size.memory_mb,
            os_name: Some(os_name),
            os_version: Some(os_version),
            os_architecture: Some(OS_ARCHITECTURE.to_string()),
            cpu_utilization: utilization.cpu_percent,
            memory_utilization: utilization.memory_percent,
            network_adapters: vm.nic_ids.len(),
            network: utilization.network,
            boot_type: Some(boot_type),
            disk_count: disks.count,
            storage_in_use_gb: disks.total_gb,
            disk1_size_gb: disks.os_disk.size_gb,
            disk2_size_gb: disks.first_data_disk_gb(),
            disk_io: utilization.disk_io,
        }
    }

    /// First IP configuration of the first NIC
    async fn primary_ip(&self, vm: &VirtualMachineDescriptor) -> Option<String> {
        let nic_id = vm.nic_ids.first()?;
        let nic = guarded(
            "NIC lookup",
            &vm.name,
            self.config.lookup_timeout,
            self.providers.networks.network_interface(nic_id),
        )
        .await?;
        nic.primary_ip().map(str::to_string)
    }
}

/// UEFI for trusted-launch or confidential VMs, or when secure boot is on
pub fn boot_type(vm: &VirtualMachineDescriptor) -> BootType {
    let uefi_security = vm
        .security_type
        .as_deref()
        .is_some_and(|t| UEFI_SECURITY_TYPES.iter().any(|u| u.eq_ignore_ascii_case(t)));

    if uefi_security || vm.secure_boot_enabled == Some(true) {
        BootType::Uefi
    } else {
        BootType::Bios
    }
}

/// Reported OS name/version when known, otherwise a label for the OS family
pub fn os_descriptors(vm: &VirtualMachineDescriptor) -> (String, String) {
    if let Some(name) = vm.os_name.as_deref().filter(|n| !n.trim().is_empty()) {
        return (name.to_string(), vm.os_version.clone().unwrap_or_default());
    }

    match vm.os_family {
        OsFamily::Windows => (WINDOWS_OS_NAME.to_string(), WINDOWS_OS_VERSION.to_string()),
        OsFamily::Linux | OsFamily::Unknown => {
            (LINUX_OS_NAME.to_string(), LINUX_OS_VERSION.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiskReference;
    use crate::testing::FakeCloud;
    use crate::utilization::CPU_METRIC;

    fn linux_vm() -> VirtualMachineDescriptor {
        let mut vm = VirtualMachineDescriptor::new(
            "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/app-01",
            "app-01",
            "eastus",
            "Standard_D4s_v3",
            OsFamily::Linux,
        );
        vm.os_disk = DiskReference {
            name: Some("app-01-os".to_string()),
            managed_disk_id: Some("/disks/app-01-os".to_string()),
            size_gb: None,
        };
        vm
    }

    fn builder(providers: Providers) -> InventoryRowBuilder {
        InventoryRowBuilder::new(providers, Arc::new(RunConfig::new("sub-1").unwrap()))
    }

    #[tokio::test]
    async fn test_end_to_end_linux_vm() {
        let vm = linux_vm();
        let cpu: Vec<f64> = (1..=10).map(|i| f64::from(i) * 10.0).collect();
        let (_, providers) = FakeCloud::new()
            .with_detail(vm.clone())
            .with_size("Standard_D4s_v3", 4, 16384)
            .with_disk("/disks/app-01-os", Some(64))
            .with_metric(CPU_METRIC, &cpu)
            .into_providers();

        let row = builder(providers).build(&vm).await;

        assert_eq!(row.server_name, "app-01");
        assert_eq!(row.cores, Some(4));
        assert_eq!(row.memory_mb, Some(16384));
        assert_eq!(row.os_name.as_deref(), Some("Ubuntu Linux"));
        assert_eq!(row.disk_count, 1);
        assert_eq!(row.disk1_size_gb, Some(64));
        assert_eq!(row.disk2_size_gb, None);
        assert_eq!(row.storage_in_use_gb, Some(64));
        assert_eq!(row.cpu_utilization, 100.0);
        assert_eq!(row.memory_utilization, None);
        assert_eq!(row.boot_type, Some(BootType::Bios));

        let record = row.to_record();
        assert_eq!(record[9], "100.00");
        assert_eq!(record[17], "64");
    }

    #[tokio::test]
    async fn test_cpu_failure_still_builds_row() {
        let mut vm = linux_vm();
        vm.nic_ids = vec!["/nics/app-01".to_string()];
        let (_, providers) = FakeCloud::new()
            .with_size("Standard_D4s_v3", 4, 16384)
            .with_disk("/disks/app-01-os", Some(30))
            .with_nic("/nics/app-01", &[Some("10.1.0.4")])
            .with_failing_metric(CPU_METRIC)
            .into_providers();

        let row = builder(providers).build(&vm).await;

        assert_eq!(row.cpu_utilization, 0.0);
        assert_eq!(row.cores, Some(4));
        assert_eq!(row.ip_address.as_deref(), Some("10.1.0.4"));
        assert_eq!(row.network_adapters, 1);
        assert_eq!(row.disk1_size_gb, Some(30));
    }

    #[tokio::test]
    async fn test_detail_fetched_once_for_disk_and_boot() {
        let mut vm = linux_vm();
        vm.os_disk = DiskReference::default();
        let mut full = vm.clone();
        full.os_disk.managed_disk_id = Some("/disks/app-01-os".to_string());
        full.security_type = Some("TrustedLaunch".to_string());

        let (cloud, providers) = FakeCloud::new()
            .with_detail(full)
            .with_disk("/disks/app-01-os", Some(64))
            .into_providers();

        let row = builder(providers).build(&vm).await;

        assert_eq!(row.disk1_size_gb, Some(64));
        assert_eq!(row.boot_type, Some(BootType::Uefi));
        assert_eq!(FakeCloud::calls(&cloud.detail_calls), 1);
    }

    #[tokio::test]
    async fn test_everything_failing_still_yields_row() {
        let mut vm = linux_vm();
        vm.nic_ids = vec!["/nics/missing".to_string()];
        vm.data_disks = vec![DiskReference::default()];
        let (_, providers) = FakeCloud::new()
            .with_failing_metric(CPU_METRIC)
            .into_providers();

        let row = builder(providers).build(&vm).await;

        assert_eq!(row.server_name, "app-01");
        assert_eq!(row.cores, None);
        assert_eq!(row.memory_mb, None);
        assert_eq!(row.ip_address, None);
        assert_eq!(row.disk_count, 2);
        assert_eq!(row.storage_in_use_gb, None);
        assert_eq!(row.cpu_utilization, 0.0);
        assert_eq!(row.os_name.as_deref(), Some(LINUX_OS_NAME));
    }

    #[test]
    fn test_boot_type() {
        let mut vm = linux_vm();
        assert_eq!(boot_type(&vm), BootType::Bios);

        vm.security_type = Some("ConfidentialVM".to_string());
        assert_eq!(boot_type(&vm), BootType::Uefi);

        vm.security_type = Some("Standard".to_string());
        vm.secure_boot_enabled = Some(true);
        assert_eq!(boot_type(&vm), BootType::Uefi);

        vm.secure_boot_enabled = Some(false);
        assert_eq!(boot_type(&vm), BootType::Bios);
    }

    #[test]
    fn test_os_descriptors() {
        let mut vm = linux_vm();
        vm.os_family = OsFamily::Windows;
        assert_eq!(
            os_descriptors(&vm),
            (WINDOWS_OS_NAME.to_string(), WINDOWS_OS_VERSION.to_string())
        );

        vm.os_family = OsFamily::Unknown;
        assert_eq!(os_descriptors(&vm).0, LINUX_OS_NAME);

        vm.os_name = Some("centos".to_string());
        vm.os_version = Some("7.9.2009".to_string());
        assert_eq!(
            os_descriptors(&vm),
            ("centos".to_string(), "7.9.2009".to_string())
        );
    }
}
