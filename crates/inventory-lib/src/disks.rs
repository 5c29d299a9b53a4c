//! Disk accounting
//!
//! Resolves per-disk sizes from live disk resources, falling back to what the
//! VM record declares, and derives the disk count and storage total.

use crate::detail::LazyVmDetail;
use crate::lookup::guarded;
use crate::models::{DiskProfile, DiskReference, VirtualMachineDescriptor};
use crate::provider::DiskStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Everything the row needs to know about a VM's disks
#[derive(Debug, Clone, PartialEq)]
pub struct DiskSummary {
    pub os_disk: DiskProfile,
    pub data_disks: Vec<DiskProfile>,
    /// OS disk plus every declared data disk, resolved or not
    pub count: usize,
    /// Sum of resolved sizes; `None` when nothing resolved
    pub total_gb: Option<u64>,
}

impl DiskSummary {
    /// Size of the first data disk, if any
    pub fn first_data_disk_gb(&self) -> Option<u64> {
        self.data_disks.first().and_then(|d| d.size_gb)
    }
}

pub struct DiskAccountant {
    disks: Arc<dyn DiskStore>,
    timeout: Duration,
}

impl DiskAccountant {
    pub fn new(disks: Arc<dyn DiskStore>, timeout: Duration) -> Self {
        Self { disks, timeout }
    }

    pub async fn account(&self, vm: &VirtualMachineDescriptor, detail: &LazyVmDetail) -> DiskSummary {
        let os_disk = self.account_os_disk(vm, detail).await;
        let data_disks = self.account_data_disks(vm).await;

        let mut all = Vec::with_capacity(data_disks.len() + 1);
        all.push(os_disk);
        all.extend(data_disks.iter().copied());

        DiskSummary {
            os_disk,
            count: disk_count(vm),
            total_gb: total_storage(&all),
            data_disks,
        }
    }

    /// OS disk size: managed disk resource, then the detail record's
    /// reference, then sizes embedded in the VM record
    pub async fn account_os_disk(&self, vm: &VirtualMachineDescriptor, detail: &LazyVmDetail) -> DiskProfile {
        let reference = match vm.os_disk.managed_disk_id.as_deref() {
            Some(id) => Some(id.to_string()),
            None => {
                debug!(vm = %vm.name, "OS disk reference missing, fetching VM detail");
                detail
                    .get()
                    .await
                    .and_then(|d| d.os_disk.managed_disk_id.clone())
            }
        };

        if let Some(id) = reference {
            if let Some(size) = self.fetch_size(&vm.name, &id).await {
                return DiskProfile::sized(size);
            }
        }

        vm.os_disk
            .size_gb
            .or_else(|| detail.peek().and_then(|d| d.os_disk.size_gb))
            .map(DiskProfile::sized)
            .unwrap_or_else(DiskProfile::unresolved)
    }

    /// Data disk sizes in declaration order
    pub async fn account_data_disks(&self, vm: &VirtualMachineDescriptor) -> Vec<DiskProfile> {
        let mut profiles = Vec::with_capacity(vm.data_disks.len());
        for disk in &vm.data_disks {
            profiles.push(self.account_data_disk(&vm.name, disk).await);
        }
        profiles
    }

    async fn account_data_disk(&self, vm_name: &str, disk: &DiskReference) -> DiskProfile {
        if let Some(id) = disk.managed_disk_id.as_deref() {
            if let Some(size) = self.fetch_size(vm_name, id).await {
                return DiskProfile::sized(size);
            }
        }

        disk.size_gb
            .map(DiskProfile::sized)
            .unwrap_or_else(DiskProfile::unresolved)
    }

    async fn fetch_size(&self, vm_name: &str, disk_id: &str) -> Option<u64> {
        guarded(
            "Disk lookup",
            vm_name,
            self.timeout,
            self.disks.disk_size_gb(disk_id),
        )
        .await
        .flatten()
    }
}

/// OS disk plus declared data disks
pub fn disk_count(vm: &VirtualMachineDescriptor) -> usize {
    1 + vm.data_disks.len()
}

/// Sum of resolved sizes; unresolved disks are skipped, not counted as zero
pub fn total_storage(profiles: &[DiskProfile]) -> Option<u64> {
    profiles
        .iter()
        .filter_map(|p| p.size_gb)
        .fold(None, |acc, size| Some(acc.unwrap_or(0) + size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OsFamily;
    use crate::testing::FakeCloud;

    fn vm() -> VirtualMachineDescriptor {
        VirtualMachineDescriptor::new("/vm/app-01", "app-01", "eastus", "Standard_D2s_v3", OsFamily::Linux)
    }

    fn managed(id: &str) -> DiskReference {
        DiskReference {
            name: None,
            managed_disk_id: Some(id.to_string()),
            size_gb: None,
        }
    }

    fn setup(cloud: FakeCloud, vm: &VirtualMachineDescriptor) -> (Arc<FakeCloud>, DiskAccountant, LazyVmDetail) {
        let cloud = Arc::new(cloud);
        let accountant = DiskAccountant::new(cloud.clone(), Duration::from_secs(5));
        let detail = LazyVmDetail::new(cloud.clone(), vm, Duration::from_secs(5));
        (cloud, accountant, detail)
    }

    #[tokio::test]
    async fn test_unresolved_os_disk_still_counted() {
        let vm = vm();
        let (_, accountant, detail) = setup(FakeCloud::new(), &vm);

        let summary = accountant.account(&vm, &detail).await;

        assert_eq!(summary.count, 1);
        assert_eq!(summary.os_disk, DiskProfile::unresolved());
        assert_eq!(summary.total_gb, None);
    }

    #[tokio::test]
    async fn test_unresolved_data_disk_excluded_from_total() {
        let mut vm = vm();
        vm.os_disk = managed("/disks/os");
        vm.data_disks = vec![managed("/disks/missing")];
        let (_, accountant, detail) = setup(FakeCloud::new().with_disk("/disks/os", Some(30)), &vm);

        let summary = accountant.account(&vm, &detail).await;

        assert_eq!(summary.count, 2);
        assert_eq!(summary.os_disk.size_gb, Some(30));
        assert_eq!(summary.data_disks, vec![DiskProfile::unresolved()]);
        assert_eq!(summary.total_gb, Some(30));
    }

    #[tokio::test]
    async fn test_managed_reference_skips_detail_fetch() {
        let mut vm = vm();
        vm.os_disk = managed("/disks/os");
        let (cloud, accountant, detail) = setup(FakeCloud::new().with_disk("/disks/os", Some(64)), &vm);

        let profile = accountant.account_os_disk(&vm, &detail).await;

        assert_eq!(profile.size_gb, Some(64));
        assert_eq!(FakeCloud::calls(&cloud.detail_calls), 0);
    }

    #[tokio::test]
    async fn test_missing_reference_uses_detail_record() {
        let vm = vm();
        let mut full = vm.clone();
        full.os_disk = managed("/disks/os");
        let (cloud, accountant, detail) = setup(
            FakeCloud::new()
                .with_detail(full)
                .with_disk("/disks/os", Some(128)),
            &vm,
        );

        let profile = accountant.account_os_disk(&vm, &detail).await;

        assert_eq!(profile.size_gb, Some(128));
        assert_eq!(FakeCloud::calls(&cloud.detail_calls), 1);
    }

    #[tokio::test]
    async fn test_embedded_size_fallback() {
        let mut vm = vm();
        vm.os_disk = DiskReference {
            name: Some("os".to_string()),
            managed_disk_id: Some("/disks/gone".to_string()),
            size_gb: Some(127),
        };
        vm.data_disks = vec![DiskReference {
            name: Some("data0".to_string()),
            managed_disk_id: None,
            size_gb: Some(256),
        }];
        let (_, accountant, detail) = setup(FakeCloud::new(), &vm);

        let summary = accountant.account(&vm, &detail).await;

        assert_eq!(summary.os_disk.size_gb, Some(127));
        assert_eq!(summary.first_data_disk_gb(), Some(256));
        assert_eq!(summary.total_gb, Some(383));
    }

    #[tokio::test]
    async fn test_data_disks_keep_order() {
        let mut vm = vm();
        vm.os_disk = managed("/disks/os");
        vm.data_disks = vec![managed("/disks/d0"), managed("/disks/d1"), managed("/disks/d2")];
        let (_, accountant, detail) = setup(
            FakeCloud::new()
                .with_disk("/disks/os", Some(30))
                .with_disk("/disks/d0", Some(100))
                .with_disk("/disks/d1", None)
                .with_disk("/disks/d2", Some(50)),
            &vm,
        );

        let summary = accountant.account(&vm, &detail).await;

        assert_eq!(summary.count, 4);
        assert_eq!(
            summary.data_disks,
            vec![DiskProfile::sized(100), DiskProfile::unresolved(), DiskProfile::sized(50)]
        );
        assert_eq!(summary.total_gb, Some(180));
    }

    #[test]
    fn test_total_storage() {
        assert_eq!(total_storage(&[]), None);
        assert_eq!(total_storage(&[DiskProfile::unresolved()]), None);
        assert_eq!(total_storage(&[DiskProfile::sized(0)]), Some(0));
        assert_eq!(
            total_storage(&[DiskProfile::sized(30), DiskProfile::unresolved(), DiskProfile::sized(10)]),
            Some(40)
        );
    }
}
