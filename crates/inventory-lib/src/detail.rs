//! Per-VM lazily fetched detail record
//!
//! The full VM record is needed both for OS disk resolution (when the listing
//! lacks a managed-disk reference) and for the boot type. It is fetched at
//! most once per VM and shared by both.

use crate::lookup::guarded;
use crate::models::VirtualMachineDescriptor;
use crate::provider::VmStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

pub struct LazyVmDetail {
    store: Arc<dyn VmStore>,
    vm_id: String,
    vm_name: String,
    timeout: Duration,
    cell: OnceCell<Option<VirtualMachineDescriptor>>,
}

impl LazyVmDetail {
    pub fn new(store: Arc<dyn VmStore>, vm: &VirtualMachineDescriptor, timeout: Duration) -> Self {
        Self {
            store,
            vm_id: vm.id.clone(),
            vm_name: vm.name.clone(),
            timeout,
            cell: OnceCell::new(),
        }
    }

    /// Fetch on first use; a failed fetch is remembered as `None`
    pub async fn get(&self) -> Option<&VirtualMachineDescriptor> {
        self.cell
            .get_or_init(|| {
                guarded(
                    "VM detail fetch",
                    &self.vm_name,
                    self.timeout,
                    self.store.vm_detail(&self.vm_id),
                )
            })
            .await
            .as_ref()
    }

    /// The record if it has already been fetched, without fetching
    pub fn peek(&self) -> Option<&VirtualMachineDescriptor> {
        self.cell.get().and_then(Option::as_ref)
    }
}
