//! Inventory run
//!
//! Discovers the VMs in scope and builds their rows on a bounded worker pool.
//! Rows are buffered by discovery index so the output order matches the
//! listing regardless of which worker finishes first.

use crate::config::RunConfig;
use crate::error::{InventoryError, Result};
use crate::lookup::guarded;
use crate::models::{InventoryRow, VirtualMachineDescriptor};
use crate::provider::{LogQueryService, Providers};
use crate::row::InventoryRowBuilder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Outcome of a full pass
#[derive(Debug, Clone)]
pub struct InventoryReport {
    pub rows: Vec<InventoryRow>,
    pub elapsed: Duration,
}

impl InventoryReport {
    /// Rows whose cores or memory could not be resolved
    pub fn unresolved_sizes(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.cores.is_none() || r.memory_mb.is_none())
            .count()
    }

    /// Rows written without a memory utilization figure
    pub fn without_memory_utilization(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.memory_utilization.is_none())
            .count()
    }
}

/// One batch pass over the VMs of a subscription
pub struct InventoryRun {
    providers: Providers,
    config: Arc<RunConfig>,
    builder: Arc<InventoryRowBuilder>,
}

impl InventoryRun {
    pub fn new(providers: Providers, config: Arc<RunConfig>) -> Self {
        let builder = Arc::new(InventoryRowBuilder::new(providers.clone(), config.clone()));
        Self {
            providers,
            config,
            builder,
        }
    }

    /// List the VMs in scope and build every row. Only a failed listing is
    /// an error; zero VMs is an empty report.
    pub async fn run(&self) -> Result<InventoryReport> {
        let start = Instant::now();

        let vms = self
            .providers
            .vms
            .list_vms(self.config.resource_group.as_deref())
            .await?;

        if vms.is_empty() {
            warn!(
                subscription = %self.config.subscription_id,
                resource_group = ?self.config.resource_group,
                "No virtual machines found"
            );
        } else {
            info!(count = vms.len(), workers = self.config.concurrency, "Discovered virtual machines");
        }

        let rows = self.collect_rows(vms).await;

        Ok(InventoryReport {
            rows,
            elapsed: start.elapsed(),
        })
    }

    /// Build rows concurrently, returned in input order
    pub async fn collect_rows(&self, vms: Vec<VirtualMachineDescriptor>) -> Vec<InventoryRow> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, vm) in vms.iter().cloned().enumerate() {
            let builder = self.builder.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, builder.build(&vm).await)
            });
        }

        let mut rows: Vec<Option<InventoryRow>> = vec![None; vms.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, row)) => rows[index] = Some(row),
                Err(e) => warn!(error = %e, "VM processing task failed"),
            }
        }

        rows.into_iter()
            .zip(vms)
            .map(|(row, vm)| row.unwrap_or_else(|| InventoryRow::placeholder(vm.name)))
            .collect()
    }
}

/// Resolve the workspace used for memory metrics. A failure only disables
/// memory utilization for the run.
pub async fn resolve_workspace(
    logs: &dyn LogQueryService,
    resource_group: &str,
    name: &str,
    timeout: Duration,
) -> Option<String> {
    let workspace = guarded(
        "Workspace resolution",
        name,
        timeout,
        logs.resolve_workspace(resource_group, name),
    )
    .await;

    match &workspace {
        Some(id) => info!(workspace = %name, workspace_id = %id, "Resolved Log Analytics workspace"),
        None => warn!(
            workspace = %name,
            resource_group = %resource_group,
            "Could not resolve Log Analytics workspace, memory utilization will be skipped"
        ),
    }
    workspace
}

/// Builder for an [`InventoryRun`]
#[derive(Default)]
pub struct InventoryRunBuilder {
    providers: Option<Providers>,
    config: Option<RunConfig>,
}

impl InventoryRunBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn providers(mut self, providers: Providers) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn config(mut self, config: RunConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<InventoryRun> {
        let providers = self.providers.ok_or_else(|| InventoryError::InvalidInput {
            reason: "providers are required".to_string(),
        })?;
        let config = self.config.ok_or_else(|| InventoryError::InvalidInput {
            reason: "run configuration is required".to_string(),
        })?;

        Ok(InventoryRun::new(providers, Arc::new(config)))
    }
}
