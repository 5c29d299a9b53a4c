//! In-memory provider used by the unit tests
//!
//! Every interface is backed by a map plus a call counter so tests can assert
//! both what a component produced and which lookups it made.

use crate::error::{InventoryError, Result};
use crate::models::VirtualMachineDescriptor;
use crate::provider::{
    async_trait, DiskStore, LogQueryService, MetricPoint, MetricQuery, MetricSeries,
    MetricsService, NetworkInterface, NetworkStore, Providers, QueryTable, SizeCatalog,
    SkuCapabilities, SkuCatalog, VmSizeEntry, VmStore,
};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct FakeCloud {
    pub vms: Vec<VirtualMachineDescriptor>,
    pub details: HashMap<String, VirtualMachineDescriptor>,
    pub sizes: HashMap<String, VmSizeEntry>,
    pub skus: HashMap<String, SkuCapabilities>,
    pub disks: HashMap<String, Option<u64>>,
    pub nics: HashMap<String, NetworkInterface>,
    pub metrics: HashMap<String, MetricSeries>,
    pub failing_metrics: HashSet<String>,
    pub insights_rows: Vec<Vec<Value>>,
    pub perf_rows: Vec<Vec<Value>>,
    pub failing_insights: bool,
    pub workspace: Option<String>,
    /// Size labels whose catalog lookup panics
    pub panicking_sizes: HashSet<String>,
    /// Simulated latency of every SKU catalog lookup
    pub sku_delay: Option<Duration>,

    pub detail_calls: AtomicUsize,
    pub size_calls: AtomicUsize,
    pub sku_calls: AtomicUsize,
    pub disk_calls: AtomicUsize,
    pub metric_calls: AtomicUsize,
    pub log_queries: Mutex<Vec<String>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vm(mut self, vm: VirtualMachineDescriptor) -> Self {
        self.vms.push(vm);
        self
    }

    pub fn with_detail(mut self, vm: VirtualMachineDescriptor) -> Self {
        self.details.insert(vm.id.clone(), vm);
        self
    }

    pub fn with_size(mut self, name: &str, cores: u32, memory_mb: u64) -> Self {
        self.sizes.insert(
            name.to_string(),
            VmSizeEntry {
                name: name.to_string(),
                cores: Some(cores),
                memory_mb: Some(memory_mb),
            },
        );
        self
    }

    pub fn with_sku(mut self, name: &str, capabilities: &[(&str, &str)]) -> Self {
        self.skus.insert(
            name.to_string(),
            SkuCapabilities {
                name: name.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        );
        self
    }

    pub fn with_sku_delay(mut self, delay: Duration) -> Self {
        self.sku_delay = Some(delay);
        self
    }

    pub fn with_disk(mut self, id: &str, size_gb: Option<u64>) -> Self {
        self.disks.insert(id.to_string(), size_gb);
        self
    }

    pub fn with_nic(mut self, id: &str, ips: &[Option<&str>]) -> Self {
        self.nics.insert(
            id.to_string(),
            NetworkInterface {
                id: id.to_string(),
                ip_configurations: ips.iter().map(|ip| ip.map(str::to_string)).collect(),
            },
        );
        self
    }

    /// Register a series whose buckets carry the same value in every aggregate
    pub fn with_metric(mut self, name: &str, values: &[f64]) -> Self {
        self.metrics.insert(name.to_string(), series(name, values, values));
        self
    }

    pub fn with_metric_avg_max(mut self, name: &str, averages: &[f64], maxima: &[f64]) -> Self {
        self.metrics.insert(name.to_string(), series(name, averages, maxima));
        self
    }

    pub fn with_failing_metric(mut self, name: &str) -> Self {
        self.failing_metrics.insert(name.to_string());
        self
    }

    pub fn with_insights_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.insights_rows = rows;
        self
    }

    pub fn with_perf_rows(mut self, rows: Vec<Vec<Value>>) -> Self {
        self.perf_rows = rows;
        self
    }

    pub fn with_workspace(mut self, id: &str) -> Self {
        self.workspace = Some(id.to_string());
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn into_providers(self) -> (Arc<Self>, Providers) {
        let cloud = Arc::new(self);
        let providers = Providers::from_client(cloud.clone());
        (cloud, providers)
    }
}

fn series(name: &str, averages: &[f64], maxima: &[f64]) -> MetricSeries {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    MetricSeries {
        name: name.to_string(),
        points: averages
            .iter()
            .zip(maxima)
            .enumerate()
            .map(|(i, (avg, max))| MetricPoint {
                timestamp: start + ChronoDuration::minutes(5 * i as i64),
                average: Some(*avg),
                maximum: Some(*max),
                total: Some(*avg),
            })
            .collect(),
    }
}

fn not_found(what: &str) -> InventoryError {
    InventoryError::NotFound {
        what: what.to_string(),
    }
}

#[async_trait]
impl VmStore for FakeCloud {
    async fn list_vms(&self, _resource_group: Option<&str>) -> Result<Vec<VirtualMachineDescriptor>> {
        Ok(self.vms.clone())
    }

    async fn vm_detail(&self, vm_id: &str) -> Result<VirtualMachineDescriptor> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.details.get(vm_id).cloned().ok_or_else(|| not_found(vm_id))
    }
}

#[async_trait]
impl SizeCatalog for FakeCloud {
    async fn vm_size(&self, _location: &str, size_name: &str) -> Result<Option<VmSizeEntry>> {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        if self.panicking_sizes.contains(size_name) {
            panic!("size catalog exploded for {}", size_name);
        }
        Ok(self.sizes.get(size_name).cloned())
    }
}

#[async_trait]
impl SkuCatalog for FakeCloud {
    async fn vm_sku(&self, _location: &str, size_name: &str) -> Result<Option<SkuCapabilities>> {
        self.sku_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.sku_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.skus.get(size_name).cloned())
    }
}

#[async_trait]
impl DiskStore for FakeCloud {
    async fn disk_size_gb(&self, disk_id: &str) -> Result<Option<u64>> {
        self.disk_calls.fetch_add(1, Ordering::SeqCst);
        self.disks.get(disk_id).copied().ok_or_else(|| not_found(disk_id))
    }
}

#[async_trait]
impl NetworkStore for FakeCloud {
    async fn network_interface(&self, nic_id: &str) -> Result<NetworkInterface> {
        self.nics.get(nic_id).cloned().ok_or_else(|| not_found(nic_id))
    }
}

#[async_trait]
impl MetricsService for FakeCloud {
    async fn query_metrics(&self, _resource_id: &str, query: &MetricQuery) -> Result<Vec<MetricSeries>> {
        self.metric_calls.fetch_add(1, Ordering::SeqCst);

        if query
            .metric_names
            .iter()
            .any(|name| self.failing_metrics.contains(name))
        {
            return Err(InventoryError::Api {
                status: 500,
                body: "metrics unavailable".to_string(),
            });
        }

        Ok(query
            .metric_names
            .iter()
            .filter_map(|name| self.metrics.get(name).cloned())
            .collect())
    }
}

#[async_trait]
impl LogQueryService for FakeCloud {
    async fn resolve_workspace(&self, _resource_group: &str, name: &str) -> Result<String> {
        self.workspace.clone().ok_or_else(|| not_found(name))
    }

    async fn query(&self, _workspace_id: &str, query: &str) -> Result<QueryTable> {
        self.log_queries
            .lock()
            .expect("log query mutex poisoned")
            .push(query.to_string());

        let rows = if query.trim_start().starts_with("InsightsMetrics") {
            if self.failing_insights {
                return Err(InventoryError::Api {
                    status: 400,
                    body: "table not found".to_string(),
                });
            }
            self.insights_rows.clone()
        } else {
            self.perf_rows.clone()
        };

        Ok(QueryTable {
            columns: vec!["avg".to_string(), "p95".to_string(), "max".to_string()],
            rows,
        })
    }
}
