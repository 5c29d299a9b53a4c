//! Cloud provider interfaces
//!
//! Every external lookup the inventory performs goes through one of these
//! narrow traits, so the core components can run against fakes in tests and
//! against [`AzureClient`] in production.

mod auth;
mod azure;
mod wire;

pub use auth::TokenSource;
pub use azure::{AzureClient, AzureClientConfig, AzureEndpoints};

use crate::config::TimeWindow;
use crate::error::Result;
use crate::models::{TimeSeriesSample, VirtualMachineDescriptor};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub use async_trait::async_trait;

/// Entry of the fast per-location size catalog
#[derive(Debug, Clone, PartialEq)]
pub struct VmSizeEntry {
    pub name: String,
    pub cores: Option<u32>,
    pub memory_mb: Option<u64>,
}

/// Entry of the slower, more complete SKU catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkuCapabilities {
    pub name: String,
    /// Capability name -> raw string value (e.g. "vCPUs" -> "4")
    pub capabilities: HashMap<String, String>,
}

impl SkuCapabilities {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.capabilities.get(name).map(String::as_str)
    }
}

/// Network interface details relevant to the inventory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkInterface {
    pub id: String,
    /// Private address of each IP configuration, in declaration order
    pub ip_configurations: Vec<Option<String>>,
}

impl NetworkInterface {
    pub fn primary_ip(&self) -> Option<&str> {
        self.ip_configurations.first()?.as_deref()
    }
}

/// Aggregate requested per metric bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricAggregation {
    Average,
    Maximum,
    Total,
}

impl MetricAggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "Average",
            Self::Maximum => "Maximum",
            Self::Total => "Total",
        }
    }
}

/// A metrics request for one resource
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub metric_names: Vec<String>,
    pub window: TimeWindow,
    pub interval: Duration,
    pub aggregations: Vec<MetricAggregation>,
}

/// One bucket as returned by the metrics service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub average: Option<f64>,
    pub maximum: Option<f64>,
    pub total: Option<f64>,
}

/// Buckets of a single named metric, ascending by timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSeries {
    pub name: String,
    pub points: Vec<MetricPoint>,
}

impl MetricSeries {
    /// Project one aggregate out of every bucket
    pub fn samples(&self, aggregation: MetricAggregation) -> Vec<TimeSeriesSample> {
        self.points
            .iter()
            .map(|p| TimeSeriesSample {
                timestamp: p.timestamp,
                value: match aggregation {
                    MetricAggregation::Average => p.average,
                    MetricAggregation::Maximum => p.maximum,
                    MetricAggregation::Total => p.total,
                },
            })
            .collect()
    }
}

/// Result table of a log-analytics query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

/// VM discovery and detail records
#[async_trait]
pub trait VmStore: Send + Sync {
    /// List VMs in the subscription, or in one resource group
    async fn list_vms(&self, resource_group: Option<&str>) -> Result<Vec<VirtualMachineDescriptor>>;

    /// Fetch the full record of one VM (more expensive than listing)
    async fn vm_detail(&self, vm_id: &str) -> Result<VirtualMachineDescriptor>;
}

/// Fast VM size catalog, may lag the newest sizes
#[async_trait]
pub trait SizeCatalog: Send + Sync {
    async fn vm_size(&self, location: &str, size_name: &str) -> Result<Option<VmSizeEntry>>;
}

/// Slow but complete SKU catalog
#[async_trait]
pub trait SkuCatalog: Send + Sync {
    async fn vm_sku(&self, location: &str, size_name: &str) -> Result<Option<SkuCapabilities>>;
}

/// Managed disk resources
#[async_trait]
pub trait DiskStore: Send + Sync {
    /// Declared size of a managed disk, `None` when the resource has none
    async fn disk_size_gb(&self, disk_id: &str) -> Result<Option<u64>>;
}

/// Network interface resources
#[async_trait]
pub trait NetworkStore: Send + Sync {
    async fn network_interface(&self, nic_id: &str) -> Result<NetworkInterface>;
}

/// Provider metrics time series
#[async_trait]
pub trait MetricsService: Send + Sync {
    async fn query_metrics(&self, resource_id: &str, query: &MetricQuery) -> Result<Vec<MetricSeries>>;
}

/// Log-analytics workspace queries
#[async_trait]
pub trait LogQueryService: Send + Sync {
    /// Resolve a workspace name to the id used for queries
    async fn resolve_workspace(&self, resource_group: &str, name: &str) -> Result<String>;

    async fn query(&self, workspace_id: &str, query: &str) -> Result<QueryTable>;
}

/// One handle per provider interface
#[derive(Clone)]
pub struct Providers {
    pub vms: Arc<dyn VmStore>,
    pub sizes: Arc<dyn SizeCatalog>,
    pub skus: Arc<dyn SkuCatalog>,
    pub disks: Arc<dyn DiskStore>,
    pub networks: Arc<dyn NetworkStore>,
    pub metrics: Arc<dyn MetricsService>,
    pub logs: Arc<dyn LogQueryService>,
}

impl Providers {
    /// Use one client for every interface
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: VmStore
            + SizeCatalog
            + SkuCatalog
            + DiskStore
            + NetworkStore
            + MetricsService
            + LogQueryService
            + 'static,
    {
        Self {
            vms: client.clone(),
            sizes: client.clone(),
            skus: client.clone(),
            disks: client.clone(),
            networks: client.clone(),
            metrics: client.clone(),
            logs: client,
        }
    }
}
