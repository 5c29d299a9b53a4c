//! Azure Resource Manager and Log Analytics client
//!
//! Implements every provider interface over the public REST APIs:
//! - VM listing/detail, disks and NICs from Resource Manager
//! - VM size and SKU catalogs, cached per location
//! - Azure Monitor metrics
//! - Log Analytics workspace resolution and KQL queries

use super::auth::TokenProvider;
use super::wire;
use super::{
    async_trait, DiskStore, LogQueryService, MetricQuery, MetricSeries, MetricsService,
    NetworkInterface, NetworkStore, QueryTable, SizeCatalog, SkuCapabilities, SkuCatalog,
    TokenSource, VmSizeEntry, VmStore,
};
use crate::config::{DEFAULT_LOOKUP_TIMEOUT, DEFAULT_SKU_TIMEOUT};
use crate::error::{InventoryError, Result};
use crate::models::VirtualMachineDescriptor;
use dashmap::DashMap;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

const COMPUTE_API_VERSION: &str = "2023-09-01";
const DISK_API_VERSION: &str = "2023-04-02";
const NETWORK_API_VERSION: &str = "2023-09-01";
const SKU_API_VERSION: &str = "2021-07-01";
const METRICS_API_VERSION: &str = "2018-01-01";
const WORKSPACE_API_VERSION: &str = "2022-10-01";

/// Base URLs and token audiences
#[derive(Debug, Clone)]
pub struct AzureEndpoints {
    pub management: Url,
    pub log_analytics: Url,
    pub management_audience: String,
    pub log_analytics_audience: String,
}

impl AzureEndpoints {
    /// Public-cloud endpoints
    pub fn public_cloud() -> Self {
        Self {
            management: Url::parse("https://management.azure.com/").expect("static URL"),
            log_analytics: Url::parse("https://api.loganalytics.io/").expect("static URL"),
            management_audience: "https://management.azure.com".to_string(),
            log_analytics_audience: "https://api.loganalytics.io".to_string(),
        }
    }

    /// Point both APIs at one base URL, keeping the public audiences
    pub fn single_host(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| InventoryError::InvalidInput {
            reason: format!("invalid endpoint '{}': {}", base_url, e),
        })?;
        Ok(Self {
            management: base.clone(),
            log_analytics: base,
            ..Self::public_cloud()
        })
    }

    /// Public cloud with either API moved, e.g. to a sovereign cloud. An
    /// overridden endpoint also becomes that API's token audience.
    pub fn with_overrides(management: Option<&str>, log_analytics: Option<&str>) -> Result<Self> {
        let mut endpoints = Self::public_cloud();
        if let Some(base) = management {
            endpoints.management = parse_endpoint(base)?;
            endpoints.management_audience = base.trim_end_matches('/').to_string();
        }
        if let Some(base) = log_analytics {
            endpoints.log_analytics = parse_endpoint(base)?;
            endpoints.log_analytics_audience = base.trim_end_matches('/').to_string();
        }
        Ok(endpoints)
    }
}

fn parse_endpoint(base: &str) -> Result<Url> {
    Url::parse(base).map_err(|e| InventoryError::InvalidInput {
        reason: format!("invalid endpoint '{}': {}", base, e),
    })
}

impl Default for AzureEndpoints {
    fn default() -> Self {
        Self::public_cloud()
    }
}

/// Configuration for the Azure client
#[derive(Debug, Clone)]
pub struct AzureClientConfig {
    pub endpoints: AzureEndpoints,
    /// Timeout for one HTTP request attempt
    pub request_timeout: Duration,
    /// Timeout for one SKU catalog request attempt
    pub sku_timeout: Duration,
    /// Retries for transient failures on reads (0 disables)
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for AzureClientConfig {
    fn default() -> Self {
        Self {
            endpoints: AzureEndpoints::default(),
            request_timeout: DEFAULT_LOOKUP_TIMEOUT,
            sku_timeout: DEFAULT_SKU_TIMEOUT,
            max_retries: 0,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl AzureClientConfig {
    /// Worst-case time for one call with `per_request` attempts: every
    /// attempt plus the backoff sleeps between them. An outer timeout shorter
    /// than this would cut off the retries.
    pub fn call_budget(&self, per_request: Duration) -> Duration {
        let mut budget = per_request;
        let mut backoff = self.initial_backoff;
        for _ in 0..self.max_retries {
            budget += backoff + per_request;
            backoff = std::cmp::min(backoff * 2, self.max_backoff);
        }
        budget
    }

    /// Budget for ordinary lookups
    pub fn lookup_budget(&self) -> Duration {
        self.call_budget(self.request_timeout)
    }

    /// Budget for one SKU catalog load
    pub fn sku_budget(&self) -> Duration {
        self.call_budget(self.sku_timeout)
    }
}

type LocationCache<T> = DashMap<String, Arc<OnceCell<Vec<T>>>>;

/// REST client for one subscription
pub struct AzureClient {
    client: Client,
    config: AzureClientConfig,
    subscription_id: String,
    tokens: TokenProvider,
    vm_sizes: LocationCache<VmSizeEntry>,
    skus: LocationCache<SkuCapabilities>,
}

impl AzureClient {
    /// Create a new client for a subscription
    pub fn new(
        subscription_id: impl Into<String>,
        tokens: TokenSource,
        config: AzureClientConfig,
    ) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            config,
            subscription_id: subscription_id.into(),
            tokens: TokenProvider::new(tokens),
            vm_sizes: DashMap::new(),
            skus: DashMap::new(),
        })
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn management_url(&self, path: &str, api_version: &str) -> Result<Url> {
        let mut url = self
            .config
            .endpoints
            .management
            .join(path)
            .map_err(|e| InventoryError::InvalidInput {
                reason: format!("invalid resource path '{}': {}", path, e),
            })?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn subscription_path(&self) -> String {
        format!("/subscriptions/{}", self.subscription_id)
    }

    /// GET against Resource Manager
    async fn get<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        self.get_within(url, what, self.config.request_timeout).await
    }

    async fn get_within<T: DeserializeOwned>(
        &self,
        url: Url,
        what: &str,
        timeout: Duration,
    ) -> Result<T> {
        let audience = self.config.endpoints.management_audience.clone();
        self.send::<T, ()>(Method::GET, url, &audience, None, what, timeout)
            .await
    }

    /// Send a request, retrying transient failures with exponential backoff
    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        audience: &str,
        body: Option<&B>,
        what: &str,
        timeout: Duration,
    ) -> Result<T> {
        let mut attempt = 0u32;
        let mut backoff = self.config.initial_backoff;

        loop {
            let result = self
                .send_once(method.clone(), url.clone(), audience, body, what, timeout)
                .await;
            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.max_retries && e.is_transient() => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Retrying {}",
                        what
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.config.max_backoff);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        audience: &str,
        body: Option<&B>,
        what: &str,
        timeout: Duration,
    ) -> Result<T> {
        let token = self.tokens.token(audience).await?;
        debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .timeout(timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InventoryError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| InventoryError::decode(what, e))
    }

    /// Follow `nextLink` until the listing is exhausted
    async fn get_all<T: DeserializeOwned>(&self, first: Url, what: &str) -> Result<Vec<T>> {
        self.get_all_within(first, what, self.config.request_timeout)
            .await
    }

    async fn get_all_within<T: DeserializeOwned>(
        &self,
        first: Url,
        what: &str,
        timeout: Duration,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);

        while let Some(url) = next.take() {
            let page: wire::Page<T> = self.get_within(url, what, timeout).await?;
            items.extend(page.value);

            if let Some(link) = page.next_link {
                let url = self.config.endpoints.management.join(&link).map_err(|e| {
                    InventoryError::decode(what, format!("invalid nextLink '{}': {}", link, e))
                })?;
                next = Some(url);
            }
        }

        Ok(items)
    }

    async fn fetch_vm_sizes(&self, location: &str) -> Result<Vec<VmSizeEntry>> {
        let path = format!(
            "{}/providers/Microsoft.Compute/locations/{}/vmSizes",
            self.subscription_path(),
            location
        );
        let url = self.management_url(&path, COMPUTE_API_VERSION)?;
        let sizes: Vec<wire::VmSize> = self.get_all(url, "VM size catalog").await?;
        debug!(location = %location, sizes = sizes.len(), "Loaded VM size catalog");
        Ok(sizes.into_iter().map(VmSizeEntry::from).collect())
    }

    async fn fetch_skus(&self, location: &str) -> Result<Vec<SkuCapabilities>> {
        info!(location = %location, "Loading VM SKU catalog, this can take a minute or two");

        let path = format!("{}/providers/Microsoft.Compute/skus", self.subscription_path());
        let mut url = self.management_url(&path, SKU_API_VERSION)?;
        url.query_pairs_mut()
            .append_pair("$filter", &format!("location eq '{}'", location));

        let skus: Vec<wire::ResourceSku> = self
            .get_all_within(url, "SKU catalog", self.config.sku_timeout)
            .await?;
        Ok(skus
            .into_iter()
            .filter(wire::ResourceSku::is_virtual_machine)
            .map(SkuCapabilities::from)
            .collect())
    }
}

fn cache_cell<T>(cache: &LocationCache<T>, location: &str) -> Arc<OnceCell<Vec<T>>> {
    cache
        .entry(location.to_ascii_lowercase())
        .or_insert_with(|| Arc::new(OnceCell::new()))
        .clone()
}

/// ISO 8601 duration for a metrics bucket, e.g. `PT5M`
fn iso_interval(interval: Duration) -> String {
    let secs = interval.as_secs();
    if secs % 3600 == 0 {
        format!("PT{}H", secs / 3600)
    } else if secs % 60 == 0 {
        format!("PT{}M", secs / 60)
    } else {
        format!("PT{}S", secs)
    }
}

#[async_trait]
impl VmStore for AzureClient {
    async fn list_vms(&self, resource_group: Option<&str>) -> Result<Vec<VirtualMachineDescriptor>> {
        let path = match resource_group {
            Some(rg) => format!(
                "{}/resourceGroups/{}/providers/Microsoft.Compute/virtualMachines",
                self.subscription_path(),
                rg
            ),
            None => format!(
                "{}/providers/Microsoft.Compute/virtualMachines",
                self.subscription_path()
            ),
        };
        let url = self.management_url(&path, COMPUTE_API_VERSION)?;
        let vms: Vec<wire::VirtualMachine> = self.get_all(url, "VM list").await?;
        Ok(vms.into_iter().map(VirtualMachineDescriptor::from).collect())
    }

    async fn vm_detail(&self, vm_id: &str) -> Result<VirtualMachineDescriptor> {
        let mut url = self.management_url(vm_id, COMPUTE_API_VERSION)?;
        url.query_pairs_mut().append_pair("$expand", "instanceView");
        let vm: wire::VirtualMachine = self.get(url, "VM detail").await?;
        Ok(vm.into())
    }
}

#[async_trait]
impl SizeCatalog for AzureClient {
    async fn vm_size(&self, location: &str, size_name: &str) -> Result<Option<VmSizeEntry>> {
        let cell = cache_cell(&self.vm_sizes, location);
        let sizes = cell.get_or_try_init(|| self.fetch_vm_sizes(location)).await?;
        Ok(sizes
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(size_name))
            .cloned())
    }
}

#[async_trait]
impl SkuCatalog for AzureClient {
    async fn vm_sku(&self, location: &str, size_name: &str) -> Result<Option<SkuCapabilities>> {
        let cell = cache_cell(&self.skus, location);
        let skus = cell.get_or_try_init(|| self.fetch_skus(location)).await?;
        Ok(skus
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(size_name))
            .cloned())
    }
}

#[async_trait]
impl DiskStore for AzureClient {
    async fn disk_size_gb(&self, disk_id: &str) -> Result<Option<u64>> {
        let url = self.management_url(disk_id, DISK_API_VERSION)?;
        let disk: wire::Disk = self.get(url, "disk").await?;
        Ok(disk.properties.disk_size_gb)
    }
}

#[async_trait]
impl NetworkStore for AzureClient {
    async fn network_interface(&self, nic_id: &str) -> Result<NetworkInterface> {
        let url = self.management_url(nic_id, NETWORK_API_VERSION)?;
        let nic: wire::Nic = self.get(url, "network interface").await?;
        Ok(nic.into())
    }
}

#[async_trait]
impl MetricsService for AzureClient {
    async fn query_metrics(&self, resource_id: &str, query: &MetricQuery) -> Result<Vec<MetricSeries>> {
        let path = format!(
            "{}/providers/Microsoft.Insights/metrics",
            resource_id.trim_end_matches('/')
        );
        let mut url = self.management_url(&path, METRICS_API_VERSION)?;

        let aggregations: Vec<&str> = query.aggregations.iter().map(|a| a.as_str()).collect();
        url.query_pairs_mut()
            .append_pair("metricnames", &query.metric_names.join(","))
            .append_pair("timespan", &query.window.timespan())
            .append_pair("interval", &iso_interval(query.interval))
            .append_pair("aggregation", &aggregations.join(","));

        let response: wire::MetricsResponse = self.get(url, "metrics").await?;
        Ok(response.value.into_iter().map(MetricSeries::from).collect())
    }
}

#[derive(Serialize)]
struct LogQueryBody<'a> {
    query: &'a str,
}

#[async_trait]
impl LogQueryService for AzureClient {
    async fn resolve_workspace(&self, resource_group: &str, name: &str) -> Result<String> {
        let path = format!(
            "{}/resourceGroups/{}/providers/Microsoft.OperationalInsights/workspaces/{}",
            self.subscription_path(),
            resource_group,
            name
        );
        let url = self.management_url(&path, WORKSPACE_API_VERSION)?;
        let workspace: wire::Workspace = self.get(url, "workspace").await?;

        workspace
            .properties
            .customer_id
            .ok_or_else(|| InventoryError::NotFound {
                what: format!("customer id of workspace {}/{}", resource_group, name),
            })
    }

    async fn query(&self, workspace_id: &str, query: &str) -> Result<QueryTable> {
        let url = self
            .config
            .endpoints
            .log_analytics
            .join(&format!("v1/workspaces/{}/query", workspace_id))
            .map_err(|e| InventoryError::InvalidInput {
                reason: format!("invalid workspace id '{}': {}", workspace_id, e),
            })?;

        let audience = self.config.endpoints.log_analytics_audience.clone();
        let body = LogQueryBody { query };
        let response: wire::LogQueryResponse = self
            .send(
                Method::POST,
                url,
                &audience,
                Some(&body),
                "log query",
                self.config.request_timeout,
            )
            .await?;

        Ok(response
            .tables
            .into_iter()
            .next()
            .map(QueryTable::from)
            .unwrap_or_default())
    }
}
