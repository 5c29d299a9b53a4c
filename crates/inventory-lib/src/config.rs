//! Run configuration
//!
//! Everything that is fixed for the whole batch pass. Built once before any
//! VM is processed and shared read-only with every worker.

use crate::error::{InventoryError, Result};
use crate::models::AggregationPolicy;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use std::time::Duration;

/// Default lookback for utilization metrics (one week)
pub const DEFAULT_LOOKBACK_HOURS: u32 = 168;

/// Default number of VMs processed concurrently
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-lookup timeout
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for one SKU catalog load; a location takes minutes
pub const DEFAULT_SKU_TIMEOUT: Duration = Duration::from_secs(300);

/// Fixed-duration range ending at "now"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Window of `hours` ending at `end`
    pub fn ending_at(end: DateTime<Utc>, hours: u32) -> Self {
        Self {
            start: end - ChronoDuration::hours(i64::from(hours)),
            end,
        }
    }

    /// Window of `hours` ending now
    pub fn last_hours(hours: u32) -> Self {
        Self::ending_at(Utc::now(), hours)
    }

    /// ISO 8601 `start/end` interval used by the metrics API
    pub fn timespan(&self) -> String {
        format!(
            "{}/{}",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }

    pub fn hours(&self) -> i64 {
        (self.end - self.start).num_hours()
    }
}

/// Immutable configuration threaded into every collector call
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub subscription_id: String,
    /// Limit discovery to one resource group; whole subscription when `None`
    pub resource_group: Option<String>,
    /// Log Analytics workspace (customer) id; memory metrics skipped when `None`
    pub workspace_id: Option<String>,
    pub policy: AggregationPolicy,
    pub window: TimeWindow,
    pub lookup_timeout: Duration,
    /// Budget for the SKU catalog fallback, separate from `lookup_timeout`
    pub sku_timeout: Duration,
    pub concurrency: usize,
}

impl RunConfig {
    /// Configuration with defaults for everything but the subscription
    pub fn new(subscription_id: impl Into<String>) -> Result<Self> {
        let subscription_id = subscription_id.into();
        if subscription_id.trim().is_empty() {
            return Err(InventoryError::InvalidInput {
                reason: "subscription id is required".to_string(),
            });
        }

        Ok(Self {
            subscription_id,
            resource_group: None,
            workspace_id: None,
            policy: AggregationPolicy::default(),
            window: TimeWindow::last_hours(DEFAULT_LOOKBACK_HOURS),
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            sku_timeout: DEFAULT_SKU_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        })
    }

    pub fn with_resource_group(mut self, resource_group: Option<String>) -> Self {
        self.resource_group = resource_group;
        self
    }

    pub fn with_workspace_id(mut self, workspace_id: Option<String>) -> Self {
        self.workspace_id = workspace_id;
        self
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lookback_hours(mut self, hours: u32) -> Self {
        self.window = TimeWindow::last_hours(hours);
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn with_sku_timeout(mut self, timeout: Duration) -> Self {
        self.sku_timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("sub-1").unwrap();
        assert_eq!(config.policy, AggregationPolicy::P95);
        assert_eq!(config.window.hours(), 168);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.sku_timeout >= Duration::from_secs(180));
        assert!(config.sku_timeout > config.lookup_timeout);
        assert!(config.workspace_id.is_none());
        assert!(config.resource_group.is_none());
    }

    #[test]
    fn test_missing_subscription_rejected() {
        assert!(RunConfig::new("  ").is_err());
    }

    #[test]
    fn test_timespan_format() {
        let end = Utc.with_ymd_and_hms(2024, 3, 8, 12, 0, 0).unwrap();
        let window = TimeWindow::ending_at(end, 24);
        assert_eq!(window.timespan(), "2024-03-07T12:00:00Z/2024-03-08T12:00:00Z");
    }

    #[test]
    fn test_concurrency_floor() {
        let config = RunConfig::new("sub-1").unwrap().with_concurrency(0);
        assert_eq!(config.concurrency, 1);
    }
}
