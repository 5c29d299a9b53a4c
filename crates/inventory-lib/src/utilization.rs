//! Utilization collection
//!
//! CPU, network and disk I/O come from provider metrics sampled in 5 minute
//! buckets. Memory comes from a log-analytics workspace, first from the
//! pre-aggregated insights table and then from raw performance counters.
//!
//! Failed or empty metric queries reduce to `0.0`. Memory without data is
//! `None` and renders as an empty cell.

use crate::config::RunConfig;
use crate::lookup::guarded;
use crate::models::{
    AggregationPolicy, DiskThroughput, NetworkThroughput, OsFamily, VirtualMachineDescriptor,
};
use crate::provider::{LogQueryService, MetricAggregation, MetricQuery, MetricSeries, MetricsService};
use crate::reducer::reduce_samples;
use chrono::SecondsFormat;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub const CPU_METRIC: &str = "Percentage CPU";
pub const NETWORK_IN_METRIC: &str = "Network In Total";
pub const NETWORK_OUT_METRIC: &str = "Network Out Total";
pub const DISK_READ_BYTES_METRIC: &str = "Disk Read Bytes";
pub const DISK_WRITE_BYTES_METRIC: &str = "Disk Write Bytes";
pub const DISK_READ_OPS_METRIC: &str = "Disk Read Operations/Sec";
pub const DISK_WRITE_OPS_METRIC: &str = "Disk Write Operations/Sec";

/// Metrics bucket size
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(300);

const BYTES_PER_MB: f64 = 1_048_576.0;

const WINDOWS_MEMORY_COUNTER: &str = "% Committed Bytes In Use";
const LINUX_MEMORY_COUNTER: &str = "% Used Memory";

/// All utilization figures for one VM
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Utilization {
    pub cpu_percent: f64,
    pub memory_percent: Option<f64>,
    pub network: NetworkThroughput,
    pub disk_io: DiskThroughput,
}

pub struct UtilizationCollector {
    metrics: Arc<dyn MetricsService>,
    logs: Arc<dyn LogQueryService>,
    config: Arc<RunConfig>,
}

impl UtilizationCollector {
    pub fn new(
        metrics: Arc<dyn MetricsService>,
        logs: Arc<dyn LogQueryService>,
        config: Arc<RunConfig>,
    ) -> Self {
        Self {
            metrics,
            logs,
            config,
        }
    }

    /// Collect every figure, querying concurrently
    pub async fn collect(&self, vm: &VirtualMachineDescriptor) -> Utilization {
        let (cpu_percent, memory_percent, network, disk_io) = tokio::join!(
            self.collect_cpu(vm),
            self.collect_memory(vm),
            self.collect_network(vm),
            self.collect_disk_io(vm),
        );

        Utilization {
            cpu_percent,
            memory_percent,
            network,
            disk_io,
        }
    }

    /// CPU percentage. Max reduces the per-bucket maxima; Average and P95
    /// reduce the per-bucket averages.
    pub async fn collect_cpu(&self, vm: &VirtualMachineDescriptor) -> f64 {
        let series = self
            .query(
                vm,
                "CPU metrics query",
                &[CPU_METRIC],
                vec![MetricAggregation::Average, MetricAggregation::Maximum],
            )
            .await;

        reduce_by_policy(find_series(&series, CPU_METRIC), self.config.policy)
    }

    /// Network throughput in MB/s, always averaged
    pub async fn collect_network(&self, vm: &VirtualMachineDescriptor) -> NetworkThroughput {
        let series = self
            .query(
                vm,
                "Network metrics query",
                &[NETWORK_IN_METRIC, NETWORK_OUT_METRIC],
                vec![MetricAggregation::Total],
            )
            .await;

        let per_second = |name: &str| {
            let bytes_per_bucket = find_series(&series, name)
                .map(|s| reduce_samples(&s.samples(MetricAggregation::Total), AggregationPolicy::Average))
                .unwrap_or(0.0);
            bytes_per_bucket / BYTES_PER_MB / SAMPLE_INTERVAL.as_secs_f64()
        };

        NetworkThroughput {
            in_mbps: per_second(NETWORK_IN_METRIC),
            out_mbps: per_second(NETWORK_OUT_METRIC),
        }
    }

    /// VM-aggregate disk throughput (MB) and operations, one combined query
    pub async fn collect_disk_io(&self, vm: &VirtualMachineDescriptor) -> DiskThroughput {
        let series = self
            .query(
                vm,
                "Disk metrics query",
                &[
                    DISK_READ_BYTES_METRIC,
                    DISK_WRITE_BYTES_METRIC,
                    DISK_READ_OPS_METRIC,
                    DISK_WRITE_OPS_METRIC,
                ],
                vec![MetricAggregation::Average, MetricAggregation::Maximum],
            )
            .await;

        let reduced = |name: &str| reduce_by_policy(find_series(&series, name), self.config.policy);

        DiskThroughput {
            read_mbps: reduced(DISK_READ_BYTES_METRIC) / BYTES_PER_MB,
            write_mbps: reduced(DISK_WRITE_BYTES_METRIC) / BYTES_PER_MB,
            read_ops: reduced(DISK_READ_OPS_METRIC),
            write_ops: reduced(DISK_WRITE_OPS_METRIC),
        }
    }

    /// Memory percentage from the workspace, `None` without a workspace or data
    pub async fn collect_memory(&self, vm: &VirtualMachineDescriptor) -> Option<f64> {
        let workspace = self.config.workspace_id.as_deref()?;
        let column = self.config.policy.memory_column();

        let insights = insights_query(vm, &self.config);
        if let Some(value) = self.query_memory(vm, workspace, "Insights memory query", &insights, column).await {
            return Some(value);
        }

        debug!(vm = %vm.name, "No insights memory data, falling back to performance counters");
        let perf = perf_query(vm, &self.config);
        let value = self.query_memory(vm, workspace, "Perf memory query", &perf, column).await;
        if value.is_none() {
            debug!(vm = %vm.name, "No memory utilization data in workspace");
        }
        value
    }

    async fn query_memory(
        &self,
        vm: &VirtualMachineDescriptor,
        workspace: &str,
        operation: &str,
        kql: &str,
        column: usize,
    ) -> Option<f64> {
        let table = guarded(
            operation,
            &vm.name,
            self.config.lookup_timeout,
            self.logs.query(workspace, kql),
        )
        .await?;

        table.rows.first()?.get(column).and_then(json_number)
    }

    async fn query(
        &self,
        vm: &VirtualMachineDescriptor,
        operation: &str,
        names: &[&str],
        aggregations: Vec<MetricAggregation>,
    ) -> Vec<MetricSeries> {
        let query = MetricQuery {
            metric_names: names.iter().map(|n| n.to_string()).collect(),
            window: self.config.window,
            interval: SAMPLE_INTERVAL,
            aggregations,
        };

        guarded(
            operation,
            &vm.name,
            self.config.lookup_timeout,
            self.metrics.query_metrics(&vm.id, &query),
        )
        .await
        .unwrap_or_default()
    }
}

fn find_series<'a>(series: &'a [MetricSeries], name: &str) -> Option<&'a MetricSeries> {
    series.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

fn reduce_by_policy(series: Option<&MetricSeries>, policy: AggregationPolicy) -> f64 {
    let Some(series) = series else {
        return 0.0;
    };

    let aggregation = match policy {
        AggregationPolicy::Max => MetricAggregation::Maximum,
        AggregationPolicy::Average | AggregationPolicy::P95 => MetricAggregation::Average,
    };
    reduce_samples(&series.samples(aggregation), policy)
}

fn json_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn kql_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn kql_window(config: &RunConfig) -> String {
    format!(
        "TimeGenerated between (datetime({}) .. datetime({}))",
        config.window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        config.window.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Used memory as a percentage of the declared total, from VM insights
fn insights_query(vm: &VirtualMachineDescriptor, config: &RunConfig) -> String {
    format!(
        "InsightsMetrics\n\
         | where {}\n\
         | where _ResourceId =~ {}\n\
         | where Namespace == 'Memory' and Name == 'AvailableMB'\n\
         | extend TotalMB = todouble(parse_json(Tags)['vm.azm.ms/memorySizeMB'])\n\
         | where TotalMB > 0\n\
         | extend UsedPct = (TotalMB - Val) / TotalMB * 100.0\n\
         | summarize AvgPct = avg(UsedPct), P95Pct = percentile(UsedPct, 95), MaxPct = max(UsedPct)",
        kql_window(config),
        kql_string(&vm.id)
    )
}

/// Memory counter from the raw performance table
fn perf_query(vm: &VirtualMachineDescriptor, config: &RunConfig) -> String {
    let counter = match vm.os_family {
        OsFamily::Windows => WINDOWS_MEMORY_COUNTER,
        OsFamily::Linux | OsFamily::Unknown => LINUX_MEMORY_COUNTER,
    };

    format!(
        "Perf\n\
         | where {}\n\
         | where _ResourceId =~ {}\n\
         | where ObjectName == 'Memory' and CounterName == {}\n\
         | summarize AvgPct = avg(CounterValue), P95Pct = percentile(CounterValue, 95), MaxPct = max(CounterValue)",
        kql_window(config),
        kql_string(&vm.id),
        kql_string(counter)
    )
}
