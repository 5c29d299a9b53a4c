//! Logging for inventory runs
//!
//! Provides:
//! - A `tracing` subscriber writing to stderr and, optionally, a run log file
//! - The log-file line format `[YYYY-MM-DD HH:MM:SS] [LEVEL] message key=value`
//! - Start and end-of-run events with consistent fields

use crate::config::RunConfig;
use crate::error::{InventoryError, Result};
use crate::inventory::InventoryReport;
use chrono::{DateTime, Local};
use std::fmt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILE_PREFIX: &str = "azure_migrate_vm_inventory_";

/// Event formatter for the run log file
#[derive(Debug, Clone, Copy, Default)]
pub struct LogLineFormat;

/// Level label used in the log file. TRACE folds into DEBUG.
pub fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        Level::INFO => "INFO",
        Level::DEBUG | Level::TRACE => "DEBUG",
    }
}

impl<S, N> FormatEvent<S, N> for LogLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "[{}] [{}] ",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level_label(event.metadata().level())
        )?;
        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Log file next to the CSV, named after the start time
pub fn default_log_path(output: &Path, started: DateTime<Local>) -> PathBuf {
    let file_name = format!("{}{}.log", LOG_FILE_PREFIX, started.format("%Y%m%d_%H%M%S"));
    match output.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.
pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .event_format(LogLineFormat)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| InventoryError::Logging(e.to_string()))
}

/// Run-level log events
#[derive(Clone)]
pub struct RunLogger {
    subscription_id: String,
}

impl RunLogger {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }

    /// Log the parameters a run starts with
    pub fn log_startup(&self, config: &RunConfig, output: &Path) {
        info!(
            event = "run_started",
            subscription = %self.subscription_id,
            resource_group = %config.resource_group.as_deref().unwrap_or("(all)"),
            aggregation = %config.policy,
            window = %config.window.timespan(),
            workers = config.concurrency,
            timeout_secs = config.lookup_timeout.as_secs(),
            sku_timeout_secs = config.sku_timeout.as_secs(),
            memory_metrics = config.workspace_id.is_some(),
            output = %output.display(),
            "Starting Azure VM inventory"
        );
    }

    /// Log the end-of-run summary
    pub fn log_summary(&self, report: &InventoryReport, rows_written: usize) {
        let unresolved = report.unresolved_sizes();
        let without_memory = report.without_memory_utilization();

        info!(
            event = "run_completed",
            subscription = %self.subscription_id,
            vms = report.rows.len(),
            rows_written = rows_written,
            unresolved_sizes = unresolved,
            without_memory = without_memory,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "Inventory completed"
        );

        if unresolved > 0 {
            warn!(
                event = "run_degraded",
                subscription = %self.subscription_id,
                unresolved_sizes = unresolved,
                "Some VMs have no cores or memory, fill them in before import"
            );
        }
    }
}
