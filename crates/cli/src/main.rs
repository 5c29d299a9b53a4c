//! Azure Migrate VM inventory CLI
//!
//! Lists the virtual machines of a subscription, gathers sizing, disk,
//! network and utilization data for each, and writes an Azure Migrate
//! import CSV.

mod config;
mod output;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use config::{FileConfig, FlagOverrides, Settings};
use inventory_lib::config::DEFAULT_LOOKBACK_HOURS;
use inventory_lib::{
    default_log_path, init_logging, resolve_workspace, write_csv_file, AggregationPolicy,
    AzureClient, AzureClientConfig, AzureEndpoints, InventoryRunBuilder, Providers, RunConfig,
    RunLogger, TokenSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

/// Azure VM inventory exporter
#[derive(Parser, Debug)]
#[command(name = "azmig-inventory")]
#[command(author, version, about = "Export Azure VM inventory as an Azure Migrate import CSV", long_about = None)]
pub struct Cli {
    /// Subscription to inventory
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: String,

    /// Only inventory VMs in this resource group
    #[arg(long, short = 'g')]
    pub resource_group: Option<String>,

    /// Log Analytics workspace used for memory utilization
    #[arg(long, requires = "workspace_resource_group")]
    pub workspace_name: Option<String>,

    /// Resource group of the Log Analytics workspace
    #[arg(long, requires = "workspace_name")]
    pub workspace_resource_group: Option<String>,

    /// Output CSV path
    #[arg(long, short, default_value = "azure_migrate_vm_inventory.csv")]
    pub output: PathBuf,

    /// Hours of utilization history to reduce
    #[arg(long, default_value_t = DEFAULT_LOOKBACK_HOURS)]
    pub lookback_hours: u32,

    /// Utilization aggregation: Average, Max or P95
    #[arg(long, short, default_value = "P95")]
    pub aggregation: AggregationPolicy,

    /// Number of VMs processed at once [default: 4]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Timeout for each API request, in seconds [default: 60]
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Timeout for each SKU catalog request, in seconds [default: 300]
    #[arg(long)]
    pub sku_timeout_secs: Option<u64>,

    /// Retries for throttled or unavailable API calls [default: 0]
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Bearer token to use instead of the Azure CLI
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Resource Manager endpoint (sovereign clouds)
    #[arg(long)]
    pub management_endpoint: Option<String>,

    /// Log Analytics query endpoint (sovereign clouds)
    #[arg(long)]
    pub log_analytics_endpoint: Option<String>,

    /// Run log path [default: next to the CSV]
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Config file [default: ~/.config/azmig/config.json]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    pub verbose: bool,
}

impl Cli {
    fn overrides(&self) -> FlagOverrides {
        FlagOverrides {
            concurrency: self.concurrency,
            timeout_secs: self.timeout_secs,
            sku_timeout_secs: self.sku_timeout_secs,
            max_retries: self.max_retries,
            management_endpoint: self.management_endpoint.clone(),
            log_analytics_endpoint: self.log_analytics_endpoint.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| default_log_path(&cli.output, Local::now()));
    init_logging(Some(&log_path), cli.verbose).context("Failed to initialize logging")?;

    if let Err(e) = run(&cli, &log_path).await {
        error!(error = %format!("{:#}", e), "Inventory failed");
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

async fn run(cli: &Cli, log_path: &std::path::Path) -> Result<()> {
    let file_config = FileConfig::load(cli.config.as_deref())?;
    let settings = Settings::resolve(cli.overrides(), file_config);

    let endpoints = AzureEndpoints::with_overrides(
        settings.management_endpoint.as_deref(),
        settings.log_analytics_endpoint.as_deref(),
    )?;
    let tokens = match &cli.access_token {
        Some(token) => TokenSource::Static(token.clone()),
        None => TokenSource::AzureCli,
    };
    let client_config = AzureClientConfig {
        endpoints,
        request_timeout: settings.timeout,
        sku_timeout: settings.sku_timeout,
        max_retries: settings.max_retries,
        ..Default::default()
    };
    // Lookup guards must outlast every retry of the request they wrap
    let lookup_timeout = client_config.lookup_budget();
    let sku_timeout = client_config.sku_budget();
    let client = AzureClient::new(cli.subscription_id.clone(), tokens, client_config)
        .context("Failed to create Azure client")?;
    let providers = Providers::from_client(Arc::new(client));

    let workspace_id = match (&cli.workspace_resource_group, &cli.workspace_name) {
        (Some(resource_group), Some(name)) => {
            resolve_workspace(providers.logs.as_ref(), resource_group, name, lookup_timeout)
                .await
        }
        _ => {
            output::print_info("No Log Analytics workspace given, memory utilization will be empty");
            None
        }
    };

    let config = RunConfig::new(cli.subscription_id.clone())?
        .with_resource_group(cli.resource_group.clone())
        .with_workspace_id(workspace_id)
        .with_policy(cli.aggregation)
        .with_lookback_hours(cli.lookback_hours)
        .with_lookup_timeout(lookup_timeout)
        .with_sku_timeout(sku_timeout)
        .with_concurrency(settings.concurrency);

    let logger = RunLogger::new(&cli.subscription_id);
    logger.log_startup(&config, &cli.output);

    let run = InventoryRunBuilder::new()
        .providers(providers)
        .config(config)
        .build()?;
    let report = run.run().await.context("Failed to list virtual machines")?;

    write_csv_file(&cli.output, &report.rows)
        .with_context(|| format!("Failed to write {}", cli.output.display()))?;
    logger.log_summary(&report, report.rows.len());

    output::print_summary(&report, &cli.output, log_path);
    Ok(())
}
