//! Azure VM inventory library
//!
//! This crate provides the core functionality for:
//! - Discovering the virtual machines of a subscription
//! - Resolving VM size, disks, boot type and network details
//! - Reducing Azure Monitor and Log Analytics utilization series
//! - Writing the Azure Migrate import CSV

pub mod config;
pub mod detail;
pub mod disks;
pub mod error;
pub mod inventory;
pub mod lookup;
pub mod models;
pub mod observability;
pub mod provider;
pub mod reducer;
pub mod report;
pub mod row;
pub mod size;
pub mod utilization;

#[cfg(test)]
mod testing;

pub use config::{RunConfig, TimeWindow};
pub use error::{InventoryError, Result};
pub use inventory::{resolve_workspace, InventoryReport, InventoryRun, InventoryRunBuilder};
pub use models::*;
pub use observability::{default_log_path, init_logging, RunLogger};
pub use provider::{AzureClient, AzureClientConfig, AzureEndpoints, Providers, TokenSource};
pub use report::{write_csv, write_csv_file, HEADERS};
