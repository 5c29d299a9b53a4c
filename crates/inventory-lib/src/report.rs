//! Azure Migrate import CSV
//!
//! Fixed 27-column layout. Percentages and throughputs carry two decimals;
//! unknown values are empty cells. The Disk 2 throughput and IOPS columns
//! repeat the VM-aggregate disk figures also written for Disk 1.

use crate::error::Result;
use crate::models::InventoryRow;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const SERVER_TYPE: &str = "Virtual";
pub const HYPERVISOR: &str = "Hyper-V";

pub const HEADERS: [&str; 27] = [
    "Server name*",
    "IP addresses",
    "Cores*",
    "Memory (In MB)*",
    "OS name*",
    "OS version",
    "OS architecture",
    "Server type",
    "Hypervisor",
    "CPU utilization percentage",
    "Memory utilization percentage",
    "Network adapters",
    "Network In throughput",
    "Network Out throughput",
    "Boot type",
    "Number of disks",
    "Storage in use (In GB)",
    "Disk 1 size (In GB)",
    "Disk 1 read throughput (MB per second)",
    "Disk 1 write throughput (MB per second)",
    "Disk 1 read ops (operations per second)",
    "Disk 1 write ops (operations per second)",
    "Disk 2 size (In GB)",
    "Disk 2 read throughput (MB per second)",
    "Disk 2 write throughput (MB per second)",
    "Disk 2 read ops (operations per second)",
    "Disk 2 write ops (operations per second)",
];

/// Two-decimal rendering for percentages and throughputs
pub fn format_decimal(value: f64) -> String {
    format!("{:.2}", value)
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl InventoryRow {
    /// Cells in [`HEADERS`] order
    pub fn to_record(&self) -> [String; 27] {
        let io = &self.disk_io;
        [
            self.server_name.clone(),
            optional(self.ip_address.as_deref()),
            optional(self.cores),
            optional(self.memory_mb),
            optional(self.os_name.as_deref()),
            optional(self.os_version.as_deref()),
            optional(self.os_architecture.as_deref()),
            SERVER_TYPE.to_string(),
            HYPERVISOR.to_string(),
            format_decimal(self.cpu_utilization),
            optional(self.memory_utilization.map(format_decimal)),
            self.network_adapters.to_string(),
            format_decimal(self.network.in_mbps),
            format_decimal(self.network.out_mbps),
            optional(self.boot_type.map(|b| b.as_str())),
            self.disk_count.to_string(),
            optional(self.storage_in_use_gb),
            optional(self.disk1_size_gb),
            format_decimal(io.read_mbps),
            format_decimal(io.write_mbps),
            format_decimal(io.read_ops),
            format_decimal(io.write_ops),
            optional(self.disk2_size_gb),
            format_decimal(io.read_mbps),
            format_decimal(io.write_mbps),
            format_decimal(io.read_ops),
            format_decimal(io.write_ops),
        ]
    }
}

/// Write the header and one record per row
pub fn write_csv<W: Write>(writer: W, rows: &[InventoryRow]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADERS)?;
    for row in rows {
        csv.write_record(row.to_record())?;
    }
    csv.flush()?;
    Ok(())
}

/// Write the CSV to a file, creating parent directories
pub fn write_csv_file(path: &Path, rows: &[InventoryRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    write_csv(file, rows)?;
    info!(path = %path.display(), rows = rows.len(), "Wrote inventory CSV");
    Ok(())
}
