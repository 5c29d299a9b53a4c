//! Output formatting utilities

use colored::Colorize;
use inventory_lib::{InventoryReport, InventoryRow};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// One line of the end-of-run summary table
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct SummaryLine {
    #[tabled(rename = "Item")]
    pub item: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl SummaryLine {
    fn new(item: &str, value: impl ToString) -> Self {
        Self {
            item: item.to_string(),
            value: value.to_string(),
        }
    }
}

/// Per-VM line of the terminal table
#[derive(Debug, Clone, PartialEq, Tabled)]
pub struct VmLine {
    #[tabled(rename = "Server")]
    pub server: String,
    #[tabled(rename = "IP")]
    pub ip: String,
    #[tabled(rename = "Cores")]
    pub cores: String,
    #[tabled(rename = "Memory MB")]
    pub memory_mb: String,
    #[tabled(rename = "CPU %")]
    pub cpu: String,
    #[tabled(rename = "Memory %")]
    pub memory: String,
    #[tabled(rename = "Disks")]
    pub disks: usize,
}

impl From<&InventoryRow> for VmLine {
    fn from(row: &InventoryRow) -> Self {
        let or_dash = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
        Self {
            server: row.server_name.clone(),
            ip: or_dash(row.ip_address.clone()),
            cores: or_dash(row.cores.map(|c| c.to_string())),
            memory_mb: or_dash(row.memory_mb.map(|m| m.to_string())),
            cpu: format!("{:.2}", row.cpu_utilization),
            memory: or_dash(row.memory_utilization.map(|m| format!("{:.2}", m))),
            disks: row.disk_count,
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format elapsed seconds as `1m 05s` or `12.3s`
pub fn format_elapsed(secs: f64) -> String {
    if secs >= 60.0 {
        let whole = secs.round() as u64;
        format!("{}m {:02}s", whole / 60, whole % 60)
    } else {
        format!("{:.1}s", secs)
    }
}

pub fn summary_lines(report: &InventoryReport, csv: &Path, log: &Path) -> Vec<SummaryLine> {
    let with_ip = report.rows.iter().filter(|r| r.ip_address.is_some()).count();

    vec![
        SummaryLine::new("Virtual machines", report.rows.len()),
        SummaryLine::new("Unresolved sizes", report.unresolved_sizes()),
        SummaryLine::new("Without memory data", report.without_memory_utilization()),
        SummaryLine::new("With IP address", with_ip),
        SummaryLine::new("Elapsed", format_elapsed(report.elapsed.as_secs_f64())),
        SummaryLine::new("CSV", csv.display()),
        SummaryLine::new("Log", log.display()),
    ]
}

/// Print the end-of-run summary
pub fn print_summary(report: &InventoryReport, csv: &Path, log: &Path) {
    if report.rows.is_empty() {
        print_warning("No virtual machines found, wrote header-only CSV");
    } else {
        print_success(&format!(
            "Wrote {} VM rows to {}",
            report.rows.len(),
            csv.display()
        ));
    }

    if !report.rows.is_empty() {
        let lines: Vec<VmLine> = report.rows.iter().map(VmLine::from).collect();
        println!("{}", Table::new(lines).with(Style::rounded()));
    }

    let table = Table::new(summary_lines(report, csv, log))
        .with(Style::rounded())
        .to_string();
    println!("{}", table);

    let unresolved: Vec<&str> = report
        .rows
        .iter()
        .filter(|r| r.cores.is_none() || r.memory_mb.is_none())
        .map(|r| r.server_name.as_str())
        .collect();
    if !unresolved.is_empty() {
        print_warning(&format!(
            "Cores or memory unknown for: {}",
            unresolved.join(", ").yellow()
        ));
    }
}
