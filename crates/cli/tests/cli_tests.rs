//! CLI integration tests

use std::process::Command;

fn cli(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "azmig-cli", "--"])
        .args(args)
        .env_remove("AZURE_SUBSCRIPTION_ID")
        .env_remove("AZURE_ACCESS_TOKEN")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = cli(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Azure Migrate import CSV"),
        "Should describe the tool"
    );
    assert!(stdout.contains("--subscription-id"), "Should show subscription option");
    assert!(stdout.contains("AZURE_SUBSCRIPTION_ID"), "Should show env var");
    assert!(stdout.contains("--workspace-name"), "Should show workspace option");
    assert!(stdout.contains("--aggregation"), "Should show aggregation option");
    assert!(stdout.contains("--lookback-hours"), "Should show lookback option");
    assert!(stdout.contains("--output"), "Should show output option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = cli(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("azmig-inventory"), "Should show binary name");
}

/// Test missing subscription error handling
#[test]
fn test_missing_subscription() {
    let output = cli(&[]);

    assert!(!output.status.success(), "Missing subscription should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("--subscription-id"),
        "Should name the missing option"
    );
}

/// Test invalid aggregation error handling
#[test]
fn test_invalid_aggregation() {
    let output = cli(&["--subscription-id", "sub-1", "--aggregation", "median"]);

    assert!(!output.status.success(), "Unknown aggregation should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("median"), "Should echo the bad value");
}

/// Test workspace name without resource group
#[test]
fn test_workspace_requires_resource_group() {
    let output = cli(&["--subscription-id", "sub-1", "--workspace-name", "law-01"]);

    assert!(!output.status.success(), "Incomplete workspace should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("--workspace-resource-group"),
        "Should name the missing option"
    );
}
