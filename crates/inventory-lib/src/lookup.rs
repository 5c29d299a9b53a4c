//! Guarded external lookups
//!
//! Each provider call made while building a row is wrapped here: it gets the
//! run's per-call timeout and any failure becomes `None` plus a log line.

use crate::error::{InventoryError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run one lookup with a timeout, degrading failures to `None`
pub async fn guarded<T, F>(operation: &str, vm: &str, timeout: Duration, lookup: F) -> Option<T>
where
    F: Future<Output = Result<T>>,
{
    match with_timeout(operation, timeout, lookup).await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(vm = %vm, error = %e, "{} failed", operation);
            None
        }
    }
}

/// Apply a timeout, reporting expiry as [`InventoryError::Timeout`]
pub async fn with_timeout<T, F>(operation: &str, timeout: Duration, lookup: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => Err(InventoryError::Timeout {
            operation: operation.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_success_passes_through() {
        let value = guarded("lookup", "vm", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(value, Some(7));
    }

    #[tokio::test]
    async fn test_error_degrades() {
        let value: Option<u32> = guarded("lookup", "vm", Duration::from_secs(1), async {
            Err(InventoryError::Api {
                status: 500,
                body: "boom".to_string(),
            })
        })
        .await;
        assert!(value.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_degrades() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(120)).await;
            Ok(1u32)
        };
        assert!(guarded("slow lookup", "vm", Duration::from_secs(5), slow).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_error_kind() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };
        let err = with_timeout("metrics query", Duration::from_secs(1), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::Timeout { .. }));
    }
}
