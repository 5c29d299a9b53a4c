//! Bearer token acquisition

use super::wire::CliAccessToken;
use crate::error::{InventoryError, Result};
use dashmap::DashMap;
use tokio::process::Command;
use tracing::debug;

/// Where access tokens come from
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A pre-issued token used for every audience
    Static(String),
    /// `az account get-access-token`, once per audience
    AzureCli,
}

/// Token source with a per-audience cache
#[derive(Debug)]
pub(crate) struct TokenProvider {
    source: TokenSource,
    cache: DashMap<String, String>,
}

impl TokenProvider {
    pub(crate) fn new(source: TokenSource) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    pub(crate) async fn token(&self, audience: &str) -> Result<String> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        if let Some(token) = self.cache.get(audience) {
            return Ok(token.clone());
        }

        let token = azure_cli_token(audience).await?;
        self.cache.insert(audience.to_string(), token.clone());
        Ok(token)
    }
}

async fn azure_cli_token(audience: &str) -> Result<String> {
    debug!(audience = %audience, "Requesting access token from Azure CLI");

    let output = Command::new("az")
        .args(["account", "get-access-token", "--resource", audience, "--output", "json"])
        .output()
        .await
        .map_err(|e| InventoryError::Auth {
            reason: format!("failed to run Azure CLI: {}", e),
        })?;

    if !output.status.success() {
        return Err(InventoryError::Auth {
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let parsed: CliAccessToken = serde_json::from_slice(&output.stdout)
        .map_err(|e| InventoryError::decode("Azure CLI access token", e))?;
    Ok(parsed.access_token)
}
