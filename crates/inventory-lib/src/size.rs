//! VM size resolution
//!
//! Cores and memory for a size label come from the fast per-location size
//! catalog. That catalog lags behind newly released sizes, so on a miss the
//! SKU catalog is consulted instead. The SKU catalog is much slower (minutes
//! per location) and is never queried when the fast path answers.

use crate::lookup::guarded;
use crate::models::SizeProfile;
use crate::provider::{SizeCatalog, SkuCapabilities, SkuCatalog};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

const SKU_VCPUS: &str = "vCPUs";
const SKU_MEMORY_GB: &str = "MemoryGB";

/// Resolves size labels to [`SizeProfile`]s, caching per run
pub struct SizeResolver {
    sizes: Arc<dyn SizeCatalog>,
    skus: Arc<dyn SkuCatalog>,
    timeout: Duration,
    sku_timeout: Duration,
    /// (location, size label) -> profile, filled once per key
    cache: DashMap<(String, String), Arc<OnceCell<SizeProfile>>>,
}

impl SizeResolver {
    /// `timeout` bounds the size catalog call, `sku_timeout` the SKU fallback
    pub fn new(
        sizes: Arc<dyn SizeCatalog>,
        skus: Arc<dyn SkuCatalog>,
        timeout: Duration,
        sku_timeout: Duration,
    ) -> Self {
        Self {
            sizes,
            skus,
            timeout,
            sku_timeout,
            cache: DashMap::new(),
        }
    }

    /// Resolve a size label in a location. Never fails; unknown on any error.
    ///
    /// Concurrent callers for the same label wait on a single lookup.
    pub async fn resolve(&self, size_label: &str, location: &str) -> SizeProfile {
        let key = (location.to_ascii_lowercase(), size_label.to_ascii_lowercase());
        let cell = self
            .cache
            .entry(key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        *cell
            .get_or_init(|| self.resolve_uncached(size_label, location))
            .await
    }

    async fn resolve_uncached(&self, size_label: &str, location: &str) -> SizeProfile {
        if size_label.is_empty() {
            return SizeProfile::unknown();
        }

        let entry = guarded(
            "Size catalog lookup",
            size_label,
            self.timeout,
            self.sizes.vm_size(location, size_label),
        )
        .await
        .flatten();

        if let Some((cores, memory_mb)) = entry.and_then(|e| e.cores.zip(e.memory_mb)) {
            return SizeProfile::known(cores, memory_mb);
        }

        debug!(
            size = %size_label,
            location = %location,
            "Size not in size catalog, falling back to SKU catalog"
        );

        guarded(
            "SKU catalog lookup",
            size_label,
            self.sku_timeout,
            self.skus.vm_sku(location, size_label),
        )
        .await
        .flatten()
        .map(|sku| profile_from_sku(&sku))
        .unwrap_or_else(SizeProfile::unknown)
    }
}

/// Read vCPUs and MemoryGB capabilities; both must parse
fn profile_from_sku(sku: &SkuCapabilities) -> SizeProfile {
    let cores = sku.get(SKU_VCPUS).and_then(|v| v.trim().parse::<u32>().ok());
    let memory_mb = sku
        .get(SKU_MEMORY_GB)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|gb| gb.is_finite() && *gb >= 0.0)
        .map(|gb| (gb * 1024.0) as u64);

    match (cores, memory_mb) {
        (Some(cores), Some(memory_mb)) => SizeProfile::known(cores, memory_mb),
        _ => SizeProfile::unknown(),
    }
}
