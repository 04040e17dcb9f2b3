//! Sentinel-2 rules.
//!
//! Datastrip products (`*_DS`) expect one product per datatake. Tile and
//! true-colour products (`*_TL`, `*_TC`) expect one product per tile,
//! which requires a tile lookup memoized on the datatake.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{CompletenessError, Result};
use crate::expected::ExpectedTable;
use crate::models::{ComputeKey, Datatake, ExpectedKind, ExpectedValue, Mission, ProductEvent};
use crate::tiles::TileLookup;

/// Datastrip types whose arrival triggers the tile lookup.
pub const TILE_REFERENCE_TYPES: [&str; 2] = ["MSI_L1C_DS", "MSI_L2A_DS"];

/// Types whose expectation is the datatake's tile count, in expansion order.
pub const TILE_DEPENDENT_TYPES: [&str; 4] = ["MSI_L1C_TL", "MSI_L1C_TC", "MSI_L2A_TL", "MSI_L2A_TC"];

#[derive(Clone)]
pub struct S2Rules {
    table: Arc<ExpectedTable>,
    tiles: Option<Arc<dyn TileLookup>>,
    service_type: Option<String>,
}

impl std::fmt::Debug for S2Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S2Rules")
            .field("table", &self.table)
            .field("tiles", &self.tiles.is_some())
            .field("service_type", &self.service_type)
            .finish()
    }
}

impl S2Rules {
    pub fn new(table: Arc<ExpectedTable>, tiles: Option<Arc<dyn TileLookup>>) -> Self {
        Self {
            table,
            tiles,
            service_type: None,
        }
    }

    pub fn with_service_type(mut self, service_type: Option<String>) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn service_type(&self) -> Option<&str> {
        self.service_type.as_deref()
    }

    pub fn derive_compute_key(&self, product: &ProductEvent) -> Option<ComputeKey> {
        let product_type = product.product_type.as_deref()?;
        if !product_type.starts_with("MSI_") {
            debug!(product = %product.name, product_type, "not an MSI product type");
            return None;
        }
        Some(ComputeKey::new(
            Mission::S2,
            product.satellite_unit.as_deref()?,
            product.datatake_id.as_deref()?,
            product_type,
        ))
    }

    pub fn is_tile_dependent(product_type: &str) -> bool {
        TILE_DEPENDENT_TYPES.contains(&product_type)
    }

    pub fn expected_value(&self, datatake: &Datatake, product_type: &str) -> Option<ExpectedValue> {
        if Self::is_tile_dependent(product_type) {
            return datatake
                .expected_tiles
                .get()
                .map(|n| ExpectedValue::tiles(i64::from(n)));
        }
        self.table.get(product_type)
    }

    pub fn observed_kind(&self) -> ExpectedKind {
        ExpectedKind::Count
    }

    /// Resolve the tile memo if it is not already positive.
    ///
    /// Returns `true` when this call produced a positive count. Without a
    /// configured lookup the memo is left untouched.
    pub async fn ensure_tiles(&self, datatake: &mut Datatake) -> Result<bool> {
        if datatake.expected_tiles.is_resolved() {
            return Ok(false);
        }
        let Some(lookup) = &self.tiles else {
            debug!(datatake = %datatake.datatake_id, "no tile lookup configured");
            return Ok(false);
        };
        let tiles = lookup
            .search_expected_tiles(datatake)
            .await
            .map_err(|e| CompletenessError::tile_lookup(&datatake.datatake_id, e))?;
        let count = tiles.iter().collect::<BTreeSet<_>>().len();
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        datatake.expected_tiles.memoize(count);
        info!(datatake = %datatake.datatake_id, tiles = count, "memoized expected tiles");
        Ok(count > 0)
    }

    /// Tile-dependent types must see the memo before their expectation is read.
    pub async fn prepare_expected(&self, datatake: &mut Datatake, product_type: &str) -> Result<()> {
        if Self::is_tile_dependent(product_type) {
            self.ensure_tiles(datatake).await?;
        }
        Ok(())
    }

    /// A datastrip reference product fans out to the four tile-dependent
    /// types once, when it resolves the tile memo.
    pub async fn impacted_keys(
        &self,
        key: &ComputeKey,
        datatake: Option<&mut Datatake>,
    ) -> Result<Vec<ComputeKey>> {
        if !TILE_REFERENCE_TYPES.contains(&key.product_type.as_str()) {
            return Ok(Vec::new());
        }
        let Some(datatake) = datatake else {
            return Ok(Vec::new());
        };
        if !self.ensure_tiles(datatake).await? {
            return Ok(Vec::new());
        }
        Ok(TILE_DEPENDENT_TYPES
            .iter()
            .map(|pt| key.for_product_type(*pt))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
        tiles: Vec<String>,
    }

    #[async_trait]
    impl TileLookup for CountingLookup {
        async fn search_expected_tiles(&self, _datatake: &Datatake) -> anyhow::Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tiles.clone())
        }
    }

    struct FailingLookup;

    #[async_trait]
    impl TileLookup for FailingLookup {
        async fn search_expected_tiles(&self, _datatake: &Datatake) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("catalogue unavailable")
        }
    }

    fn lookup(tiles: &[&str]) -> Arc<CountingLookup> {
        Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
            tiles: tiles.iter().map(|t| t.to_string()).collect(),
        })
    }

    fn rules(lookup: Arc<CountingLookup>) -> S2Rules {
        let lookup: Arc<dyn TileLookup> = lookup;
        S2Rules::new(Arc::new(ExpectedTable::s2_defaults()), Some(lookup))
    }

    fn datatake() -> Datatake {
        let mut dt = Datatake::new("S2A", "S2A-36678-7");
        dt.expected_tiles.memoize(0);
        dt
    }

    #[tokio::test]
    async fn datastrip_fans_out_to_tile_types_once() {
        let lookup = lookup(&["T31TCJ"]);
        let rules = rules(lookup.clone());
        let mut dt = datatake();
        let key = ComputeKey::new(Mission::S2, "S2A", "S2A-36678-7", "MSI_L1C_DS");

        let impacted = rules.impacted_keys(&key, Some(&mut dt)).await.unwrap();
        let types: Vec<&str> = impacted.iter().map(|k| k.product_type.as_str()).collect();
        assert_eq!(types, vec!["MSI_L1C_TL", "MSI_L1C_TC", "MSI_L2A_TL", "MSI_L2A_TC"]);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(dt.expected_tiles.get(), Some(1));

        let again = ComputeKey::new(Mission::S2, "S2A", "S2A-36678-7", "MSI_L2A_DS");
        assert!(rules.impacted_keys(&again, Some(&mut dt)).await.unwrap().is_empty());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_lookup_emits_nothing_and_stays_unresolved() {
        let lookup = lookup(&[]);
        let rules = rules(lookup.clone());
        let mut dt = datatake();
        let key = ComputeKey::new(Mission::S2, "S2A", "S2A-36678-7", "MSI_L1C_DS");

        assert!(rules.impacted_keys(&key, Some(&mut dt)).await.unwrap().is_empty());
        assert_eq!(dt.expected_tiles.get(), Some(0));
        assert!(!dt.expected_tiles.is_resolved());
    }

    #[tokio::test]
    async fn duplicate_tiles_are_counted_once() {
        let lookup = lookup(&["T31TCJ", "T31TCH", "T31TCJ"]);
        let rules = rules(lookup);
        let mut dt = datatake();
        assert!(rules.ensure_tiles(&mut dt).await.unwrap());
        assert_eq!(dt.expected_tiles.get(), Some(2));
    }

    #[tokio::test]
    async fn tile_types_read_the_memo() {
        let rules = rules(lookup(&["T1", "T2", "T3"]));
        let mut dt = datatake();
        rules.prepare_expected(&mut dt, "MSI_L2A_TC").await.unwrap();
        assert_eq!(rules.expected_value(&dt, "MSI_L2A_TC"), Some(ExpectedValue::tiles(3)));
        assert_eq!(rules.expected_value(&dt, "MSI_L1C_DS"), Some(ExpectedValue::count(1)));
        assert_eq!(rules.expected_value(&dt, "MSI_L1C_GR"), None);
    }

    #[tokio::test]
    async fn lookup_failure_is_reported() {
        let failing: Arc<dyn TileLookup> = Arc::new(FailingLookup);
        let rules = S2Rules::new(Arc::new(ExpectedTable::s2_defaults()), Some(failing));
        let mut dt = datatake();
        let err = rules.ensure_tiles(&mut dt).await.unwrap_err();
        assert!(matches!(err, CompletenessError::TileLookup { ref datatake_id, .. } if datatake_id == "S2A-36678-7"));
        assert_eq!(dt.expected_tiles.get(), Some(0));
    }

    #[test]
    fn only_msi_products_are_keyed() {
        let rules = rules(lookup(&[]));
        let mut event = ProductEvent {
            name: "S2A_MSIL1C_20240101".into(),
            satellite_unit: Some("S2A".into()),
            datatake_id: Some("S2A-36678-7".into()),
            product_type: Some("MSI_L1C_TL".into()),
            ..Default::default()
        };
        assert_eq!(
            rules.derive_compute_key(&event).map(|k| k.record_id()),
            Some("S2A-36678-7#MSI_L1C_TL".to_string())
        );
        event.product_type = Some("AUX_ECMWFD".into());
        assert!(rules.derive_compute_key(&event).is_none());
    }
}
