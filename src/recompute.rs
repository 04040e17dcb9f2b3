//! On-demand recomputation.
//!
//! `dtc recompute` runs a cascade from one key, for operators who changed
//! configuration or repaired data outside the inbox. `dtc refresh-tiles`
//! drops an S2 datatake's tile memo and resolves it again.

use anyhow::{bail, Result};

use datatake_completeness_core::mission::s2::{S2Rules, TILE_DEPENDENT_TYPES};
use datatake_completeness_core::models::{CompletenessRecord, ComputeKey, Mission};
use datatake_completeness_core::store::DocumentStore;
use datatake_completeness_core::{CascadeReport, CascadeScheduler, MissionStrategy};

use crate::config::Config;
use crate::engine::Engine;

pub async fn run_recompute(
    config: &Config,
    mission: Mission,
    satellite_unit: &str,
    datatake_id: &str,
    product_type: &str,
    qualifier: Option<&str>,
) -> Result<()> {
    let mut key = ComputeKey::new(mission, satellite_unit, datatake_id, product_type);
    if let Some(q) = qualifier {
        key = key.with_qualifier(q);
    }

    let engine = Engine::open(config).await?;
    let report = engine.scheduler().run(key).await?;

    println!("recompute {}", report.visited.first().map(|k| k.to_string()).unwrap_or_default());
    for record in &report.records {
        println!("  {}", format_record(record));
    }
    if report.truncated {
        println!("  (cascade truncated at depth {})", engine.max_depth);
    }
    println!("ok");

    engine.close().await;
    Ok(())
}

pub async fn run_refresh_tiles(config: &Config, satellite_unit: &str, datatake_id: &str) -> Result<()> {
    let engine = Engine::open(config).await?;
    let (tiles, reports) = refresh_tiles(&engine.scheduler(), satellite_unit, datatake_id).await?;

    match tiles {
        Some(n) => println!("{}/{}: {} expected tiles", satellite_unit, datatake_id, n),
        None => println!("{}/{}: tile count unresolved", satellite_unit, datatake_id),
    }
    for record in reports.iter().flat_map(|r| &r.records) {
        println!("  {}", format_record(record));
    }

    engine.close().await;
    Ok(())
}

/// Drop the tile memo, resolve it again and recompute every tile-dependent
/// key of the datatake against the new count.
///
/// Returns the memoized count and one cascade report per recomputed key.
pub async fn refresh_tiles<S: DocumentStore + ?Sized>(
    scheduler: &CascadeScheduler<'_, S>,
    satellite_unit: &str,
    datatake_id: &str,
) -> Result<(Option<u32>, Vec<CascadeReport>)> {
    let store = scheduler.aggregator().store();
    let missions = scheduler.aggregator().missions();

    let Some(mut datatake) = store.get_datatake(satellite_unit, datatake_id).await? else {
        bail!("datatake not found: {}/{}", satellite_unit, datatake_id);
    };
    if datatake.mission() != Some(Mission::S2) {
        bail!("{}/{} is not a Sentinel-2 datatake", satellite_unit, datatake_id);
    }

    datatake.expected_tiles.invalidate();
    if let MissionStrategy::S2(rules) = missions.get(Mission::S2) {
        rules.ensure_tiles(&mut datatake).await?;
    }
    store.upsert_datatake(&datatake).await?;

    // Existing tile records, plus the full fan-out once the count is known.
    let mut keys: Vec<ComputeKey> = store
        .list_completeness(satellite_unit, datatake_id)
        .await?
        .iter()
        .filter(|r| S2Rules::is_tile_dependent(&r.product_type))
        .map(ComputeKey::from)
        .collect();
    if datatake.expected_tiles.is_resolved() {
        for product_type in TILE_DEPENDENT_TYPES {
            let key = ComputeKey::new(Mission::S2, satellite_unit, datatake_id, product_type);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }

    let mut reports = Vec::with_capacity(keys.len());
    for key in keys {
        reports.push(scheduler.run(key).await?);
    }
    Ok((datatake.expected_tiles.get(), reports))
}

/// One line per record: key, observed over expected, percentage, status.
pub fn format_record(record: &CompletenessRecord) -> String {
    let expected = record
        .expected
        .map(|e| e.to_string())
        .unwrap_or_else(|| "?".to_string());
    let percentage = record
        .percentage
        .map(|p| format!("{:.1}%", p))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:<40} {:>14} / {:<14} {:>7}  {}",
        record.key, record.value, expected, percentage, record.status
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use datatake_completeness_core::geomask::GeoMaskIntersector;
    use datatake_completeness_core::models::{
        CompletenessStatus, Datatake, ExpectedKind, ProductEvent, SiblingProduct,
    };
    use datatake_completeness_core::store::memory::InMemoryStore;
    use datatake_completeness_core::tiles::TileLookup;

    use crate::engine::build_missions;

    struct FixedTiles(Vec<&'static str>);

    #[async_trait]
    impl TileLookup for FixedTiles {
        async fn search_expected_tiles(&self, _datatake: &Datatake) -> anyhow::Result<Vec<String>> {
            Ok(self.0.iter().map(|t| t.to_string()).collect())
        }
    }

    #[tokio::test]
    async fn refresh_recomputes_tile_records() {
        let config: Config = toml::from_str("[db]\npath = \"x\"\n").unwrap();
        let lookup: Arc<dyn TileLookup> = Arc::new(FixedTiles(vec!["T1", "T2", "T3", "T4"]));
        let missions = build_missions(&config, Arc::new(GeoMaskIntersector::default()), Some(lookup));
        let store = InMemoryStore::new();
        let scheduler = CascadeScheduler::new(&store, &missions);

        let mut datatake = Datatake::new("S2A", "S2A-36678-7");
        datatake.expected_tiles.memoize(1);
        store.upsert_datatake(&datatake).await.unwrap();

        let key = ComputeKey::new(Mission::S2, "S2A", "S2A-36678-7", "MSI_L1C_TL");
        let product = ProductEvent {
            name: "S2A_MSIL1C_TL_T1".into(),
            ..Default::default()
        };
        store
            .upsert_product(&SiblingProduct::for_key(&product, &key))
            .await
            .unwrap();
        let before = scheduler.run(key.clone()).await.unwrap();
        assert_eq!(before.records[0].expected, Some(1));
        assert_eq!(before.records[0].status, CompletenessStatus::Complete);

        let (tiles, reports) = refresh_tiles(&scheduler, "S2A", "S2A-36678-7").await.unwrap();
        assert_eq!(tiles, Some(4));
        assert_eq!(reports.len(), 4);

        let record = store
            .get_completeness("S2A", &key.record_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.expected, Some(4));
        assert_eq!(record.status, CompletenessStatus::Partial);
        assert_eq!(store.record_count(), 4);
    }

    #[tokio::test]
    async fn refresh_rejects_other_missions() {
        let config: Config = toml::from_str("[db]\npath = \"x\"\n").unwrap();
        let missions = build_missions(&config, Arc::new(GeoMaskIntersector::default()), None);
        let store = InMemoryStore::new();
        store
            .upsert_datatake(&Datatake::new("S1A", "4F2A1"))
            .await
            .unwrap();
        let scheduler = CascadeScheduler::new(&store, &missions);

        assert!(refresh_tiles(&scheduler, "S1A", "4F2A1").await.is_err());
        assert!(refresh_tiles(&scheduler, "S2A", "missing").await.is_err());
    }

    #[test]
    fn record_line_shows_unknown_expectation() {
        let record = CompletenessRecord {
            key: "4F2A1#IW_GRDH_1S".into(),
            mission: Mission::S1,
            satellite_unit: "S1A".into(),
            datatake_id: "4F2A1".into(),
            product_type: "IW_GRDH_1S".into(),
            qualifier: None,
            expected_kind: None,
            expected: None,
            value: 12,
            value_adjusted: None,
            percentage: None,
            status: CompletenessStatus::Unknown,
        };
        let line = format_record(&record);
        assert!(line.starts_with("4F2A1#IW_GRDH_1S"));
        assert!(line.contains(" / ?"));
        assert!(line.ends_with("Unknown"));

        let known = CompletenessRecord {
            expected_kind: Some(ExpectedKind::Sensing),
            expected: Some(24),
            percentage: Some(50.0),
            status: CompletenessStatus::Partial,
            ..record
        };
        assert!(format_record(&known).contains("50.0%"));
    }
}
