//! Wires configuration into a ready-to-run engine: store, mission registry
//! and cascade settings.

use anyhow::Result;
use std::sync::Arc;

use datatake_completeness_core::expected::ExpectedTable;
use datatake_completeness_core::geomask::GeoMaskIntersector;
use datatake_completeness_core::mission::{Missions, S1Rules, S2Rules, S3Rules, S5Rules};
use datatake_completeness_core::tiles::TileLookup;
use datatake_completeness_core::CascadeScheduler;

use crate::config::{Config, TableMissionConfig};
use crate::masks;
use crate::sqlite_store::SqliteStore;
use crate::tiles;
use crate::{db, migrate};

pub struct Engine {
    pub store: SqliteStore,
    pub missions: Missions,
    pub max_depth: usize,
}

impl Engine {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool).await?;

        let masks = Arc::new(masks::load_masks(&config.masks)?);
        let tiles = tiles::build_tile_lookup(&config.tiles)?;

        Ok(Self {
            store: SqliteStore::new(pool),
            missions: build_missions(config, masks, tiles),
            max_depth: config.cascade.max_depth,
        })
    }

    pub fn scheduler(&self) -> CascadeScheduler<'_, SqliteStore> {
        CascadeScheduler::new(&self.store, &self.missions).with_max_depth(self.max_depth)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

fn table(defaults: ExpectedTable, config: &TableMissionConfig) -> Arc<ExpectedTable> {
    let mut table = defaults;
    table.merge(&config.expected);
    Arc::new(table)
}

pub fn build_missions(
    config: &Config,
    masks: Arc<GeoMaskIntersector>,
    tiles: Option<Arc<dyn TileLookup>>,
) -> Missions {
    let missions = &config.missions;

    let s1 = S1Rules::new(masks)
        .with_excluded_product_types(missions.s1.excluded_product_types.iter().cloned())
        .with_service_type(missions.s1.service_type.clone())
        .with_thresholds(config.masks.thresholds.clone());
    let s2 = S2Rules::new(table(ExpectedTable::s2_defaults(), &missions.s2), tiles)
        .with_service_type(missions.s2.service_type.clone());
    let s3 = S3Rules::new(table(ExpectedTable::s3_defaults(), &missions.s3))
        .with_service_type(missions.s3.service_type.clone());
    let s5 = S5Rules::new(table(ExpectedTable::s5_defaults(), &missions.s5))
        .with_service_type(missions.s5.service_type.clone());

    Missions::new(s1, s2, s3, s5)
}
