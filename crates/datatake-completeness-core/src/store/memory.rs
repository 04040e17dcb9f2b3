//! In-memory [`DocumentStore`] implementation for testing.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{CompletenessRecord, Datatake, SiblingProduct};

use super::{DocumentStore, SiblingQuery};

type UnitKey = (String, String);

#[derive(Default)]
pub struct InMemoryStore {
    products: RwLock<HashMap<String, SiblingProduct>>,
    datatakes: RwLock<HashMap<UnitKey, Datatake>>,
    records: RwLock<HashMap<UnitKey, CompletenessRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product_count(&self) -> usize {
        self.products.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn record_count(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: PoisonError<T>) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

fn unit_key(satellite_unit: &str, id: &str) -> UnitKey {
    (satellite_unit.to_string(), id.to_string())
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn upsert_product(&self, product: &SiblingProduct) -> Result<()> {
        let mut products = self.products.write().map_err(poisoned)?;
        products.insert(product.name.clone(), product.clone());
        Ok(())
    }

    async fn query_siblings(&self, query: &SiblingQuery) -> Result<Vec<SiblingProduct>> {
        let products = self.products.read().map_err(poisoned)?;
        let mut found: Vec<SiblingProduct> = products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn get_datatake(
        &self,
        satellite_unit: &str,
        datatake_id: &str,
    ) -> Result<Option<Datatake>> {
        let datatakes = self.datatakes.read().map_err(poisoned)?;
        Ok(datatakes.get(&unit_key(satellite_unit, datatake_id)).cloned())
    }

    async fn upsert_datatake(&self, datatake: &Datatake) -> Result<()> {
        let mut datatakes = self.datatakes.write().map_err(poisoned)?;
        datatakes.insert(
            unit_key(&datatake.satellite_unit, &datatake.datatake_id),
            datatake.clone(),
        );
        Ok(())
    }

    async fn upsert_completeness(&self, record: &CompletenessRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(unit_key(&record.satellite_unit, &record.key), record.clone());
        Ok(())
    }

    async fn get_completeness(
        &self,
        satellite_unit: &str,
        key: &str,
    ) -> Result<Option<CompletenessRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&unit_key(satellite_unit, key)).cloned())
    }

    async fn list_completeness(
        &self,
        satellite_unit: &str,
        datatake_id: &str,
    ) -> Result<Vec<CompletenessRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut found: Vec<CompletenessRecord> = records
            .values()
            .filter(|r| r.satellite_unit == satellite_unit && r.datatake_id == datatake_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, service_type: &str) -> SiblingProduct {
        SiblingProduct {
            name: name.to_string(),
            datatake_id: "4F2A1".into(),
            satellite_unit: "S1A".into(),
            product_type: "IW_GRDH_1S".into(),
            timeliness: None,
            service_id: None,
            service_type: Some(service_type.to_string()),
            sensing_start: None,
            sensing_stop: None,
            sensing_duration: Some(10),
            size: None,
        }
    }

    #[tokio::test]
    async fn product_upsert_replaces_by_name() {
        let store = InMemoryStore::new();
        store.upsert_product(&product("a", "PRIP")).await.unwrap();
        store.upsert_product(&product("a", "LTA")).await.unwrap();
        assert_eq!(store.product_count(), 1);
    }

    #[tokio::test]
    async fn sibling_query_applies_optional_filters() {
        let store = InMemoryStore::new();
        store.upsert_product(&product("b", "PRIP")).await.unwrap();
        store.upsert_product(&product("a", "LTA")).await.unwrap();

        let mut query = SiblingQuery {
            datatake_id: "4F2A1".into(),
            satellite_unit: "S1A".into(),
            product_type: "IW_GRDH_1S".into(),
            ..Default::default()
        };
        let all = store.query_siblings(&query).await.unwrap();
        assert_eq!(
            all.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        query.service_type = Some("PRIP".into());
        let prip = store.query_siblings(&query).await.unwrap();
        assert_eq!(prip.len(), 1);
        assert_eq!(prip[0].name, "b");

        query.product_type = "IW_SLC__1S".into();
        assert!(store.query_siblings(&query).await.unwrap().is_empty());
    }
}
