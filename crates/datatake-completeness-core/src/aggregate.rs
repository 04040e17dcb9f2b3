//! Completeness aggregation.
//!
//! For one compute key the aggregator reads the datatake and the sibling
//! products, measures what was observed, compares it with the mission's
//! expectation and upserts the resulting [`CompletenessRecord`].
//!
//! # Computation
//!
//! ```text
//! observed        = Σ sensing µs          (sensing expectations)
//!                 | number of products    (count / tile expectations)
//! value_adjusted  = min(observed, expected)
//! percentage      = clamp(value_adjusted / expected × 100, 0, 100)
//! ```
//!
//! An expected value of zero gives 0 %. An undefined expectation gives an
//! Unknown record carrying only the observed value.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{CompletenessError, Result};
use crate::mission::Missions;
use crate::models::{
    CompletenessRecord, CompletenessStatus, ComputeKey, Datatake, ExpectedKind, ExpectedValue,
    SiblingProduct,
};
use crate::store::DocumentStore;

/// Observed amount over deduplicated siblings.
pub fn observe(siblings: &[SiblingProduct], kind: ExpectedKind) -> i64 {
    let unique: BTreeMap<&str, &SiblingProduct> =
        siblings.iter().map(|p| (p.name.as_str(), p)).collect();
    match kind {
        ExpectedKind::Sensing => unique
            .values()
            .map(|p| p.sensing_duration_us().unwrap_or(0).max(0))
            .sum(),
        ExpectedKind::Count | ExpectedKind::Tiles => unique.len() as i64,
    }
}

/// Build the record for `key`. Pure: no I/O, no clock.
pub fn completeness_record(
    key: &ComputeKey,
    expected: Option<ExpectedValue>,
    observed: i64,
) -> CompletenessRecord {
    let (value_adjusted, percentage, status) = match expected {
        Some(expected) => {
            let adjusted = observed.min(expected.value);
            let percentage = if expected.value <= 0 {
                0.0
            } else {
                (adjusted as f64 / expected.value as f64 * 100.0).clamp(0.0, 100.0)
            };
            (
                Some(adjusted),
                Some(percentage),
                CompletenessStatus::from_percentage(percentage),
            )
        }
        None => (None, None, CompletenessStatus::Unknown),
    };

    CompletenessRecord {
        key: key.record_id(),
        mission: key.mission,
        satellite_unit: key.satellite_unit.clone(),
        datatake_id: key.datatake_id.clone(),
        product_type: key.product_type.clone(),
        qualifier: key.qualifier.clone(),
        expected_kind: expected.map(|e| e.kind),
        expected: expected.map(|e| e.value),
        value: observed,
        value_adjusted,
        percentage,
        status,
    }
}

/// Recomputes completeness records against a document store.
pub struct Aggregator<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    missions: &'a Missions,
}

impl<'a, S: DocumentStore + ?Sized> Aggregator<'a, S> {
    pub fn new(store: &'a S, missions: &'a Missions) -> Self {
        Self { store, missions }
    }

    pub fn store(&self) -> &'a S {
        self.store
    }

    pub fn missions(&self) -> &'a Missions {
        self.missions
    }

    pub async fn load_datatake(&self, key: &ComputeKey) -> Result<Option<Datatake>> {
        self.store
            .get_datatake(&key.satellite_unit, &key.datatake_id)
            .await
            .map_err(CompletenessError::store)
    }

    /// Recompute one key, loading and persisting its datatake.
    pub async fn recompute(&self, key: &ComputeKey) -> Result<CompletenessRecord> {
        let mut datatake = self.load_datatake(key).await?;
        let before = datatake.clone();
        let record = self.recompute_with(key, datatake.as_mut()).await?;
        if let Some(datatake) = datatake.filter(|dt| Some(dt) != before.as_ref()) {
            self.store
                .upsert_datatake(&datatake)
                .await
                .map_err(CompletenessError::store)?;
        }
        Ok(record)
    }

    /// Recompute one key against an already loaded datatake.
    ///
    /// The datatake may be mutated (tile memo); persisting it is the
    /// caller's job.
    pub async fn recompute_with(
        &self,
        key: &ComputeKey,
        datatake: Option<&mut Datatake>,
    ) -> Result<CompletenessRecord> {
        let strategy = self.missions.get(key.mission);

        let expected = match datatake {
            Some(datatake) => {
                strategy
                    .prepare_expected(datatake, &key.product_type)
                    .await?;
                strategy.expected_value(datatake, &key.product_type)
            }
            None => {
                warn!(key = %key, "datatake not found");
                None
            }
        };
        if expected.is_none() {
            warn!(key = %key, "no expected value, record is Unknown");
        }

        let siblings = self
            .store
            .query_siblings(&strategy.sibling_query(key))
            .await
            .map_err(CompletenessError::store)?;
        let kind = expected.map(|e| e.kind).unwrap_or(strategy.observed_kind());
        let observed = observe(&siblings, kind);

        let record = completeness_record(key, expected, observed);
        debug!(
            key = %key,
            siblings = siblings.len(),
            value = record.value,
            status = %record.status,
            "recomputed"
        );
        self.store
            .upsert_completeness(&record)
            .await
            .map_err(CompletenessError::store)?;
        Ok(record)
    }
}

/// Datatake-level roll-up over its records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatatakeSummary {
    pub records: usize,
    pub known: usize,
    /// Mean percentage over records with a defined expectation.
    pub percentage: Option<f64>,
    pub status: CompletenessStatus,
}

impl DatatakeSummary {
    pub fn from_records(records: &[CompletenessRecord]) -> Self {
        let known: Vec<f64> = records.iter().filter_map(|r| r.percentage).collect();
        let percentage = if known.is_empty() {
            None
        } else {
            Some(known.iter().sum::<f64>() / known.len() as f64)
        };
        Self {
            records: records.len(),
            known: known.len(),
            percentage,
            status: percentage
                .map(CompletenessStatus::from_percentage)
                .unwrap_or(CompletenessStatus::Unknown),
        }
    }
}
