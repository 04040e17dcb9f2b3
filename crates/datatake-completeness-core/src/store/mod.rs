//! Storage abstraction for the completeness engine.
//!
//! The [`DocumentStore`] trait covers the three collections the engine
//! reads and writes: products, datatakes and completeness records. The
//! application crate provides a SQLite implementation; [`memory`] holds an
//! in-memory one for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CompletenessRecord, Datatake, SiblingProduct};

/// Selects the products that contribute to one compute key.
///
/// `None` filters match anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SiblingQuery {
    pub datatake_id: String,
    pub satellite_unit: String,
    pub product_type: String,
    pub timeliness: Option<String>,
    pub service_id: Option<String>,
    pub service_type: Option<String>,
}

impl SiblingQuery {
    pub fn matches(&self, product: &SiblingProduct) -> bool {
        fn optional(filter: &Option<String>, value: &Option<String>) -> bool {
            filter.is_none() || filter == value
        }
        product.datatake_id == self.datatake_id
            && product.satellite_unit == self.satellite_unit
            && product.product_type == self.product_type
            && optional(&self.timeliness, &product.timeliness)
            && optional(&self.service_id, &product.service_id)
            && optional(&self.service_type, &product.service_type)
    }
}

/// Abstract document store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_product`](DocumentStore::upsert_product) | Insert or replace a product by name |
/// | [`query_siblings`](DocumentStore::query_siblings) | Products contributing to a compute key |
/// | [`get_datatake`](DocumentStore::get_datatake) | Fetch a datatake |
/// | [`upsert_datatake`](DocumentStore::upsert_datatake) | Insert or replace a datatake |
/// | [`upsert_completeness`](DocumentStore::upsert_completeness) | Insert or replace a record |
/// | [`get_completeness`](DocumentStore::get_completeness) | Fetch a record by key |
/// | [`list_completeness`](DocumentStore::list_completeness) | All records of a datatake |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert_product(&self, product: &SiblingProduct) -> Result<()>;

    async fn query_siblings(&self, query: &SiblingQuery) -> Result<Vec<SiblingProduct>>;

    async fn get_datatake(&self, satellite_unit: &str, datatake_id: &str)
        -> Result<Option<Datatake>>;

    async fn upsert_datatake(&self, datatake: &Datatake) -> Result<()>;

    async fn upsert_completeness(&self, record: &CompletenessRecord) -> Result<()>;

    async fn get_completeness(
        &self,
        satellite_unit: &str,
        key: &str,
    ) -> Result<Option<CompletenessRecord>>;

    /// Records of one datatake, ordered by key.
    async fn list_completeness(
        &self,
        satellite_unit: &str,
        datatake_id: &str,
    ) -> Result<Vec<CompletenessRecord>>;
}
