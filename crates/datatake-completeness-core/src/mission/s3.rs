//! Sentinel-3 rules: table lookups keyed by timeliness.

use std::sync::Arc;

use tracing::warn;

use crate::expected::ExpectedTable;
use crate::models::{ComputeKey, ExpectedKind, ExpectedValue, Mission, ProductEvent};

#[derive(Debug, Clone)]
pub struct S3Rules {
    table: Arc<ExpectedTable>,
    service_type: Option<String>,
}

impl S3Rules {
    pub fn new(table: Arc<ExpectedTable>) -> Self {
        Self {
            table,
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

    /// The key carries the timeliness as its qualifier, so NRT and NTC
    /// deliveries are tracked separately.
    pub fn derive_compute_key(&self, product: &ProductEvent) -> Option<ComputeKey> {
        let (Some(datatake_id), Some(product_type), Some(timeliness), Some(unit)) = (
            product.datatake_id.as_deref(),
            product.product_type.as_deref(),
            product.timeliness.as_deref(),
            product.satellite_unit.as_deref(),
        ) else {
            warn!(
                product = %product.name,
                "S3 product lacks datatake_id, product_type, timeliness or satellite_unit"
            );
            return None;
        };
        Some(ComputeKey::new(Mission::S3, unit, datatake_id, product_type).with_qualifier(timeliness))
    }

    pub fn expected_value(&self, product_type: &str) -> Option<ExpectedValue> {
        self.table.get(product_type)
    }

    pub fn observed_kind(&self) -> ExpectedKind {
        ExpectedKind::Sensing
    }
}
