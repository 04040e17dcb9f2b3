//! Sentinel-5P rules: one product per orbit for each distributed type.

use std::sync::Arc;

use tracing::warn;

use crate::expected::ExpectedTable;
use crate::models::{ComputeKey, ExpectedKind, ExpectedValue, Mission, ProductEvent};

#[derive(Debug, Clone)]
pub struct S5Rules {
    table: Arc<ExpectedTable>,
    service_type: Option<String>,
}

impl S5Rules {
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

    pub fn derive_compute_key(&self, product: &ProductEvent) -> Option<ComputeKey> {
        let has_mission = product.mission.is_some() || product.satellite_unit.is_some();
        let (true, Some(datatake_id), Some(product_type), Some(_orbit)) = (
            has_mission,
            product.datatake_id.as_deref(),
            product.product_type.as_deref(),
            product.absolute_orbit,
        ) else {
            warn!(
                product = %product.name,
                "S5 product lacks mission, datatake_id, product_type or absolute_orbit"
            );
            return None;
        };
        let unit = product.satellite_unit.as_deref().unwrap_or("S5P");
        Some(ComputeKey::new(Mission::S5, unit, datatake_id, product_type))
    }

    pub fn expected_value(&self, product_type: &str) -> Option<ExpectedValue> {
        self.table.get(product_type)
    }

    pub fn observed_kind(&self) -> ExpectedKind {
        ExpectedKind::Count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> ProductEvent {
        ProductEvent {
            name: "S5P_OFFL_L2__O3_____20240101T000000_33001".into(),
            mission: Some("S5P".into()),
            datatake_id: Some("33001".into()),
            product_type: Some("L2__O3____".into()),
            absolute_orbit: Some(33001),
            ..Default::default()
        }
    }

    #[test]
    fn key_uses_dash_format() {
        let rules = S5Rules::new(Arc::new(ExpectedTable::s5_defaults()));
        let key = rules.derive_compute_key(&event()).unwrap();
        assert_eq!(key.record_id(), "33001-L2__O3____");
        assert_eq!(key.satellite_unit, "S5P");
    }

    #[test]
    fn orbit_is_required() {
        let rules = S5Rules::new(Arc::new(ExpectedTable::s5_defaults()));
        let mut event = event();
        event.absolute_orbit = None;
        assert!(rules.derive_compute_key(&event).is_none());
    }

    #[test]
    fn mission_is_required() {
        let rules = S5Rules::new(Arc::new(ExpectedTable::s5_defaults()));
        let mut event = event();
        event.mission = None;
        assert!(rules.derive_compute_key(&event).is_none());
    }
}
