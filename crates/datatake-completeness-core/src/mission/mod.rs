//! Per-mission completeness rules.
//!
//! Each mission answers the same questions differently: how a product is
//! keyed, what a complete datatake should deliver, which products are only
//! produced over specific areas, and which other keys must be recomputed
//! when one key changes. [`MissionStrategy`] is the closed set of those
//! rule sets; [`Missions`] is the registry built once at startup.

pub mod s1;
pub mod s2;
pub mod s3;
pub mod s5;

use crate::error::Result;
use crate::models::{ComputeKey, Datatake, ExpectedKind, ExpectedValue, Mission, ProductEvent};
use crate::store::SiblingQuery;

pub use s1::S1Rules;
pub use s2::S2Rules;
pub use s3::S3Rules;
pub use s5::S5Rules;

#[derive(Debug, Clone)]
pub enum MissionStrategy {
    S1(S1Rules),
    S2(S2Rules),
    S3(S3Rules),
    S5(S5Rules),
}

impl MissionStrategy {
    pub fn mission(&self) -> Mission {
        match self {
            MissionStrategy::S1(_) => Mission::S1,
            MissionStrategy::S2(_) => Mission::S2,
            MissionStrategy::S3(_) => Mission::S3,
            MissionStrategy::S5(_) => Mission::S5,
        }
    }

    /// Key under which a product contributes, or `None` when the product is
    /// not tracked.
    pub fn derive_compute_key(&self, product: &ProductEvent) -> Option<ComputeKey> {
        match self {
            MissionStrategy::S1(rules) => rules.derive_compute_key(product),
            MissionStrategy::S2(rules) => rules.derive_compute_key(product),
            MissionStrategy::S3(rules) => rules.derive_compute_key(product),
            MissionStrategy::S5(rules) => rules.derive_compute_key(product),
        }
    }

    /// `None` means the expectation is undefined and the record is Unknown.
    pub fn expected_value(&self, datatake: &Datatake, product_type: &str) -> Option<ExpectedValue> {
        match self {
            MissionStrategy::S1(rules) => rules.expected_value(datatake, product_type),
            MissionStrategy::S2(rules) => rules.expected_value(datatake, product_type),
            MissionStrategy::S3(rules) => rules.expected_value(product_type),
            MissionStrategy::S5(rules) => rules.expected_value(product_type),
        }
    }

    /// How siblings are measured when no expectation is defined.
    pub fn observed_kind(&self) -> ExpectedKind {
        match self {
            MissionStrategy::S1(rules) => rules.observed_kind(),
            MissionStrategy::S2(rules) => rules.observed_kind(),
            MissionStrategy::S3(rules) => rules.observed_kind(),
            MissionStrategy::S5(rules) => rules.observed_kind(),
        }
    }

    /// Only S1 gates product types by area; other missions produce
    /// everywhere.
    pub fn is_over_specific_area(&self, datatake: &Datatake, product_type: &str) -> Result<bool> {
        match self {
            MissionStrategy::S1(rules) => Ok(rules.is_over_specific_area(datatake, product_type)?),
            _ => Ok(true),
        }
    }

    /// Resolve datatake state that the expectation of `product_type` needs.
    pub async fn prepare_expected(&self, datatake: &mut Datatake, product_type: &str) -> Result<()> {
        match self {
            MissionStrategy::S2(rules) => rules.prepare_expected(datatake, product_type).await,
            _ => Ok(()),
        }
    }

    pub async fn impacted_keys(
        &self,
        key: &ComputeKey,
        datatake: Option<&mut Datatake>,
    ) -> Result<Vec<ComputeKey>> {
        match self {
            MissionStrategy::S1(rules) => Ok(rules.impacted_keys(key, datatake.as_deref())?),
            MissionStrategy::S2(rules) => rules.impacted_keys(key, datatake).await,
            MissionStrategy::S3(_) | MissionStrategy::S5(_) => Ok(Vec::new()),
        }
    }

    fn service_type(&self) -> Option<&str> {
        match self {
            MissionStrategy::S1(rules) => rules.service_type(),
            MissionStrategy::S2(rules) => rules.service_type(),
            MissionStrategy::S3(rules) => rules.service_type(),
            MissionStrategy::S5(rules) => rules.service_type(),
        }
    }

    /// Products that contribute to `key`.
    pub fn sibling_query(&self, key: &ComputeKey) -> SiblingQuery {
        let timeliness = match self {
            MissionStrategy::S3(_) => key.qualifier.clone(),
            _ => None,
        };
        SiblingQuery {
            datatake_id: key.datatake_id.clone(),
            satellite_unit: key.satellite_unit.clone(),
            product_type: key.product_type.clone(),
            timeliness,
            service_id: None,
            service_type: self.service_type().map(str::to_string),
        }
    }
}

/// Strategy registry, one entry per mission.
#[derive(Debug, Clone)]
pub struct Missions {
    s1: MissionStrategy,
    s2: MissionStrategy,
    s3: MissionStrategy,
    s5: MissionStrategy,
}

impl Missions {
    pub fn new(s1: S1Rules, s2: S2Rules, s3: S3Rules, s5: S5Rules) -> Self {
        Self {
            s1: MissionStrategy::S1(s1),
            s2: MissionStrategy::S2(s2),
            s3: MissionStrategy::S3(s3),
            s5: MissionStrategy::S5(s5),
        }
    }

    pub fn get(&self, mission: Mission) -> &MissionStrategy {
        match mission {
            Mission::S1 => &self.s1,
            Mission::S2 => &self.s2,
            Mission::S3 => &self.s3,
            Mission::S5 => &self.s5,
        }
    }

    pub fn for_product(&self, product: &ProductEvent) -> Option<&MissionStrategy> {
        product.mission().map(|m| self.get(m))
    }

    pub fn derive_compute_key(&self, product: &ProductEvent) -> Option<ComputeKey> {
        self.for_product(product)?.derive_compute_key(product)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Registry fixtures shared by the aggregator and cascade tests.

    use std::sync::Arc;

    use geo::{Coord, MultiPolygon, Rect};

    use super::*;
    use crate::expected::ExpectedTable;
    use crate::geomask::{GeoMask, GeoMaskIntersector};
    use crate::tiles::TileLookup;

    pub fn world_masks() -> Arc<GeoMaskIntersector> {
        let world = MultiPolygon::new(vec![Rect::new(
            Coord { x: -180.0, y: -90.0 },
            Coord { x: 180.0, y: 90.0 },
        )
        .to_polygon()]);
        Arc::new(GeoMaskIntersector::new([
            GeoMask::new(s1::OCEAN_MASK, world.clone()),
            GeoMask::new(s1::SLC_MASK, world),
        ]))
    }

    pub fn missions(tiles: Option<Arc<dyn TileLookup>>) -> Missions {
        Missions::new(
            S1Rules::new(world_masks()),
            S2Rules::new(Arc::new(ExpectedTable::s2_defaults()), tiles),
            S3Rules::new(Arc::new(ExpectedTable::s3_defaults())),
            S5Rules::new(Arc::new(ExpectedTable::s5_defaults())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::missions;
    use super::*;

    #[test]
    fn registry_dispatches_on_product_mission() {
        let missions = missions(None);
        let event = ProductEvent {
            name: "S3A_SL_1_RBT".into(),
            satellite_unit: Some("S3A".into()),
            datatake_id: Some("1".into()),
            product_type: Some("SL_1_RBT___".into()),
            timeliness: Some("NT".into()),
            ..Default::default()
        };
        let key = missions.derive_compute_key(&event).unwrap();
        assert_eq!(key.mission, Mission::S3);
        assert_eq!(missions.get(Mission::S3).mission(), Mission::S3);

        let query = missions.get(Mission::S3).sibling_query(&key);
        assert_eq!(query.timeliness.as_deref(), Some("NT"));
    }

    #[test]
    fn s1_query_filters_by_service_type() {
        let missions = Missions::new(
            S1Rules::new(testing::world_masks()).with_service_type(Some("PRIP".into())),
            S2Rules::new(Default::default(), None),
            S3Rules::new(Default::default()),
            S5Rules::new(Default::default()),
        );
        let key = ComputeKey::new(Mission::S1, "S1A", "4F2A1", "IW_SLC__1S").with_qualifier("x");
        let query = missions.get(Mission::S1).sibling_query(&key);
        assert_eq!(query.service_type.as_deref(), Some("PRIP"));
        assert_eq!(query.timeliness, None);
    }

    #[test]
    fn only_s1_gates_by_area() {
        let missions = missions(None);
        let dt = Datatake::new("S3A", "1");
        assert!(missions.get(Mission::S3).is_over_specific_area(&dt, "OL_1_EFR___").unwrap());
        assert!(!missions.get(Mission::S1).is_over_specific_area(&dt, "IW_SLC__1S").unwrap());
    }
}
