//! Sentinel-1 rules.
//!
//! Product types look like `EW_SLC__1S`: a two-letter mode prefix, a
//! three-letter family at `[3..6]`, the processing level at index 8 and the
//! polarisation as the last character.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::GeometryError;
use crate::geomask::GeoMaskIntersector;
use crate::models::{ComputeKey, Datatake, ExpectedKind, ExpectedValue, Mission, ProductEvent};

/// RF characterisation datatakes always sense for 2.8 seconds.
pub const RFC_EXPECTED_US: i64 = 2_800_000;

pub const DEFAULT_AREA_THRESHOLD: f64 = 50.0;

pub const OCEAN_MASK: &str = "OCN";
pub const SLC_MASK: &str = "SLC";

const INSTRUMENT_MODES: [&str; 15] = [
    "SM", "IW", "EW", "WV", "RFC", "Z1", "Z2", "Z3", "Z4", "Z5", "Z6", "ZI", "ZE", "ZW", "AIS",
];

pub fn default_excluded_product_types() -> Vec<String> {
    vec![
        "HK_RAW__0S".to_string(),
        "GP_RAW__0_".to_string(),
        "AN_RAW__0S".to_string(),
    ]
}

/// Instrument mode implied by a product type prefix.
pub fn mode_from_product_type(product_type: &str) -> Option<&'static str> {
    match product_type.get(..2)? {
        "S1" | "S2" | "S3" | "S4" | "S5" | "S6" => Some("SM"),
        "IW" => Some("IW"),
        "EW" => Some("EW"),
        "WV" => Some("WV"),
        "RF" => Some("RFC"),
        "AI" => Some("AIS"),
        "Z1" => Some("Z1"),
        "Z2" => Some("Z2"),
        "Z3" => Some("Z3"),
        "Z4" => Some("Z4"),
        "Z5" => Some("Z5"),
        "Z6" => Some("Z6"),
        "ZI" => Some("ZI"),
        "ZE" => Some("ZE"),
        "ZW" => Some("ZW"),
        _ => None,
    }
}

fn known_mode(mode: &str) -> Option<&'static str> {
    let mode = mode.trim().to_ascii_uppercase();
    INSTRUMENT_MODES.iter().copied().find(|m| *m == mode)
}

fn family(product_type: &str) -> Option<&str> {
    product_type.get(3..6)
}

fn level(product_type: &str) -> Option<char> {
    product_type.chars().nth(8)
}

fn prefix(product_type: &str) -> Option<&str> {
    product_type.get(..2)
}

#[derive(Debug, Clone)]
pub struct S1Rules {
    excluded: BTreeSet<String>,
    service_type: Option<String>,
    masks: Arc<GeoMaskIntersector>,
    thresholds: BTreeMap<String, f64>,
}

impl S1Rules {
    pub fn new(masks: Arc<GeoMaskIntersector>) -> Self {
        Self {
            excluded: default_excluded_product_types().into_iter().collect(),
            service_type: None,
            masks,
            thresholds: BTreeMap::new(),
        }
    }

    pub fn with_excluded_product_types(mut self, excluded: impl IntoIterator<Item = String>) -> Self {
        self.excluded = excluded.into_iter().collect();
        self
    }

    pub fn with_service_type(mut self, service_type: Option<String>) -> Self {
        self.service_type = service_type;
        self
    }

    pub fn with_thresholds(mut self, thresholds: BTreeMap<String, f64>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn service_type(&self) -> Option<&str> {
        self.service_type.as_deref()
    }

    pub fn derive_compute_key(&self, product: &ProductEvent) -> Option<ComputeKey> {
        let product_type = product.product_type.as_deref()?;
        if self.excluded.contains(product_type) {
            debug!(product = %product.name, product_type, "excluded product type");
            return None;
        }
        let mode = match product.instrument_mode.as_deref() {
            Some(declared) => known_mode(declared),
            None => mode_from_product_type(product_type),
        };
        if mode.is_none() {
            debug!(product = %product.name, product_type, "unsupported instrument mode");
            return None;
        }
        Some(ComputeKey::new(
            Mission::S1,
            product.satellite_unit.as_deref()?,
            product.datatake_id.as_deref()?,
            product_type,
        ))
    }

    /// Only wave-mode level-0/2 and RF characterisation types have a known
    /// expectation; every other type stays undefined.
    pub fn expected_value(&self, datatake: &Datatake, product_type: &str) -> Option<ExpectedValue> {
        if product_type.starts_with("RF_") {
            return Some(ExpectedValue::sensing(RFC_EXPECTED_US));
        }
        if product_type.starts_with("WV_") && matches!(level(product_type), Some('0') | Some('2')) {
            return Some(ExpectedValue::sensing(
                datatake.l0_sensing_duration.unwrap_or(0).max(0),
            ));
        }
        None
    }

    pub fn observed_kind(&self) -> ExpectedKind {
        ExpectedKind::Sensing
    }

    fn datatake_mode(datatake: &Datatake, product_type: &str) -> Option<&'static str> {
        match datatake.instrument_mode.as_deref() {
            Some(mode) => known_mode(mode),
            None => mode_from_product_type(product_type),
        }
    }

    /// Mask gating a product type in the datatake's mode, if any.
    fn gating_mask(datatake: &Datatake, product_type: &str) -> Option<&'static str> {
        match (Self::datatake_mode(datatake, product_type)?, family(product_type)?) {
            ("EW", "OCN") => Some(OCEAN_MASK),
            ("EW", "SLC") => Some(SLC_MASK),
            ("IW" | "SM", "OCN") => Some(OCEAN_MASK),
            _ => None,
        }
    }

    fn threshold(&self, mask: &str) -> f64 {
        self.thresholds
            .get(mask)
            .copied()
            .unwrap_or(DEFAULT_AREA_THRESHOLD)
    }

    /// Whether the datatake's footprint covers enough of the mask gating
    /// this product type. Ungated families are never produced over an area.
    pub fn is_over_specific_area(
        &self,
        datatake: &Datatake,
        product_type: &str,
    ) -> Result<bool, GeometryError> {
        let Some(mask) = Self::gating_mask(datatake, product_type) else {
            return Ok(false);
        };
        let Some(footprint) = datatake.footprint.as_deref() else {
            debug!(datatake = %datatake.datatake_id, "no footprint, area check fails");
            return Ok(false);
        };
        let coverage = self.masks.coverage(footprint, mask)?;
        Ok(coverage >= self.threshold(mask))
    }

    /// Keys whose completeness depends on `key`.
    ///
    /// SLC feeds the ETA product of the same mode. A level-0 RAW product is
    /// the reference for the SLC and OCN types that the datatake's area
    /// makes eligible.
    pub fn impacted_keys(
        &self,
        key: &ComputeKey,
        datatake: Option<&Datatake>,
    ) -> Result<Vec<ComputeKey>, GeometryError> {
        let product_type = key.product_type.as_str();
        let (Some(prefix), Some(family)) = (prefix(product_type), family(product_type)) else {
            return Ok(Vec::new());
        };

        match family {
            "SLC" => Ok(vec![key.for_product_type(format!("{}_ETA__AX", prefix))]),
            "RAW" if level(product_type) == Some('0') => {
                let Some(datatake) = datatake else {
                    return Ok(Vec::new());
                };
                let Some(polarisation) = product_type.chars().last() else {
                    return Ok(Vec::new());
                };
                let mut impacted = Vec::new();
                for candidate in [
                    format!("{}_SLC__1{}", prefix, polarisation),
                    format!("{}_OCN__2{}", prefix, polarisation),
                ] {
                    if self.is_over_specific_area(datatake, &candidate)? {
                        impacted.push(key.for_product_type(candidate));
                    }
                }
                Ok(impacted)
            }
            _ => Ok(Vec::new()),
        }
    }
}
