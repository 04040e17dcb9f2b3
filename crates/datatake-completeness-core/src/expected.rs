//! Static expected-value tables.
//!
//! Each table maps a product type to the amount of data a complete
//! datatake should deliver. The built-in defaults can be overridden per
//! product type from configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::ExpectedValue;

/// One full S3 orbit of sensing, in microseconds.
const S3_ORBIT_US: i64 = 6_060_000_000;
/// Dayside portion of an S3 orbit, in microseconds.
const S3_DAYSIDE_US: i64 = 2_640_000_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpectedTable {
    entries: BTreeMap<String, ExpectedValue>,
}

impl ExpectedTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, product_type: &str, value: ExpectedValue) -> Self {
        self.insert(product_type, value);
        self
    }

    pub fn insert(&mut self, product_type: &str, value: ExpectedValue) {
        self.entries.insert(product_type.to_string(), value);
    }

    /// Apply overrides on top of the current entries.
    pub fn merge(&mut self, overrides: &BTreeMap<String, ExpectedValue>) {
        for (product_type, value) in overrides {
            self.entries.insert(product_type.clone(), *value);
        }
    }

    pub fn get(&self, product_type: &str) -> Option<ExpectedValue> {
        self.entries.get(product_type).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ExpectedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Datastrip products: one per datatake. Tile products are resolved
    /// from the datatake's tile memo instead.
    pub fn s2_defaults() -> Self {
        [
            "MSI_L0__DS",
            "MSI_L1A_DS",
            "MSI_L1B_DS",
            "MSI_L1C_DS",
            "MSI_L2A_DS",
        ]
        .into_iter()
        .fold(Self::new(), |table, pt| table.with(pt, ExpectedValue::count(1)))
    }

    pub fn s3_defaults() -> Self {
        let dayside = [
            "OL_1_EFR___",
            "OL_1_ERR___",
            "OL_2_LFR___",
            "OL_2_LRR___",
            "OL_2_WFR___",
            "OL_2_WRR___",
            "SY_2_SYN___",
            "SY_2_V10___",
        ];
        let full_orbit = [
            "SL_1_RBT___",
            "SL_2_LST___",
            "SL_2_WST___",
            "SL_2_FRP___",
            "SR_1_SRA___",
            "SR_1_SRA_A_",
            "SR_2_LAN___",
            "SR_2_WAT___",
            "MW_1_MWR___",
        ];
        let table = dayside
            .into_iter()
            .fold(Self::new(), |t, pt| t.with(pt, ExpectedValue::sensing(S3_DAYSIDE_US)));
        full_orbit
            .into_iter()
            .fold(table, |t, pt| t.with(pt, ExpectedValue::sensing(S3_ORBIT_US)))
    }

    /// One product per orbit for every distributed level-1B and level-2 type.
    pub fn s5_defaults() -> Self {
        [
            "L1B_RA_BD1",
            "L1B_RA_BD2",
            "L1B_RA_BD3",
            "L1B_RA_BD4",
            "L1B_RA_BD5",
            "L1B_RA_BD6",
            "L1B_RA_BD7",
            "L1B_RA_BD8",
            "L1B_IR_UVN",
            "L1B_IR_SIR",
            "L2__O3____",
            "L2__O3_TCL",
            "L2__NO2___",
            "L2__SO2___",
            "L2__CO____",
            "L2__CH4___",
            "L2__HCHO__",
            "L2__CLOUD_",
            "L2__AER_AI",
            "L2__AER_LH",
            "L2__FRESCO",
            "L2__NP_BD3",
            "L2__NP_BD6",
            "L2__NP_BD7",
        ]
        .into_iter()
        .fold(Self::new(), |table, pt| table.with(pt, ExpectedValue::count(1)))
    }
}
