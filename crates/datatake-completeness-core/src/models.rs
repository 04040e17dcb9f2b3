//! Core data models.
//!
//! These types flow through the whole engine: product events arrive from
//! the inbox, are keyed by a mission strategy, and end up as
//! [`CompletenessRecord`]s in the document store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Satellite mission family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mission {
    S1,
    S2,
    S3,
    S5,
}

impl Mission {
    pub const ALL: [Mission; 4] = [Mission::S1, Mission::S2, Mission::S3, Mission::S5];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mission::S1 => "S1",
            Mission::S2 => "S2",
            Mission::S3 => "S3",
            Mission::S5 => "S5",
        }
    }

    /// Resolve a mission from a mission code (`"S2"`), a satellite unit
    /// (`"S1A"`, `"S5P"`) or any identifier carrying that prefix.
    pub fn from_code(code: &str) -> Option<Self> {
        let prefix = code.trim().get(..2)?.to_ascii_uppercase();
        match prefix.as_str() {
            "S1" => Some(Mission::S1),
            "S2" => Some(Mission::S2),
            "S3" => Some(Mission::S3),
            "S5" => Some(Mission::S5),
            _ => None,
        }
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mission::from_code(s).ok_or_else(|| format!("unknown mission '{}'", s))
    }
}

/// Sensing duration in microseconds: the explicit value wins, otherwise
/// `stop - start` when both ends are known and ordered.
pub fn sensing_duration_us(
    explicit: Option<i64>,
    start: Option<DateTime<Utc>>,
    stop: Option<DateTime<Utc>>,
) -> Option<i64> {
    explicit.or_else(|| match (start, stop) {
        (Some(start), Some(stop)) if stop >= start => (stop - start).num_microseconds(),
        _ => None,
    })
}

/// A product publication observed on a distribution interface.
///
/// Every field except `name` is optional: collectors forward whatever the
/// interface exposed, and the mission strategies decide what is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductEvent {
    pub name: String,
    pub mission: Option<String>,
    pub satellite_unit: Option<String>,
    pub datatake_id: Option<String>,
    pub product_type: Option<String>,
    pub instrument_mode: Option<String>,
    pub timeliness: Option<String>,
    pub absolute_orbit: Option<i64>,
    pub sensing_start: Option<DateTime<Utc>>,
    pub sensing_stop: Option<DateTime<Utc>>,
    /// Microseconds.
    pub sensing_duration: Option<i64>,
    pub size: Option<i64>,
    pub service_id: Option<String>,
    pub service_type: Option<String>,
    pub publication_date: Option<DateTime<Utc>>,
}

impl ProductEvent {
    /// Mission from the explicit field, falling back to the satellite unit
    /// and then to the product name prefix.
    pub fn mission(&self) -> Option<Mission> {
        self.mission
            .as_deref()
            .and_then(Mission::from_code)
            .or_else(|| self.satellite_unit.as_deref().and_then(Mission::from_code))
            .or_else(|| Mission::from_code(&self.name))
    }

    pub fn sensing_duration_us(&self) -> Option<i64> {
        sensing_duration_us(self.sensing_duration, self.sensing_start, self.sensing_stop)
    }
}

/// Stored projection of a product, as returned by sibling queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiblingProduct {
    pub name: String,
    pub datatake_id: String,
    pub satellite_unit: String,
    pub product_type: String,
    pub timeliness: Option<String>,
    pub service_id: Option<String>,
    pub service_type: Option<String>,
    pub sensing_start: Option<DateTime<Utc>>,
    pub sensing_stop: Option<DateTime<Utc>>,
    pub sensing_duration: Option<i64>,
    pub size: Option<i64>,
}

impl SiblingProduct {
    /// Project an event for storage. Returns `None` when the event cannot
    /// be correlated to a datatake.
    pub fn from_event(event: &ProductEvent) -> Option<Self> {
        Some(Self::project(
            event,
            event.satellite_unit.clone()?,
            event.datatake_id.clone()?,
            event.product_type.clone()?,
        ))
    }

    /// Project an event under the correlation fields of its compute key.
    pub fn for_key(event: &ProductEvent, key: &ComputeKey) -> Self {
        Self::project(
            event,
            key.satellite_unit.clone(),
            key.datatake_id.clone(),
            key.product_type.clone(),
        )
    }

    fn project(
        event: &ProductEvent,
        satellite_unit: String,
        datatake_id: String,
        product_type: String,
    ) -> Self {
        Self {
            name: event.name.clone(),
            datatake_id,
            satellite_unit,
            product_type,
            timeliness: event.timeliness.clone(),
            service_id: event.service_id.clone(),
            service_type: event.service_type.clone(),
            sensing_start: event.sensing_start,
            sensing_stop: event.sensing_stop,
            sensing_duration: event.sensing_duration_us(),
            size: event.size,
        }
    }

    pub fn sensing_duration_us(&self) -> Option<i64> {
        sensing_duration_us(self.sensing_duration, self.sensing_start, self.sensing_stop)
    }
}

/// Memoized number of tiles a datatake is expected to produce.
///
/// A stored zero counts as unresolved: a lookup that found no tiles is
/// retried on the next reference product. Only an explicit
/// [`invalidate`](Self::invalidate) clears a positive count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileCountCache(Option<u32>);

impl TileCountCache {
    pub fn get(&self) -> Option<u32> {
        self.0
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.0, Some(n) if n > 0)
    }

    pub fn memoize(&mut self, count: u32) {
        self.0 = Some(count);
    }

    pub fn invalidate(&mut self) {
        self.0 = None;
    }
}

/// A datatake: one continuous acquisition by a satellite unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datatake {
    pub satellite_unit: String,
    pub datatake_id: String,
    #[serde(default)]
    pub instrument_mode: Option<String>,
    #[serde(default)]
    pub absolute_orbit: Option<i64>,
    #[serde(default)]
    pub sensing_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sensing_stop: Option<DateTime<Utc>>,
    /// Microseconds of level-0 sensing reported by the acquisition plan.
    #[serde(default)]
    pub l0_sensing_duration: Option<i64>,
    /// Microseconds of planned observation.
    #[serde(default)]
    pub observation_duration: Option<i64>,
    /// Exterior ring as `[lon, lat]` pairs.
    #[serde(default)]
    pub footprint: Option<Vec<[f64; 2]>>,
    #[serde(default, rename = "number_of_expected_tiles")]
    pub expected_tiles: TileCountCache,
}

impl Datatake {
    pub fn new(satellite_unit: impl Into<String>, datatake_id: impl Into<String>) -> Self {
        Self {
            satellite_unit: satellite_unit.into(),
            datatake_id: datatake_id.into(),
            instrument_mode: None,
            absolute_orbit: None,
            sensing_start: None,
            sensing_stop: None,
            l0_sensing_duration: None,
            observation_duration: None,
            footprint: None,
            expected_tiles: TileCountCache::default(),
        }
    }

    /// Fill fields the datatake does not know yet from a product that
    /// references it. Returns whether anything changed.
    pub fn fill_missing_from(&mut self, event: &ProductEvent) -> bool {
        let before = self.clone();
        if self.instrument_mode.is_none() {
            self.instrument_mode = event.instrument_mode.clone();
        }
        if self.absolute_orbit.is_none() {
            self.absolute_orbit = event.absolute_orbit;
        }
        if self.sensing_start.is_none() {
            self.sensing_start = event.sensing_start;
        }
        if self.sensing_stop.is_none() {
            self.sensing_stop = event.sensing_stop;
        }
        *self != before
    }

    pub fn mission(&self) -> Option<Mission> {
        Mission::from_code(&self.satellite_unit)
    }

    /// Merge the fields present in `update`. The tile memo is never touched.
    pub fn refine(&mut self, update: &DatatakeUpdate) {
        if update.instrument_mode.is_some() {
            self.instrument_mode = update.instrument_mode.clone();
        }
        if update.absolute_orbit.is_some() {
            self.absolute_orbit = update.absolute_orbit;
        }
        if update.sensing_start.is_some() {
            self.sensing_start = update.sensing_start;
        }
        if update.sensing_stop.is_some() {
            self.sensing_stop = update.sensing_stop;
        }
        if update.l0_sensing_duration.is_some() {
            self.l0_sensing_duration = update.l0_sensing_duration;
        }
        if update.observation_duration.is_some() {
            self.observation_duration = update.observation_duration;
        }
        if update.footprint.is_some() {
            self.footprint = update.footprint.clone();
        }
    }
}

/// Acquisition-plan information about a datatake, as delivered by the inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatatakeUpdate {
    pub satellite_unit: String,
    pub datatake_id: String,
    #[serde(default)]
    pub instrument_mode: Option<String>,
    #[serde(default)]
    pub absolute_orbit: Option<i64>,
    #[serde(default)]
    pub sensing_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sensing_stop: Option<DateTime<Utc>>,
    #[serde(default)]
    pub l0_sensing_duration: Option<i64>,
    #[serde(default)]
    pub observation_duration: Option<i64>,
    #[serde(default)]
    pub footprint: Option<Vec<[f64; 2]>>,
}

/// Identity of one completeness record.
///
/// `qualifier` is a mission-specific third component: the timeliness for
/// S3, an opaque pass-through value for S1/S2, unused for S5.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComputeKey {
    pub mission: Mission,
    pub satellite_unit: String,
    pub datatake_id: String,
    pub product_type: String,
    pub qualifier: Option<String>,
}

impl ComputeKey {
    pub fn new(
        mission: Mission,
        satellite_unit: impl Into<String>,
        datatake_id: impl Into<String>,
        product_type: impl Into<String>,
    ) -> Self {
        Self {
            mission,
            satellite_unit: satellite_unit.into(),
            datatake_id: datatake_id.into(),
            product_type: product_type.into(),
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Same datatake and qualifier, different product type.
    pub fn for_product_type(&self, product_type: impl Into<String>) -> Self {
        Self {
            product_type: product_type.into(),
            ..self.clone()
        }
    }

    /// Record identifier, unique within a satellite unit.
    pub fn record_id(&self) -> String {
        match (self.mission, &self.qualifier) {
            (Mission::S5, _) => format!("{}-{}", self.datatake_id, self.product_type),
            (_, Some(q)) => format!("{}#{}#{}", self.datatake_id, self.product_type, q),
            (_, None) => format!("{}#{}", self.datatake_id, self.product_type),
        }
    }
}

impl From<&CompletenessRecord> for ComputeKey {
    fn from(record: &CompletenessRecord) -> Self {
        Self {
            mission: record.mission,
            satellite_unit: record.satellite_unit.clone(),
            datatake_id: record.datatake_id.clone(),
            product_type: record.product_type.clone(),
            qualifier: record.qualifier.clone(),
        }
    }
}

impl fmt::Display for ComputeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.satellite_unit, self.record_id())
    }
}

/// Unit of an expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedKind {
    /// Sensing time in microseconds.
    Sensing,
    /// Number of products.
    Count,
    /// Number of tiles, taken from the datatake's tile memo.
    Tiles,
}

impl ExpectedKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedKind::Sensing => "sensing",
            ExpectedKind::Count => "count",
            ExpectedKind::Tiles => "tiles",
        }
    }
}

impl FromStr for ExpectedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensing" => Ok(ExpectedKind::Sensing),
            "count" => Ok(ExpectedKind::Count),
            "tiles" => Ok(ExpectedKind::Tiles),
            other => Err(format!("unknown expected kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedValue {
    pub kind: ExpectedKind,
    pub value: i64,
}

impl ExpectedValue {
    pub fn sensing(us: i64) -> Self {
        Self {
            kind: ExpectedKind::Sensing,
            value: us,
        }
    }

    pub fn count(n: i64) -> Self {
        Self {
            kind: ExpectedKind::Count,
            value: n,
        }
    }

    pub fn tiles(n: i64) -> Self {
        Self {
            kind: ExpectedKind::Tiles,
            value: n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletenessStatus {
    Missing,
    Partial,
    Complete,
    Unknown,
}

impl CompletenessStatus {
    /// Status for a percentage already clamped to `[0, 100]`.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage <= 0.0 {
            CompletenessStatus::Missing
        } else if percentage >= 100.0 {
            CompletenessStatus::Complete
        } else {
            CompletenessStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletenessStatus::Missing => "Missing",
            CompletenessStatus::Partial => "Partial",
            CompletenessStatus::Complete => "Complete",
            CompletenessStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for CompletenessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletenessStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Missing" => Ok(CompletenessStatus::Missing),
            "Partial" => Ok(CompletenessStatus::Partial),
            "Complete" => Ok(CompletenessStatus::Complete),
            "Unknown" => Ok(CompletenessStatus::Unknown),
            other => Err(format!("unknown completeness status '{}'", other)),
        }
    }
}

/// Persisted completeness of one compute key.
///
/// Carries no timestamps so that recomputing an unchanged key produces an
/// identical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessRecord {
    pub key: String,
    pub mission: Mission,
    pub satellite_unit: String,
    pub datatake_id: String,
    pub product_type: String,
    pub qualifier: Option<String>,
    pub expected_kind: Option<ExpectedKind>,
    pub expected: Option<i64>,
    pub value: i64,
    pub value_adjusted: Option<i64>,
    pub percentage: Option<f64>,
    pub status: CompletenessStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mission_from_unit_and_code() {
        assert_eq!(Mission::from_code("S1A"), Some(Mission::S1));
        assert_eq!(Mission::from_code("s5p"), Some(Mission::S5));
        assert_eq!(Mission::from_code("S2"), Some(Mission::S2));
        assert_eq!(Mission::from_code("L8"), None);
        assert_eq!(Mission::from_code("S"), None);
        assert!("S4".parse::<Mission>().is_err());
    }

    #[test]
    fn product_mission_falls_back_to_unit_then_name() {
        let mut event = ProductEvent {
            name: "S3B_OL_1_EFR____20240101T000000".to_string(),
            ..Default::default()
        };
        assert_eq!(event.mission(), Some(Mission::S3));
        event.satellite_unit = Some("S1A".to_string());
        assert_eq!(event.mission(), Some(Mission::S1));
        event.mission = Some("S2".to_string());
        assert_eq!(event.mission(), Some(Mission::S2));
    }

    #[test]
    fn duration_prefers_explicit_value() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 25).unwrap();
        assert_eq!(sensing_duration_us(None, Some(start), Some(stop)), Some(25_000_000));
        assert_eq!(sensing_duration_us(Some(7), Some(start), Some(stop)), Some(7));
        assert_eq!(sensing_duration_us(None, Some(stop), Some(start)), None);
        assert_eq!(sensing_duration_us(None, Some(start), None), None);
    }

    #[test]
    fn record_id_per_mission() {
        let s1 = ComputeKey::new(Mission::S1, "S1A", "4F2A1", "EW_SLC__1S");
        assert_eq!(s1.record_id(), "4F2A1#EW_SLC__1S");
        assert_eq!(s1.clone().with_qualifier("x").record_id(), "4F2A1#EW_SLC__1S#x");

        let s3 = ComputeKey::new(Mission::S3, "S3A", "123", "OL_1_EFR___").with_qualifier("NR");
        assert_eq!(s3.record_id(), "123#OL_1_EFR___#NR");

        let s5 = ComputeKey::new(Mission::S5, "S5P", "33001", "L2__O3____");
        assert_eq!(s5.record_id(), "33001-L2__O3____");
        assert_eq!(s5.to_string(), "S5P/33001-L2__O3____");
    }

    #[test]
    fn refine_keeps_tile_memo() {
        let mut dt = Datatake::new("S2A", "S2A-36678-7");
        dt.expected_tiles.memoize(12);
        dt.refine(&DatatakeUpdate {
            satellite_unit: "S2A".into(),
            datatake_id: "S2A-36678-7".into(),
            instrument_mode: Some("NOBS".into()),
            absolute_orbit: Some(36678),
            sensing_start: None,
            sensing_stop: None,
            l0_sensing_duration: None,
            observation_duration: Some(10),
            footprint: None,
        });
        assert_eq!(dt.expected_tiles.get(), Some(12));
        assert_eq!(dt.instrument_mode.as_deref(), Some("NOBS"));
        assert_eq!(dt.observation_duration, Some(10));
    }

    #[test]
    fn product_fills_only_unknown_fields() {
        let mut dt = Datatake::new("S1A", "4F2A1");
        dt.instrument_mode = Some("EW".into());
        let event = ProductEvent {
            name: "p".into(),
            instrument_mode: Some("IW".into()),
            absolute_orbit: Some(51234),
            ..Default::default()
        };
        assert!(dt.fill_missing_from(&event));
        assert_eq!(dt.instrument_mode.as_deref(), Some("EW"));
        assert_eq!(dt.absolute_orbit, Some(51234));
        assert!(!dt.fill_missing_from(&event));
    }

    #[test]
    fn tile_memo_zero_is_unresolved() {
        let mut memo = TileCountCache::default();
        assert!(!memo.is_resolved());
        memo.memoize(0);
        assert!(!memo.is_resolved());
        memo.memoize(3);
        assert!(memo.is_resolved());
        memo.invalidate();
        assert_eq!(memo.get(), None);
    }

    #[test]
    fn status_boundaries() {
        assert_eq!(CompletenessStatus::from_percentage(0.0), CompletenessStatus::Missing);
        assert_eq!(CompletenessStatus::from_percentage(0.01), CompletenessStatus::Partial);
        assert_eq!(CompletenessStatus::from_percentage(99.99), CompletenessStatus::Partial);
        assert_eq!(CompletenessStatus::from_percentage(100.0), CompletenessStatus::Complete);
    }

    #[test]
    fn datatake_json_uses_memo_field_name() {
        let json = r#"{"satellite_unit":"S2B","datatake_id":"S2B-1-1","number_of_expected_tiles":4}"#;
        let dt: Datatake = serde_json::from_str(json).unwrap();
        assert_eq!(dt.expected_tiles.get(), Some(4));
        assert!(dt.footprint.is_none());
    }
}
