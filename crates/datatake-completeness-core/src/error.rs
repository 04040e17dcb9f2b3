//! Error types surfaced by the core engine.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Footprint or mask geometry that cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("footprint has a non-finite coordinate")]
    NonFinite,
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("footprint ring has {0} distinct points, at least 3 are required")]
    TooFewPoints(usize),
    #[error("footprint has no area after repair")]
    Degenerate,
    #[error("unknown geo mask '{0}'")]
    UnknownMask(String),
}

#[derive(Debug, Error)]
pub enum CompletenessError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("document store failure: {0}")]
    Store(#[source] BoxError),
    #[error("tile lookup failed for datatake {datatake_id}: {source}")]
    TileLookup {
        datatake_id: String,
        #[source]
        source: BoxError,
    },
}

impl CompletenessError {
    pub fn store(err: anyhow::Error) -> Self {
        CompletenessError::Store(err.into())
    }

    pub fn tile_lookup(datatake_id: &str, err: anyhow::Error) -> Self {
        CompletenessError::TileLookup {
            datatake_id: datatake_id.to_string(),
            source: err.into(),
        }
    }
}

pub type Result<T, E = CompletenessError> = std::result::Result<T, E>;
