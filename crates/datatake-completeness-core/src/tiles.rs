//! Expected tile search.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Datatake;

/// Resolves which tiles a datatake is expected to produce.
///
/// Implementations may be slow (a remote catalogue); callers memoize the
/// resulting count on the datatake.
#[async_trait]
pub trait TileLookup: Send + Sync {
    /// Identifiers of the expected tiles. Duplicates are tolerated.
    async fn search_expected_tiles(&self, datatake: &Datatake) -> Result<Vec<String>>;
}
