//! Cascade scheduling.
//!
//! Recomputing one key can change the expectation of others: a level-0
//! product makes SLC and OCN products expected, an SLC product feeds ETA,
//! an S2 datastrip resolves the tile count for four tile types. The
//! scheduler walks those dependencies breadth-first, recomputing every
//! reachable key exactly once per run.
//!
//! The walk is bounded by `max_depth`: keys further than that many
//! expansions from the initial key are not visited, and the report says so.

use std::collections::{HashSet, VecDeque};

use serde::Serialize;
use tracing::{debug, warn};

use crate::aggregate::Aggregator;
use crate::error::{CompletenessError, Result};
use crate::mission::Missions;
use crate::models::{CompletenessRecord, ComputeKey, Datatake};
use crate::store::DocumentStore;

pub const DEFAULT_MAX_DEPTH: usize = 8;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CascadeReport {
    /// Records in recompute order, starting with the initial key.
    pub records: Vec<CompletenessRecord>,
    pub visited: Vec<ComputeKey>,
    /// Set when expansion stopped at the depth limit with work left.
    pub truncated: bool,
}

pub struct CascadeScheduler<'a, S: DocumentStore + ?Sized> {
    aggregator: Aggregator<'a, S>,
    max_depth: usize,
}

impl<'a, S: DocumentStore + ?Sized> CascadeScheduler<'a, S> {
    pub fn new(store: &'a S, missions: &'a Missions) -> Self {
        Self {
            aggregator: Aggregator::new(store, missions),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn aggregator(&self) -> &Aggregator<'a, S> {
        &self.aggregator
    }

    pub async fn run(&self, initial: ComputeKey) -> Result<CascadeReport> {
        let store = self.aggregator.store();
        let missions = self.aggregator.missions();

        // Expansion keeps the datatake, so one load serves the whole walk.
        let mut datatake = self.aggregator.load_datatake(&initial).await?;
        let mut persisted = datatake.clone();

        let mut report = CascadeReport::default();
        let mut seen: HashSet<ComputeKey> = HashSet::new();
        let mut queue: VecDeque<(ComputeKey, usize)> = VecDeque::new();
        seen.insert(initial.clone());
        queue.push_back((initial, 0));

        while let Some((key, depth)) = queue.pop_front() {
            let record = self.aggregator.recompute_with(&key, datatake.as_mut()).await?;
            let impacted = missions
                .get(key.mission)
                .impacted_keys(&key, datatake.as_mut())
                .await?;
            persist_if_changed(store, &datatake, &mut persisted).await?;

            report.records.push(record);
            report.visited.push(key.clone());

            let fresh: Vec<ComputeKey> = impacted
                .into_iter()
                .filter(|k| !seen.contains(k))
                .collect();
            if fresh.is_empty() {
                continue;
            }
            if depth >= self.max_depth {
                warn!(key = %key, pending = fresh.len(), max_depth = self.max_depth, "cascade depth limit reached");
                report.truncated = true;
                continue;
            }
            for next in fresh {
                debug!(from = %key, to = %next, "cascade");
                seen.insert(next.clone());
                queue.push_back((next, depth + 1));
            }
        }

        Ok(report)
    }
}

async fn persist_if_changed<S: DocumentStore + ?Sized>(
    store: &S,
    current: &Option<Datatake>,
    persisted: &mut Option<Datatake>,
) -> Result<()> {
    if current == persisted {
        return Ok(());
    }
    if let Some(datatake) = current {
        store
            .upsert_datatake(datatake)
            .await
            .map_err(CompletenessError::store)?;
    }
    *persisted = current.clone();
    Ok(())
}
