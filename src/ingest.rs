//! Ingestion pipeline.
//!
//! Reads inbox files, stores products and datatakes, and runs one cascade
//! pass per keyed product. Supports incremental runs via a checkpoint on
//! inbox file modification time.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use datatake_completeness_core::models::{
    ComputeKey, Datatake, DatatakeUpdate, ProductEvent, SiblingProduct,
};
use datatake_completeness_core::store::DocumentStore;
use datatake_completeness_core::{CascadeReport, CascadeScheduler, CompletenessError};

use crate::config::Config;
use crate::engine::Engine;
use crate::inbox::{self, InboxEvent};

const CHECKPOINT_SOURCE: &str = "inbox";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub events: u64,
    pub datatakes: u64,
    pub products_stored: u64,
    pub skipped: u64,
    pub keys_recomputed: u64,
    /// Cascades abandoned on a geometry error.
    pub failed: u64,
    pub truncated: u64,
}

impl IngestStats {
    fn add(&mut self, cascade: &Cascade) {
        match cascade {
            Cascade::Done(report) => {
                self.keys_recomputed += report.visited.len() as u64;
                if report.truncated {
                    self.truncated += 1;
                }
            }
            Cascade::Failed => self.failed += 1,
        }
    }
}

/// Outcome of one cascade pass started by an event.
#[derive(Debug, Clone)]
pub enum Cascade {
    Done(CascadeReport),
    /// A footprint could not be intersected. Store errors are not caught.
    Failed,
}

async fn cascade<S: DocumentStore + ?Sized>(
    scheduler: &CascadeScheduler<'_, S>,
    key: ComputeKey,
) -> Result<Cascade> {
    match scheduler.run(key.clone()).await {
        Ok(report) => Ok(Cascade::Done(report)),
        Err(CompletenessError::Geometry(e)) => {
            warn!(key = %key, error = %e, "geometry error, cascade abandoned");
            Ok(Cascade::Failed)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn run_ingest(
    config: &Config,
    full: bool,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    let mut files = inbox::scan_inbox(config)?;

    if dry_run {
        let mut events: Vec<InboxEvent> = files.into_iter().flat_map(|f| f.events).collect();
        if let Some(lim) = limit {
            events.truncate(lim);
        }
        let products = events
            .iter()
            .filter(|e| matches!(e, InboxEvent::Product(_)))
            .count();
        println!("ingest (dry-run)");
        println!("  events found: {}", events.len());
        println!("  product events: {}", products);
        println!("  datatake events: {}", events.len() - products);
        return Ok(());
    }

    let engine = Engine::open(config).await?;
    let pool = engine.store.pool();

    let checkpoint = if full {
        None
    } else {
        get_checkpoint(pool, CHECKPOINT_SOURCE).await?
    };
    if let Some(cp) = checkpoint {
        files.retain(|f| f.modified > cp);
    }

    let scheduler = engine.scheduler();
    let mut stats = IngestStats::default();
    let mut remaining = limit.unwrap_or(usize::MAX);
    let mut max_applied = checkpoint.unwrap_or(0);
    let mut min_pending: Option<i64> = None;

    for file in &files {
        let take = file.events.len().min(remaining);
        for event in &file.events[..take] {
            apply_event(&scheduler, event, &mut stats).await?;
        }
        remaining -= take;

        if take == file.events.len() {
            stats.skipped += file.skipped as u64;
            max_applied = max_applied.max(file.modified);
        } else {
            // Partially applied files are replayed from the start next run.
            min_pending = Some(min_pending.map_or(file.modified, |m| m.min(file.modified)));
        }
    }

    let new_checkpoint = next_checkpoint(checkpoint, max_applied, min_pending);
    set_checkpoint(pool, CHECKPOINT_SOURCE, new_checkpoint).await?;

    println!("ingest");
    println!("  events: {}", stats.events);
    println!("  datatakes updated: {}", stats.datatakes);
    println!("  products stored: {}", stats.products_stored);
    println!("  skipped: {}", stats.skipped);
    println!("  keys recomputed: {}", stats.keys_recomputed);
    if stats.failed > 0 {
        println!("  keys failed: {}", stats.failed);
    }
    if stats.truncated > 0 {
        println!("  cascades truncated: {}", stats.truncated);
    }
    println!("  checkpoint: {}", new_checkpoint);
    println!("ok");

    engine.close().await;
    Ok(())
}

pub async fn apply_event<S: DocumentStore + ?Sized>(
    scheduler: &CascadeScheduler<'_, S>,
    event: &InboxEvent,
    stats: &mut IngestStats,
) -> Result<()> {
    stats.events += 1;
    match event {
        InboxEvent::Datatake(update) => {
            for cascade in ingest_datatake(scheduler, update).await? {
                stats.add(&cascade);
            }
            stats.datatakes += 1;
        }
        InboxEvent::Product(product) => {
            let (stored, cascade) = ingest_product(scheduler, product).await?;
            if stored {
                stats.products_stored += 1;
            }
            match cascade {
                Some(cascade) => stats.add(&cascade),
                None => stats.skipped += 1,
            }
        }
    }
    Ok(())
}

/// Store a product and recompute its key.
///
/// Returns whether the product was stored and the cascade outcome, if the
/// product was keyed.
pub async fn ingest_product<S: DocumentStore + ?Sized>(
    scheduler: &CascadeScheduler<'_, S>,
    product: &ProductEvent,
) -> Result<(bool, Option<Cascade>)> {
    let store = scheduler.aggregator().store();
    let missions = scheduler.aggregator().missions();

    if product.name.is_empty() {
        warn!("skipping product event without a name");
        return Ok((false, None));
    }

    let Some(key) = missions.derive_compute_key(product) else {
        // Untracked types are kept so the product collection stays complete.
        let stored = match SiblingProduct::from_event(product) {
            Some(projection) => {
                store.upsert_product(&projection).await?;
                true
            }
            None => false,
        };
        debug!(product = %product.name, "no compute key");
        return Ok((stored, None));
    };

    store
        .upsert_product(&SiblingProduct::for_key(product, &key))
        .await?;

    let existing = store
        .get_datatake(&key.satellite_unit, &key.datatake_id)
        .await?;
    let mut datatake =
        existing.clone().unwrap_or_else(|| Datatake::new(&key.satellite_unit, &key.datatake_id));
    if datatake.fill_missing_from(product) || existing.is_none() {
        store.upsert_datatake(&datatake).await?;
    }

    Ok((true, Some(cascade(scheduler, key).await?)))
}

/// Merge acquisition-plan information and recompute every record the
/// datatake already has, since their expectations may have changed.
pub async fn ingest_datatake<S: DocumentStore + ?Sized>(
    scheduler: &CascadeScheduler<'_, S>,
    update: &DatatakeUpdate,
) -> Result<Vec<Cascade>> {
    let store = scheduler.aggregator().store();

    let mut datatake = store
        .get_datatake(&update.satellite_unit, &update.datatake_id)
        .await?
        .unwrap_or_else(|| Datatake::new(&update.satellite_unit, &update.datatake_id));
    datatake.refine(update);
    store.upsert_datatake(&datatake).await?;

    let records = store
        .list_completeness(&update.satellite_unit, &update.datatake_id)
        .await?;
    let mut cascades = Vec::with_capacity(records.len());
    for record in &records {
        cascades.push(cascade(scheduler, ComputeKey::from(record)).await?);
    }
    Ok(cascades)
}

/// Newest fully applied modification time, kept strictly below every file
/// that still has unapplied events. Never moves backwards.
fn next_checkpoint(previous: Option<i64>, max_applied: i64, min_pending: Option<i64>) -> i64 {
    let capped = match min_pending {
        Some(pending) => max_applied.min(pending - 1),
        None => max_applied,
    };
    capped.max(previous.unwrap_or(0))
}

async fn get_checkpoint(pool: &SqlitePool, source: &str) -> Result<Option<i64>> {
    let result: Option<String> =
        sqlx::query_scalar("SELECT cursor FROM checkpoints WHERE source = ?")
            .bind(source)
            .fetch_optional(pool)
            .await?;

    Ok(result.and_then(|s| s.parse::<i64>().ok()))
}

async fn set_checkpoint(pool: &SqlitePool, source: &str, cursor_val: i64) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO checkpoints (source, cursor, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET cursor = excluded.cursor, updated_at = excluded.updated_at
        "#,
    )
    .bind(source)
    .bind(cursor_val.to_string())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}
