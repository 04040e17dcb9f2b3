//! # Datatake Completeness Core
//!
//! Shared, runtime-free logic for the completeness consolidation engine:
//! data models, geo mask intersection, per-mission rules, the completeness
//! aggregator and the cascade scheduler.
//!
//! This crate contains no tokio, sqlx, filesystem or network I/O. Storage
//! and tile search are reached through the [`store::DocumentStore`] and
//! [`tiles::TileLookup`] traits, implemented by the application crate.
//!
//! ## Flow
//!
//! ```text
//! product event ──▶ MissionStrategy::derive_compute_key
//!                          │
//!                          ▼
//!                  CascadeScheduler::run ◀──────────────┐
//!                          │                            │
//!                          ▼                            │
//!                  Aggregator::recompute ──▶ upsert     │
//!                          │                            │
//!                          ▼                            │
//!                  MissionStrategy::impacted_keys ──────┘
//! ```

pub mod aggregate;
pub mod cascade;
pub mod error;
pub mod expected;
pub mod geomask;
pub mod mission;
pub mod models;
pub mod store;
pub mod tiles;

pub use aggregate::{Aggregator, DatatakeSummary};
pub use cascade::{CascadeReport, CascadeScheduler};
pub use error::{CompletenessError, GeometryError};
pub use mission::{MissionStrategy, Missions};
