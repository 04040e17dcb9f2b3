//! # Datatake Completeness
//!
//! Consolidates the completeness of satellite datatakes from a stream of
//! product and acquisition-plan events.
//!
//! Products published for a datatake are grouped by compute key (datatake,
//! product type and an optional qualifier). For each key the engine derives
//! an expected value from mission rules, aggregates what has been observed
//! and stores a completeness record. Keys that depend on one another are
//! recomputed in cascade.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────┐   ┌──────────┐
//! │   Inbox     │──▶│ Mission rules +  │──▶│  SQLite   │
//! │ JSON/JSONL  │   │ cascade recompute│   │ records   │
//! └─────────────┘   └────────┬─────────┘   └────┬─────┘
//!                            │                  │
//!                  ┌─────────┴───┐              ▼
//!                  ▼             ▼         ┌──────────┐
//!             ┌─────────┐  ┌──────────┐    │   CLI    │
//!             │GeoMasks │  │Tile search│   │  (dtc)   │
//!             └─────────┘  └──────────┘    └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dtc init                          # create database
//! dtc ingest                        # consume the inbox
//! dtc status S1A 4F2A1              # completeness of one datatake
//! dtc recompute S1 S1A 4F2A1 IW_RAW__0S
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document store |
//! | [`inbox`] | Event file scanning |
//! | [`ingest`] | Ingestion pipeline |
//! | [`engine`] | Store, missions and scheduler wiring |
//! | [`masks`] | GeoJSON mask loading |
//! | [`tiles`] | HTTP tile search |
//! | [`recompute`] | On-demand recomputation |
//! | [`status`] | Datatake status report |

pub mod config;
pub mod db;
pub mod engine;
pub mod inbox;
pub mod ingest;
pub mod masks;
pub mod migrate;
pub mod recompute;
pub mod sqlite_store;
pub mod status;
pub mod tiles;

pub use datatake_completeness_core as core;
