//! Datatake status report.
//!
//! Prints every completeness record of a datatake followed by a roll-up,
//! as used by `dtc status`.

use anyhow::Result;

use datatake_completeness_core::store::DocumentStore;
use datatake_completeness_core::DatatakeSummary;

use crate::config::Config;
use crate::engine::Engine;
use crate::recompute::format_record;

pub async fn run_status(config: &Config, satellite_unit: &str, datatake_id: &str) -> Result<()> {
    let engine = Engine::open(config).await?;

    let datatake = engine.store.get_datatake(satellite_unit, datatake_id).await?;
    let records = engine
        .store
        .list_completeness(satellite_unit, datatake_id)
        .await?;

    println!("Datatake {}/{}", satellite_unit, datatake_id);
    match &datatake {
        Some(dt) => {
            println!(
                "  mode: {}  orbit: {}  tiles: {}",
                dt.instrument_mode.as_deref().unwrap_or("-"),
                dt.absolute_orbit
                    .map(|o| o.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                dt.expected_tiles
                    .get()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
        None => println!("  (no datatake document)"),
    }
    println!();

    if records.is_empty() {
        println!("No completeness records.");
        engine.close().await;
        return Ok(());
    }

    for record in &records {
        println!("  {}", format_record(record));
    }

    let summary = DatatakeSummary::from_records(&records);
    println!();
    println!(
        "  {} records, {} with expectation, overall {} ({})",
        summary.records,
        summary.known,
        summary
            .percentage
            .map(|p| format!("{:.1}%", p))
            .unwrap_or_else(|| "-".to_string()),
        summary.status
    );

    engine.close().await;
    Ok(())
}
