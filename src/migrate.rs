use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Safe to run repeatedly.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Datatakes are stored as JSON documents keyed by unit and id.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS datatakes (
            satellite_unit TEXT NOT NULL,
            datatake_id TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (satellite_unit, datatake_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sensing times are microseconds since the epoch.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            name TEXT PRIMARY KEY,
            datatake_id TEXT NOT NULL,
            satellite_unit TEXT NOT NULL,
            product_type TEXT NOT NULL,
            timeliness TEXT,
            service_id TEXT,
            service_type TEXT,
            sensing_start INTEGER,
            sensing_stop INTEGER,
            sensing_duration INTEGER,
            size INTEGER,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS completeness (
            satellite_unit TEXT NOT NULL,
            key TEXT NOT NULL,
            mission TEXT NOT NULL,
            datatake_id TEXT NOT NULL,
            product_type TEXT NOT NULL,
            qualifier TEXT,
            expected_kind TEXT,
            expected INTEGER,
            value INTEGER NOT NULL,
            value_adjusted INTEGER,
            percentage REAL,
            status TEXT NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (satellite_unit, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS checkpoints (
            source TEXT PRIMARY KEY,
            cursor TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_products_siblings ON products(datatake_id, satellite_unit, product_type)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_completeness_datatake ON completeness(satellite_unit, datatake_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
