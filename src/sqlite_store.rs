//! SQLite-backed [`DocumentStore`] implementation.
//!
//! Datatakes are stored as JSON bodies so the acquisition-plan fields and the
//! tile memo travel together. Products and completeness records are stored
//! column-wise so sibling and status queries can filter in SQL.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use datatake_completeness_core::models::{
    CompletenessRecord, CompletenessStatus, Datatake, ExpectedKind, Mission, SiblingProduct,
};
use datatake_completeness_core::store::{DocumentStore, SiblingQuery};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_micros(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_micros())
}

fn from_micros(us: Option<i64>) -> Option<DateTime<Utc>> {
    us.and_then(DateTime::from_timestamp_micros)
}

fn product_from_row(row: &SqliteRow) -> Result<SiblingProduct> {
    Ok(SiblingProduct {
        name: row.try_get("name")?,
        datatake_id: row.try_get("datatake_id")?,
        satellite_unit: row.try_get("satellite_unit")?,
        product_type: row.try_get("product_type")?,
        timeliness: row.try_get("timeliness")?,
        service_id: row.try_get("service_id")?,
        service_type: row.try_get("service_type")?,
        sensing_start: from_micros(row.try_get("sensing_start")?),
        sensing_stop: from_micros(row.try_get("sensing_stop")?),
        sensing_duration: row.try_get("sensing_duration")?,
        size: row.try_get("size")?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<CompletenessRecord> {
    let mission: String = row.try_get("mission")?;
    let expected_kind: Option<String> = row.try_get("expected_kind")?;
    let status: String = row.try_get("status")?;
    Ok(CompletenessRecord {
        key: row.try_get("key")?,
        mission: mission.parse::<Mission>().map_err(|e| anyhow!(e))?,
        satellite_unit: row.try_get("satellite_unit")?,
        datatake_id: row.try_get("datatake_id")?,
        product_type: row.try_get("product_type")?,
        qualifier: row.try_get("qualifier")?,
        expected_kind: expected_kind
            .map(|k| k.parse::<ExpectedKind>())
            .transpose()
            .map_err(|e| anyhow!(e))?,
        expected: row.try_get("expected")?,
        value: row.try_get("value")?,
        value_adjusted: row.try_get("value_adjusted")?,
        percentage: row.try_get("percentage")?,
        status: status
            .parse::<CompletenessStatus>()
            .map_err(|e| anyhow!(e))?,
    })
}

const RECORD_COLUMNS: &str = "satellite_unit, key, mission, datatake_id, product_type, qualifier, \
     expected_kind, expected, value, value_adjusted, percentage, status";

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert_product(&self, product: &SiblingProduct) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (name, datatake_id, satellite_unit, product_type, timeliness,
                                  service_id, service_type, sensing_start, sensing_stop,
                                  sensing_duration, size, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                datatake_id = excluded.datatake_id,
                satellite_unit = excluded.satellite_unit,
                product_type = excluded.product_type,
                timeliness = excluded.timeliness,
                service_id = excluded.service_id,
                service_type = excluded.service_type,
                sensing_start = excluded.sensing_start,
                sensing_stop = excluded.sensing_stop,
                sensing_duration = excluded.sensing_duration,
                size = excluded.size,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.datatake_id)
        .bind(&product.satellite_unit)
        .bind(&product.product_type)
        .bind(&product.timeliness)
        .bind(&product.service_id)
        .bind(&product.service_type)
        .bind(to_micros(product.sensing_start))
        .bind(to_micros(product.sensing_stop))
        .bind(product.sensing_duration)
        .bind(product.size)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_siblings(&self, query: &SiblingQuery) -> Result<Vec<SiblingProduct>> {
        let rows = sqlx::query(
            r#"
            SELECT name, datatake_id, satellite_unit, product_type, timeliness, service_id,
                   service_type, sensing_start, sensing_stop, sensing_duration, size
            FROM products
            WHERE datatake_id = ? AND satellite_unit = ? AND product_type = ?
              AND (? IS NULL OR timeliness = ?)
              AND (? IS NULL OR service_id = ?)
              AND (? IS NULL OR service_type = ?)
            ORDER BY name
            "#,
        )
        .bind(&query.datatake_id)
        .bind(&query.satellite_unit)
        .bind(&query.product_type)
        .bind(&query.timeliness)
        .bind(&query.timeliness)
        .bind(&query.service_id)
        .bind(&query.service_id)
        .bind(&query.service_type)
        .bind(&query.service_type)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(product_from_row).collect()
    }

    async fn get_datatake(
        &self,
        satellite_unit: &str,
        datatake_id: &str,
    ) -> Result<Option<Datatake>> {
        let body: Option<String> = sqlx::query_scalar(
            "SELECT body FROM datatakes WHERE satellite_unit = ? AND datatake_id = ?",
        )
        .bind(satellite_unit)
        .bind(datatake_id)
        .fetch_optional(&self.pool)
        .await?;

        body.map(|b| serde_json::from_str(&b).map_err(anyhow::Error::from))
            .transpose()
    }

    async fn upsert_datatake(&self, datatake: &Datatake) -> Result<()> {
        let body = serde_json::to_string(datatake)?;
        sqlx::query(
            r#"
            INSERT INTO datatakes (satellite_unit, datatake_id, body, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(satellite_unit, datatake_id) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&datatake.satellite_unit)
        .bind(&datatake.datatake_id)
        .bind(&body)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_completeness(&self, record: &CompletenessRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO completeness (satellite_unit, key, mission, datatake_id, product_type,
                                      qualifier, expected_kind, expected, value, value_adjusted,
                                      percentage, status, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(satellite_unit, key) DO UPDATE SET
                mission = excluded.mission,
                datatake_id = excluded.datatake_id,
                product_type = excluded.product_type,
                qualifier = excluded.qualifier,
                expected_kind = excluded.expected_kind,
                expected = excluded.expected,
                value = excluded.value,
                value_adjusted = excluded.value_adjusted,
                percentage = excluded.percentage,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&record.satellite_unit)
        .bind(&record.key)
        .bind(record.mission.as_str())
        .bind(&record.datatake_id)
        .bind(&record.product_type)
        .bind(&record.qualifier)
        .bind(record.expected_kind.map(|k| k.as_str()))
        .bind(record.expected)
        .bind(record.value)
        .bind(record.value_adjusted)
        .bind(record.percentage)
        .bind(record.status.as_str())
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_completeness(
        &self,
        satellite_unit: &str,
        key: &str,
    ) -> Result<Option<CompletenessRecord>> {
        let sql = format!(
            "SELECT {} FROM completeness WHERE satellite_unit = ? AND key = ?",
            RECORD_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(satellite_unit)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_completeness(
        &self,
        satellite_unit: &str,
        datatake_id: &str,
    ) -> Result<Vec<CompletenessRecord>> {
        let sql = format!(
            "SELECT {} FROM completeness WHERE satellite_unit = ? AND datatake_id = ? ORDER BY key",
            RECORD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(satellite_unit)
            .bind(datatake_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }
}
