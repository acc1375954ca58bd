use crate::errors::Result;
use crate::model::{DeviceLink, SensorReading};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use telemetry::{DeviceLinkRecord, RecordStore, StoreError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upper bound on rows pulled for one chart series
const MAX_SERIES_ROWS: i64 = 200_000;

pub async fn make_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await?;

    info!("Database connection established");
    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Device-user association table backed by Postgres.
///
/// Re-linking an existing (user, device) pair upserts instead of failing.
#[derive(Debug, Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn links_for_user(&self, user_id: &str) -> Result<Vec<DeviceLink>> {
        let links = sqlx::query_as::<_, DeviceLink>(
            r#"
            SELECT id, user_id, device_id, device_type, device_name, linked_at
            FROM device_links
            WHERE user_id = $1
            ORDER BY linked_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(links)
    }
}

impl RecordStore for PgLinkStore {
    type Record = DeviceLink;

    async fn insert(&self, record: DeviceLinkRecord) -> std::result::Result<DeviceLink, StoreError> {
        let query = r#"
            INSERT INTO device_links (id, user_id, device_id, device_type, device_name)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, device_id) DO UPDATE
            SET device_type = COALESCE(EXCLUDED.device_type, device_links.device_type),
                device_name = COALESCE(EXCLUDED.device_name, device_links.device_name)
            RETURNING id, user_id, device_id, device_type, device_name, linked_at
            "#;

        sqlx::query_as::<_, DeviceLink>(query)
            .bind(Uuid::new_v4())
            .bind(&record.user_id)
            .bind(&record.device_id)
            .bind(&record.device_type)
            .bind(&record.device_name)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }
}

/// Readings for one device in ascending time order, optionally windowed
pub async fn fetch_readings(
    pool: &PgPool,
    device_id: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<Vec<SensorReading>> {
    let readings = sqlx::query_as::<_, SensorReading>(
        r#"
        SELECT device_id, ts AS timestamp, temperature, humidity
        FROM sensor_readings
        WHERE device_id = $1
          AND ($2::timestamptz IS NULL OR ts >= $2)
          AND ($3::timestamptz IS NULL OR ts <= $3)
        ORDER BY ts ASC
        LIMIT $4
        "#,
    )
    .bind(device_id)
    .bind(start)
    .bind(end)
    .bind(MAX_SERIES_ROWS)
    .fetch_all(pool)
    .await?;

    debug!("Fetched {} readings for device {}", readings.len(), device_id);
    Ok(readings)
}

/// Connection-class failures are reported as `service unavailable` so the
/// linker retries them; everything else keeps the driver's message.
fn store_error(err: sqlx::Error) -> StoreError {
    if is_transient_error(&err) {
        warn!("Transient database error: {}", err);
        StoreError::new(format!("service unavailable: {}", err))
    } else {
        StoreError::new(err.to_string())
    }
}

fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            code == "08000" || // connection_exception
            code == "08003" || // connection_does_not_exist
            code == "08006" || // connection_failure
            code == "57P03" || // cannot_connect_now
            code == "53300" || // too_many_connections
            code == "40001" || // serialization_failure
            code == "40P01" // deadlock_detected
        }),
        _ => false,
    }
}
