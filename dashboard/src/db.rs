use crate::errors::{Error, Result};
use crate::model::{Device, DeviceSnapshot, LogPoint, LogRow, Reading, Sample};
use crate::store::{is_on_for, LogQuery, ReadingStore, SortOrder, DEVICE_RECENT_LOGS};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

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

/// Postgres-backed store. Concurrency is left to the database.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_log_conditions(builder: &mut QueryBuilder<'_, Postgres>, query: &LogQuery) {
    builder.push(" WHERE TRUE");
    if let Some(from) = query.from {
        builder.push(" AND l.ts >= ").push_bind(from);
    }
    if let Some(until) = query.until {
        builder.push(" AND l.ts < ").push_bind(until);
    }
    if let Some(min) = query.min_watts {
        builder.push(" AND l.power_watts >= ").push_bind(min);
    }
    if let Some(room) = &query.filter.room {
        builder
            .push(" AND LOWER(d.room) = LOWER(")
            .push_bind(room.clone())
            .push(")");
    }
    if !query.filter.device_ids.is_empty() {
        builder
            .push(" AND l.device_id = ANY(")
            .push_bind(query.filter.device_ids.clone())
            .push(")");
    }
}

#[async_trait]
impl ReadingStore for PgStore {
    async fn fetch_logs(&self, query: &LogQuery) -> Result<Vec<LogRow>> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT l.id AS sample_id, l.device_id, d.name AS device_name, d.room, \
             l.ts AS timestamp, l.power_watts \
             FROM power_logs l JOIN devices d ON d.id = l.device_id",
        );
        push_log_conditions(&mut builder, query);
        builder.push(match query.order {
            SortOrder::Ascending => " ORDER BY l.ts ASC, l.id ASC",
            SortOrder::NewestFirst => " ORDER BY l.ts DESC, l.id DESC",
        });
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder
            .build_query_as::<LogRow>()
            .fetch_all(&self.pool)
            .await?;
        debug!(rows = rows.len(), "fetched power logs");
        Ok(rows)
    }

    async fn record(&self, device_id: i64, power_watts: f64, at: DateTime<Utc>) -> Result<Sample> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE devices SET is_on = $2, last_seen = $3 WHERE id = $1")
            .bind(device_id)
            .bind(is_on_for(power_watts))
            .bind(at)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::DeviceNotFound(device_id));
        }

        let sample = sqlx::query_as::<_, Sample>(
            "INSERT INTO power_logs (device_id, ts, power_watts) VALUES ($1, $2, $3) \
             RETURNING id, device_id, ts AS timestamp, power_watts",
        )
        .bind(device_id)
        .bind(at)
        .bind(power_watts)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(sample)
    }

    async fn record_batch(
        &self,
        readings: &[Reading],
        received_at: DateTime<Utc>,
    ) -> Result<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let device_ids: Vec<i64> = readings.iter().map(|r| r.device_id).collect();
        let timestamps: Vec<DateTime<Utc>> = readings
            .iter()
            .map(|r| r.timestamp.unwrap_or(received_at))
            .collect();
        let powers: Vec<f64> = readings.iter().map(|r| r.power_watts).collect();

        // The last reading per device in arrival order decides its on/off state.
        let mut latest: HashMap<i64, bool> = HashMap::new();
        for reading in readings {
            latest.insert(reading.device_id, is_on_for(reading.power_watts));
        }
        let (state_ids, state_on): (Vec<i64>, Vec<bool>) = latest.into_iter().unzip();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO power_logs (device_id, ts, power_watts)
            SELECT i.device_id, i.ts, i.power_watts
            FROM UNNEST($1::int8[], $2::timestamptz[], $3::float8[])
                AS i(device_id, ts, power_watts)
            JOIN devices d ON d.id = i.device_id
            "#,
        )
        .bind(&device_ids)
        .bind(&timestamps)
        .bind(&powers)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE devices d SET is_on = u.is_on, last_seen = $3
            FROM UNNEST($1::int8[], $2::bool[]) AS u(id, is_on)
            WHERE d.id = u.id
            "#,
        )
        .bind(&state_ids)
        .bind(&state_on)
        .bind(received_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted.rows_affected() as usize)
    }

    async fn list_devices(&self) -> Result<Vec<DeviceSnapshot>> {
        let devices = sqlx::query_as::<_, Device>(
            "SELECT id, name, room, is_on, last_seen FROM devices ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        #[derive(sqlx::FromRow)]
        struct RecentRow {
            device_id: i64,
            timestamp: DateTime<Utc>,
            power_watts: f64,
        }

        let recent = sqlx::query_as::<_, RecentRow>(
            r#"
            SELECT device_id, ts AS timestamp, power_watts FROM (
                SELECT device_id, ts, power_watts,
                       ROW_NUMBER() OVER (PARTITION BY device_id ORDER BY ts DESC, id DESC) AS rn
                FROM power_logs
            ) ranked
            WHERE rn <= $1
            ORDER BY device_id, ts ASC
            "#,
        )
        .bind(DEVICE_RECENT_LOGS as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut by_device: HashMap<i64, Vec<LogPoint>> = HashMap::new();
        for row in recent {
            by_device.entry(row.device_id).or_default().push(LogPoint {
                timestamp: row.timestamp,
                power_watts: row.power_watts,
            });
        }

        Ok(devices
            .into_iter()
            .map(|device| DeviceSnapshot {
                recent_logs: by_device.remove(&device.id).unwrap_or_default(),
                id: device.id,
                name: device.name,
                room: device.room.unwrap_or_default(),
                is_on: device.is_on,
                last_seen: device.last_seen,
            })
            .collect())
    }

    async fn toggle_device(&self, device_id: i64, at: DateTime<Utc>) -> Result<Device> {
        sqlx::query_as::<_, Device>(
            "UPDATE devices SET is_on = NOT is_on, last_seen = $2 WHERE id = $1 \
             RETURNING id, name, room, is_on, last_seen",
        )
        .bind(device_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::DeviceNotFound(device_id))
    }

    async fn device_logs(&self, device_id: i64, limit: usize) -> Result<(Device, Vec<LogPoint>)> {
        let device = sqlx::query_as::<_, Device>(
            "SELECT id, name, room, is_on, last_seen FROM devices WHERE id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::DeviceNotFound(device_id))?;

        let logs = sqlx::query_as::<_, LogPoint>(
            "SELECT ts AS timestamp, power_watts FROM power_logs WHERE device_id = $1 \
             ORDER BY ts DESC, id DESC LIMIT $2",
        )
        .bind(device_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok((device, logs))
    }
}

pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            db_err.code().is_some_and(|code| {
                code == "08000" || // connection_exception
                code == "08003" || // connection_does_not_exist
                code == "08006" || // connection_failure
                code == "57P03" || // cannot_connect_now
                code == "53300" || // too_many_connections
                code == "40001" // serialization_failure
            })
        }
        _ => false,
    }
}
