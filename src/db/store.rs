//! Observation store over a process-private SQLite file.
//!
//! One writer connection serializes all inserts; WAL journaling keeps
//! concurrent readers (the external read API) unblocked. Opening an
//! empty path provisions the schema; opening an existing database is a
//! no-op apart from the startup retention sweep.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{info, warn};

use crate::db::schema;
use crate::models::{Anomaly, Device, Metric, NewAnomaly, NewMetric, NewTrap, Trap};

/// Rows in metrics/traps/anomalies older than this many days are swept.
pub const RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (and provision, if needed) the store at `db_path`, then run
    /// the startup retention sweep.
    pub async fn open(db_path: &str) -> Result<Self> {
        let existed = std::path::Path::new(db_path).exists();
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database {}", db_path))?;

        if existed {
            info!("opened existing database {}", db_path);
        } else {
            info!("created database {}", db_path);
        }

        restrict_permissions(db_path);

        let store = Self { pool };
        store.provision().await?;
        let swept = store.sweep_retention(RETENTION_DAYS).await?;
        if swept > 0 {
            info!("startup retention sweep removed {} rows", swept);
        }
        Ok(store)
    }

    async fn provision(&self) -> Result<()> {
        for statement in schema::ALL_TABLES {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("schema provisioning failed")?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== Devices ====================

    /// Read-only lookup used by the pipeline; `None` is the common case
    /// since most observed hosts are never registered.
    pub async fn device_id_by_ip(&self, ip: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM devices WHERE ip_address = ?")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    pub async fn device_by_ip(&self, ip: &str) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>("SELECT * FROM devices WHERE ip_address = ?")
            .bind(ip)
            .fetch_optional(&self.pool)
            .await?;
        Ok(device)
    }

    /// Register a device (operator path). Returns its id.
    pub async fn create_device(
        &self,
        name: &str,
        ip: &str,
        location: Option<&str>,
        tags: Option<&str>,
    ) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO devices (name, ip_address, location, tags, enabled, created_at)
               VALUES (?, ?, ?, ?, 1, ?)
               RETURNING id"#,
        )
        .bind(name)
        .bind(ip)
        .bind(location)
        .bind(tags)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Delete a device; referencing metric/trap rows keep their data with
    /// the foreign key set to NULL.
    pub async fn delete_device(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM devices WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== Inserts ====================

    pub async fn insert_metric(&self, metric: &NewMetric) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO snmp_metrics
                   (ts, source_ip, device_id, oid, value_raw, value_num, latency_ms)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(metric.ts)
        .bind(&metric.source_ip)
        .bind(metric.device_id)
        .bind(&metric.oid)
        .bind(&metric.value_raw)
        .bind(metric.value_num)
        .bind(metric.latency_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_trap(&self, trap: &NewTrap) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO snmp_traps
                   (ts, source_ip, device_id, version, community_or_user,
                    enterprise_oid, severity, varbinds)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(trap.ts)
        .bind(&trap.source_ip)
        .bind(trap.device_id)
        .bind(&trap.version)
        .bind(&trap.community_or_user)
        .bind(&trap.enterprise_oid)
        .bind(&trap.severity)
        .bind(&trap.varbinds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_anomaly(&self, anomaly: &NewAnomaly) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO snmp_anomalies (ts, source_ip, description, severity, type)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(Utc::now())
        .bind(&anomaly.source_ip)
        .bind(&anomaly.description)
        .bind(anomaly.severity.as_str())
        .bind(&anomaly.kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ==================== Retention ====================

    /// Delete observation rows older than `horizon_days`. Returns the
    /// number of rows removed; re-running on a swept store is a no-op.
    pub async fn sweep_retention(&self, horizon_days: i64) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(horizon_days);
        let mut removed = 0u64;
        for table in ["snmp_metrics", "snmp_traps", "snmp_anomalies"] {
            let result = sqlx::query(&format!("DELETE FROM {} WHERE ts < ?", table))
                .bind(cutoff)
                .execute(&self.pool)
                .await?;
            removed += result.rows_affected();
        }
        Ok(removed)
    }

    // ==================== Read-back ====================

    pub async fn recent_metrics(&self, limit: i64) -> Result<Vec<Metric>> {
        let rows = sqlx::query_as::<_, Metric>(
            "SELECT * FROM snmp_metrics ORDER BY ts DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recent_traps(&self, limit: i64) -> Result<Vec<Trap>> {
        let rows =
            sqlx::query_as::<_, Trap>("SELECT * FROM snmp_traps ORDER BY ts DESC, id DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn recent_anomalies(&self, limit: i64) -> Result<Vec<Anomaly>> {
        let rows = sqlx::query_as::<_, Anomaly>(
            "SELECT * FROM snmp_anomalies ORDER BY ts DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// The database file is process-private: chmod 0600 on Unix.
fn restrict_permissions(db_path: &str) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(db_path, std::fs::Permissions::from_mode(0o600))
        {
            warn!("could not restrict permissions on {}: {}", db_path, e);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = db_path;
    }
}
