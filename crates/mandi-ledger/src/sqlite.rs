//! File-backed parchi store on SQLite.

use std::{
    mem,
    path::{Path, PathBuf},
    str::FromStr,
};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mandi_core::{
    DatabaseError, DigitalParchi, HealthReport, HealthStatus, LedgerResult, Page, ParchiFilter,
    ParchiStatus, ParchiStore, ParchiUpdate, TradeData,
};
use rust_decimal::Decimal;
use sqlx::{
    Row, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ConnectionState;

const STORE_TYPE: &str = "sqlite";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    File(PathBuf),
    Memory,
}

pub struct SqliteParchiStore {
    location: Location,
    state: RwLock<ConnectionState<SqlitePool>>,
}

impl SqliteParchiStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(db_path.into()),
            state: RwLock::new(ConnectionState::Pending),
        }
    }

    /// A private in-memory database, gone once the store is closed.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            state: RwLock::new(ConnectionState::Pending),
        }
    }

    pub fn db_path(&self) -> Option<&Path> {
        match &self.location {
            Location::File(path) => Some(path),
            Location::Memory => None,
        }
    }

    fn location_label(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }

    async fn pool(&self) -> Result<SqlitePool, DatabaseError> {
        self.state.read().await.handle().cloned()
    }

    async fn connect(&self) -> Result<SqlitePool, DatabaseError> {
        match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)
                        .map_err(DatabaseError::backend("failed to create database directory"))?;
                }

                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true);

                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(options)
                    .await
                    .map_err(DatabaseError::backend("failed to open sqlite database"))
            }
            Location::Memory => {
                // one long-lived connection; the database dies with it
                let options = SqliteConnectOptions::from_str("sqlite::memory:")
                    .map_err(DatabaseError::backend("invalid in-memory sqlite url"))?;

                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await
                    .map_err(DatabaseError::backend("failed to open in-memory sqlite database"))
            }
        }
    }

    async fn probe(&self, pool: &SqlitePool) -> Result<HealthReport, DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(pool)
            .await
            .map_err(DatabaseError::backend("sqlite connectivity probe failed"))?;

        let total_parchis = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM parchis")
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::backend("failed to count parchis"))?;
        let page_count = sqlx::query_scalar::<_, i64>("PRAGMA page_count")
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::backend("failed to read page_count"))?;
        let page_size = sqlx::query_scalar::<_, i64>("PRAGMA page_size")
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::backend("failed to read page_size"))?;

        Ok(HealthReport {
            status: HealthStatus::Healthy,
            store_type: STORE_TYPE.to_string(),
            location: Some(self.location_label()),
            storage_size_bytes: u64::try_from(page_count.saturating_mul(page_size)).unwrap_or(0),
            connection_active: !pool.is_closed(),
            total_parchis,
            checked_at: Utc::now(),
            error: None,
        })
    }
}

#[async_trait]
impl ParchiStore for SqliteParchiStore {
    fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    async fn initialize(&self) -> LedgerResult<()> {
        let mut state = self.state.write().await;
        let pool = match &*state {
            ConnectionState::Open(pool) => pool.clone(),
            ConnectionState::Pending | ConnectionState::Closed => self.connect().await?,
        };

        create_schema(&pool).await?;
        *state = ConnectionState::Open(pool);

        info!(location = %self.location_label(), "sqlite parchi store initialized");
        Ok(())
    }

    async fn save_parchi(&self, parchi: &DigitalParchi) -> LedgerResult<Uuid> {
        parchi.validate()?;
        let pool = self.pool().await?;

        write_parchi(&pool, parchi)
            .await
            .map_err(DatabaseError::backend("failed to save parchi"))?;

        debug!(parchi_id = %parchi.id, "parchi saved");
        Ok(parchi.id)
    }

    async fn get_parchi(&self, id: Uuid) -> LedgerResult<Option<DigitalParchi>> {
        let pool = self.pool().await?;

        let row = sqlx::query("SELECT * FROM parchis WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(DatabaseError::backend("failed to fetch parchi"))?;

        match row {
            Some(row) => Ok(Some(row_to_parchi(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_parchis(
        &self,
        page: Page,
        filter: &ParchiFilter,
    ) -> LedgerResult<Vec<DigitalParchi>> {
        filter.validate()?;
        let pool = self.pool().await?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM parchis
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR vendor_id = ?4)
            ORDER BY created_at DESC, id DESC
            LIMIT ?5 OFFSET ?6
            "#,
        )
        .bind(filter.start_date.map(encode_timestamp))
        .bind(filter.end_date.map(encode_timestamp))
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.vendor_id.as_deref())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&pool)
        .await
        .map_err(DatabaseError::backend("failed to list parchis"))?;

        Ok(rows
            .iter()
            .map(row_to_parchi)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn update_parchi(&self, id: Uuid, update: ParchiUpdate) -> LedgerResult<bool> {
        let pool = self.pool().await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(DatabaseError::backend("failed to begin update"))?;

        // A write as the first statement takes the reserved lock up front, so
        // concurrent updates wait on busy_timeout rather than fail when a
        // shared lock would need upgrading.
        let claimed = sqlx::query("UPDATE parchis SET id = id WHERE id = ?1")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::backend("failed to lock parchi for update"))?;
        if claimed.rows_affected() == 0 {
            warn!(parchi_id = %id, "update for unknown parchi");
            return Ok(false);
        }

        let row = sqlx::query("SELECT * FROM parchis WHERE id = ?1")
            .bind(id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::backend("failed to fetch parchi for update"))?;

        let mut parchi = row_to_parchi(&row)?;
        parchi.apply_update(update)?;

        write_parchi(&mut *tx, &parchi)
            .await
            .map_err(DatabaseError::backend("failed to write parchi update"))?;
        tx.commit()
            .await
            .map_err(DatabaseError::backend("failed to commit parchi update"))?;

        debug!(parchi_id = %id, updated_at = %parchi.updated_at, "parchi updated");
        Ok(true)
    }

    async fn delete_parchi(&self, id: Uuid) -> LedgerResult<bool> {
        let pool = self.pool().await?;

        let result = sqlx::query("DELETE FROM parchis WHERE id = ?1")
            .bind(id.to_string())
            .execute(&pool)
            .await
            .map_err(DatabaseError::backend("failed to delete parchi"))?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            debug!(parchi_id = %id, "parchi deleted");
        } else {
            warn!(parchi_id = %id, "delete for unknown parchi");
        }
        Ok(deleted)
    }

    async fn count_parchis(&self, filter: &ParchiFilter) -> LedgerResult<i64> {
        filter.validate()?;
        let pool = self.pool().await?;

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM parchis
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at <= ?2)
              AND (?3 IS NULL OR status = ?3)
              AND (?4 IS NULL OR vendor_id = ?4)
            "#,
        )
        .bind(filter.start_date.map(encode_timestamp))
        .bind(filter.end_date.map(encode_timestamp))
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.vendor_id.as_deref())
        .fetch_one(&pool)
        .await
        .map_err(DatabaseError::backend("failed to count parchis"))?;

        Ok(count)
    }

    async fn health_check(&self) -> LedgerResult<HealthReport> {
        let location = Some(self.location_label());

        let pool = match self.pool().await {
            Ok(pool) => pool,
            Err(err) => return Ok(HealthReport::unhealthy(STORE_TYPE, location, err)),
        };

        match self.probe(&pool).await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("sqlite health check failed: {err}");
                Ok(HealthReport::unhealthy(STORE_TYPE, location, err))
            }
        }
    }

    async fn close(&self) -> LedgerResult<()> {
        let mut state = self.state.write().await;

        if let ConnectionState::Open(pool) = mem::replace(&mut *state, ConnectionState::Closed) {
            pool.close().await;
            info!(location = %self.location_label(), "sqlite parchi store closed");
        }
        Ok(())
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<(), DatabaseError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parchis (
            id TEXT PRIMARY KEY,
            product_name TEXT NOT NULL,
            quantity TEXT NOT NULL,
            unit TEXT NOT NULL,
            unit_price TEXT NOT NULL,
            total_amount TEXT NOT NULL,
            mandi_cess TEXT NOT NULL,
            traded_at TEXT NOT NULL,
            language TEXT NOT NULL,
            conversation_id TEXT NOT NULL,
            vendor_id TEXT,
            status TEXT NOT NULL DEFAULT 'COMPLETED',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(DatabaseError::backend("failed to create parchis table"))?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_parchis_created_at ON parchis (created_at)")
        .execute(pool)
        .await
        .map_err(DatabaseError::backend("failed to create parchis index"))?;

    Ok(())
}

/// Single-statement upsert, so a save either lands whole or not at all.
async fn write_parchi<'e, E>(executor: E, parchi: &DigitalParchi) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let trade = &parchi.trade_data;

    sqlx::query(
        r#"
        INSERT INTO parchis (
            id, product_name, quantity, unit, unit_price, total_amount, mandi_cess,
            traded_at, language, conversation_id, vendor_id, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        ON CONFLICT(id) DO UPDATE SET
            product_name = excluded.product_name,
            quantity = excluded.quantity,
            unit = excluded.unit,
            unit_price = excluded.unit_price,
            total_amount = excluded.total_amount,
            mandi_cess = excluded.mandi_cess,
            traded_at = excluded.traded_at,
            language = excluded.language,
            conversation_id = excluded.conversation_id,
            vendor_id = excluded.vendor_id,
            status = excluded.status,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(parchi.id.to_string())
    .bind(&trade.product_name)
    .bind(trade.quantity.to_string())
    .bind(&trade.unit)
    .bind(trade.unit_price.to_string())
    .bind(trade.total_amount.to_string())
    .bind(trade.mandi_cess.to_string())
    .bind(encode_timestamp(trade.timestamp))
    .bind(&trade.language)
    .bind(&trade.conversation_id)
    .bind(parchi.vendor_id.as_deref())
    .bind(parchi.status.as_str())
    .bind(encode_timestamp(parchi.created_at))
    .bind(encode_timestamp(parchi.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Fixed-width RFC 3339 in UTC, so text order is time order.
fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn row_to_parchi(row: &SqliteRow) -> Result<DigitalParchi, DatabaseError> {
    let raw_id: String = column(row, "id")?;
    let corrupt = |reason: String| DatabaseError::Corrupt {
        id: raw_id.clone(),
        reason,
    };

    let decimal = |name: &str| -> Result<Decimal, DatabaseError> {
        let raw: String = column(row, name)?;
        Decimal::from_str(&raw).map_err(|err| corrupt(format!("{name}: {err}")))
    };
    let timestamp = |name: &str| -> Result<DateTime<Utc>, DatabaseError> {
        let raw: String = column(row, name)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| corrupt(format!("{name}: {err}")))
    };

    let id = Uuid::parse_str(&raw_id).map_err(|err| corrupt(format!("id: {err}")))?;
    let status: String = column(row, "status")?;
    let status =
        ParchiStatus::from_str(&status).map_err(|err| corrupt(format!("status: {err}")))?;

    let parchi = DigitalParchi {
        id,
        trade_data: TradeData {
            product_name: column(row, "product_name")?,
            quantity: decimal("quantity")?,
            unit: column(row, "unit")?,
            unit_price: decimal("unit_price")?,
            total_amount: decimal("total_amount")?,
            mandi_cess: decimal("mandi_cess")?,
            timestamp: timestamp("traded_at")?,
            language: column(row, "language")?,
            conversation_id: column(row, "conversation_id")?,
        },
        vendor_id: column(row, "vendor_id")?,
        status,
        created_at: timestamp("created_at")?,
        updated_at: timestamp("updated_at")?,
    };

    parchi.validate().map_err(|err| corrupt(err.to_string()))?;
    Ok(parchi)
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, DatabaseError>
where
    T: for<'r> sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(DatabaseError::backend("failed to decode parchi row"))
}
