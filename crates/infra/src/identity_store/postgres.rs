//! Postgres-backed identity store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | Result | Scenario |
//! |------------|----------------------|--------|----------|
//! | Database (unique violation on `display_id`) | `23505` | `DisplayIdTaken` | Another writer committed the same display id |
//! | Database (other unique violation) | `23505` | `Duplicate` | Internal id reused |
//! | Database (lock not available) | `55P03` | `AllocationFailed` | Counter row lock not granted within `lock_timeout` |
//! | Database (other) | Any other | `Storage` | Constraint or SQL failures |
//! | PoolClosed / Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Allocation
//!
//! `allocate_record` runs one transaction per attempt:
//! 1. seed the prefix's `allocation_counters` row from the greatest existing
//!    display id, only when the row is missing
//! 2. lock the counter row (`SELECT ... FOR UPDATE`, bounded by `lock_timeout`)
//! 3. insert the identity with the next sequence
//! 4. advance the counter and commit
//!
//! Writers that bypass the counter are still caught by the unique constraint on
//! `display_id`; the attempt rolls back and the next one resyncs the counter.
//!
//! Prefix lookups filter on the range `<prefix>000 ..= <prefix>ZZZ`, which the
//! `C`-collated unique index on `display_id` serves directly.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::{debug, info, instrument, warn, Span};

use internhub_core::InternalId;
use internhub_identity::{
    AccountProfile, AllocationError, AllocationResult, DisplayId, IdentityRecord, NewAccount,
    Prefix, RoleCode, Sequence,
};

use super::r#trait::IdentityStoreError;
use crate::accounts::AccountError;
use crate::config::AllocatorConfig;

const DISPLAY_ID_CONSTRAINT: &str = "identities_display_id_key";

/// Advisory lock key held while the schema is created.
const SCHEMA_LOCK_KEY: i64 = 0x1d_a110c;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        internal_id    UUID PRIMARY KEY,
        display_id     TEXT COLLATE "C" NOT NULL CHECK (char_length(display_id) = 12),
        role           CHAR(3) NOT NULL CHECK (role IN ('INT', 'ADM', 'SUP')),
        creation_date  DATE NOT NULL,
        email          TEXT,
        first_name     TEXT,
        last_name      TEXT,
        department     TEXT,
        is_first_login BOOLEAN,
        is_active      BOOLEAN,
        created_at     TIMESTAMPTZ,
        CONSTRAINT identities_display_id_key UNIQUE (display_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS identities_role_idx ON identities (role)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS allocation_counters (
        prefix        TEXT COLLATE "C" PRIMARY KEY CHECK (char_length(prefix) = 9),
        last_sequence TEXT COLLATE "C" CHECK (char_length(last_sequence) = 3),
        updated_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

// $1, $2: lowest and highest display id under the prefix.
pub(crate) const LAST_DISPLAY_ID_SQL: &str = r#"
    SELECT MAX(display_id) AS display_id
    FROM identities
    WHERE display_id BETWEEN $1 AND $2
"#;

// $1: prefix; $2, $3: its display id range.
pub(crate) const SEED_COUNTER_SQL: &str = r#"
    INSERT INTO allocation_counters (prefix, last_sequence)
    SELECT $1, (
        SELECT RIGHT(MAX(display_id), 3)
        FROM identities
        WHERE display_id BETWEEN $2 AND $3
    )
    WHERE NOT EXISTS (SELECT 1 FROM allocation_counters WHERE prefix = $1)
    ON CONFLICT (prefix) DO NOTHING
"#;

// A retry means the counter fell behind the table; pull it forward.
const RESYNC_COUNTER_SQL: &str = r#"
    INSERT INTO allocation_counters (prefix, last_sequence)
    SELECT $1, RIGHT(MAX(display_id), 3)
    FROM identities
    WHERE display_id BETWEEN $2 AND $3
    ON CONFLICT (prefix) DO UPDATE
    SET last_sequence = GREATEST(allocation_counters.last_sequence, EXCLUDED.last_sequence),
        updated_at = NOW()
"#;

const SELECT_IDENTITY: &str = r#"
    SELECT
        internal_id,
        display_id,
        creation_date,
        email,
        first_name,
        last_name,
        department,
        is_first_login,
        is_active,
        created_at
    FROM identities
"#;

/// Postgres identity store.
///
/// Display id uniqueness is enforced by the `identities_display_id_key`
/// constraint. The `C` collation keeps `MAX(display_id)` in byte order, which
/// is numeric order for the base-36 sequence suffix.
#[derive(Debug, Clone)]
pub struct PostgresIdentityStore {
    pool: Arc<PgPool>,
}

enum Attempt {
    Allocated(IdentityRecord),
    Taken(DisplayId),
}

impl PostgresIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    ///
    /// Concurrent callers are serialized on an advisory lock.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), IdentityStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEMA_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("schema_lock", e))?;
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(prefix = %prefix), err)]
    pub async fn last_display_id(
        &self,
        prefix: &Prefix,
    ) -> Result<Option<DisplayId>, IdentityStoreError> {
        let (low, high) = display_id_range(prefix);
        let row = sqlx::query(LAST_DISPLAY_ID_SQL)
            .bind(low)
            .bind(high)
            .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("last_display_id", e))?;

        let raw: Option<String> = row
            .try_get("display_id")
            .map_err(|e| IdentityStoreError::Storage(format!("failed to read display_id: {e}")))?;
        raw.as_deref().map(parse_display_id).transpose()
    }

    /// Insert a record whose display id was assigned elsewhere.
    #[instrument(skip(self, record), fields(display_id = %record.display_id()), err)]
    pub async fn insert(&self, record: &IdentityRecord) -> Result<(), IdentityStoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        insert_identity(&mut tx, record).await?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(display_id = %display_id), err)]
    pub async fn get(
        &self,
        display_id: &DisplayId,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        let row = sqlx::query(&format!("{SELECT_IDENTITY} WHERE display_id = $1"))
            .bind(display_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    #[instrument(skip(self), fields(prefix = %prefix, record_count = tracing::field::Empty), err)]
    pub async fn list_by_prefix(
        &self,
        prefix: &Prefix,
    ) -> Result<Vec<IdentityRecord>, IdentityStoreError> {
        let (low, high) = display_id_range(prefix);
        let rows = sqlx::query(&format!(
            "{SELECT_IDENTITY} WHERE display_id BETWEEN $1 AND $2 ORDER BY display_id ASC"
        ))
        .bind(low)
        .bind(high)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_by_prefix", e))?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        Span::current().record("record_count", records.len());
        Ok(records)
    }

    /// Whether any identity with `role` exists, on any day.
    #[instrument(skip(self), err)]
    pub async fn role_exists(&self, role: RoleCode) -> Result<bool, IdentityStoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM identities WHERE role = $1) AS present")
            .bind(role.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_exists", e))?;

        row.try_get("present")
            .map_err(|e| IdentityStoreError::Storage(format!("failed to read present: {e}")))
    }

    /// Validate `cmd`, then allocate its display id and persist the record.
    ///
    /// A rejected request never reaches the database, so it consumes no
    /// sequence.
    #[instrument(skip(self, cmd, config), fields(role = %cmd.role), err)]
    pub async fn create_account(
        &self,
        cmd: &NewAccount,
        config: &AllocatorConfig,
    ) -> Result<IdentityRecord, AccountError> {
        let profile = cmd.validate()?;
        let record = self
            .allocate_record(cmd.role, cmd.creation_date(), Some(profile), config)
            .await?;
        Ok(record)
    }

    /// Allocate the next display id under `(role, creation_date)` and persist a
    /// record carrying `profile`, all inside one transaction per attempt.
    ///
    /// Nothing is persisted when this returns an error.
    #[instrument(
        skip(self, profile, config),
        fields(prefix = tracing::field::Empty, attempts = tracing::field::Empty),
        err
    )]
    pub async fn allocate_record(
        &self,
        role: RoleCode,
        creation_date: NaiveDate,
        profile: Option<AccountProfile>,
        config: &AllocatorConfig,
    ) -> AllocationResult<IdentityRecord> {
        let prefix = Prefix::compute(role, creation_date);
        let span = Span::current();
        span.record("prefix", prefix.as_str());

        let internal_id = InternalId::new();
        for attempt in 1..=config.max_attempts {
            span.record("attempts", attempt);

            let outcome = self
                .allocate_once(&prefix, internal_id, creation_date, profile.as_ref(), config, attempt > 1)
                .await?;
            match outcome {
                Attempt::Allocated(record) => {
                    info!(display_id = %record.display_id(), "display id allocated");
                    return Ok(record);
                }
                Attempt::Taken(taken) => {
                    warn!(attempt, display_id = %taken, "display id taken by another writer, retrying");
                    if attempt < config.max_attempts {
                        tokio::time::sleep(config.backoff_for(attempt)).await;
                    }
                }
            }
        }

        Err(config.contention_exhausted(&prefix))
    }

    async fn allocate_once(
        &self,
        prefix: &Prefix,
        internal_id: InternalId,
        creation_date: NaiveDate,
        profile: Option<&AccountProfile>,
        config: &AllocatorConfig,
        resync: bool,
    ) -> AllocationResult<Attempt> {
        let failed = |op: &str, e: sqlx::Error| allocation_failure(prefix, op, e);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| failed("begin_transaction", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", config.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| failed("set_lock_timeout", e))?;

        let seed = if resync { RESYNC_COUNTER_SQL } else { SEED_COUNTER_SQL };
        let (low, high) = display_id_range(prefix);
        sqlx::query(seed)
            .bind(prefix.as_str())
            .bind(low)
            .bind(high)
            .execute(&mut *tx)
            .await
            .map_err(|e| failed("seed_counter", e))?;

        let row = sqlx::query(
            "SELECT last_sequence FROM allocation_counters WHERE prefix = $1 FOR UPDATE",
        )
        .bind(prefix.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| failed("lock_counter", e))?;

        let last: Option<String> = row
            .try_get("last_sequence")
            .map_err(|e| failed("read_counter", e))?;
        let last = last.as_deref().map(Sequence::parse).transpose()?;
        let next = Sequence::next_after(last)
            .ok_or_else(|| AllocationError::capacity_exhausted(prefix.as_str()))?;

        let candidate = prefix.display_id(next);
        debug!(candidate = %candidate, "attempting display id");

        let record = IdentityRecord::new(internal_id, candidate, creation_date, profile.cloned())
            .map_err(|e| AllocationError::allocation_failed(prefix.as_str(), e.to_string()))?;
        match insert_identity(&mut tx, &record).await {
            Ok(()) => {}
            Err(IdentityStoreError::DisplayIdTaken(taken)) => {
                tx.rollback()
                    .await
                    .map_err(|e| failed("rollback", e))?;
                return Ok(Attempt::Taken(taken));
            }
            Err(e) => {
                return Err(AllocationError::allocation_failed(prefix.as_str(), e.to_string()));
            }
        }

        sqlx::query(
            r#"
            UPDATE allocation_counters
            SET last_sequence = $2, updated_at = NOW()
            WHERE prefix = $1
            "#,
        )
        .bind(prefix.as_str())
        .bind(next.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| failed("advance_counter", e))?;

        tx.commit()
            .await
            .map_err(|e| failed("commit_transaction", e))?;
        Ok(Attempt::Allocated(record))
    }
}

async fn insert_identity(
    tx: &mut Transaction<'_, Postgres>,
    record: &IdentityRecord,
) -> Result<(), IdentityStoreError> {
    let profile = record.profile();
    sqlx::query(
        r#"
        INSERT INTO identities (
            internal_id,
            display_id,
            role,
            creation_date,
            email,
            first_name,
            last_name,
            department,
            is_first_login,
            is_active,
            created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(*record.internal_id().as_uuid())
    .bind(record.display_id().as_str())
    .bind(record.role().as_str())
    .bind(record.creation_date())
    .bind(profile.map(|p| p.email.as_str()))
    .bind(profile.map(|p| p.first_name.as_str()))
    .bind(profile.map(|p| p.last_name.as_str()))
    .bind(profile.map(|p| p.department.as_str()))
    .bind(profile.map(|p| p.is_first_login))
    .bind(profile.map(|p| p.is_active))
    .bind(profile.map(|p| p.created_at))
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation_on(&e, DISPLAY_ID_CONSTRAINT) {
            IdentityStoreError::DisplayIdTaken(record.display_id().clone())
        } else {
            map_sqlx_error("insert_identity", e)
        }
    })?;
    Ok(())
}

/// Lowest and highest display id a prefix can hold.
pub(crate) fn display_id_range(prefix: &Prefix) -> (String, String) {
    (
        prefix.display_id(Sequence::MIN).to_string(),
        prefix.display_id(Sequence::MAX).to_string(),
    )
}

fn parse_display_id(raw: &str) -> Result<DisplayId, IdentityStoreError> {
    DisplayId::parse(raw.trim_end())
        .map_err(|e| IdentityStoreError::Storage(format!("corrupt display_id '{raw}': {e}")))
}

fn record_from_row(row: &sqlx::postgres::PgRow) -> Result<IdentityRecord, IdentityStoreError> {
    let row = IdentityRow::from_row(row)
        .map_err(|e| IdentityStoreError::Storage(format!("failed to deserialize identity row: {e}")))?;
    row.try_into()
}

/// Map SQLx errors to IdentityStoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> IdentityStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => IdentityStoreError::Duplicate(msg),
                _ => IdentityStoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            IdentityStoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => IdentityStoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn allocation_failure(prefix: &Prefix, operation: &str, err: sqlx::Error) -> AllocationError {
    if is_lock_timeout(&err) {
        return AllocationError::allocation_failed(
            prefix.as_str(),
            "timed out waiting for allocation counter lock",
        );
    }
    AllocationError::allocation_failed(prefix.as_str(), map_sqlx_error(operation, err).to_string())
}

/// Check if an error is a unique violation of the named constraint.
fn is_unique_violation_on(err: &sqlx::Error, constraint: &str) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint);
    }
    false
}

fn is_lock_timeout(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("55P03"))
}

// SQLx row types

#[derive(Debug)]
struct IdentityRow {
    internal_id: uuid::Uuid,
    display_id: String,
    creation_date: NaiveDate,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    department: Option<String>,
    is_first_login: Option<bool>,
    is_active: Option<bool>,
    created_at: Option<DateTime<Utc>>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for IdentityRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(IdentityRow {
            internal_id: row.try_get("internal_id")?,
            display_id: row.try_get("display_id")?,
            creation_date: row.try_get("creation_date")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            department: row.try_get("department")?,
            is_first_login: row.try_get("is_first_login")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<IdentityRow> for IdentityRecord {
    type Error = IdentityStoreError;

    fn try_from(row: IdentityRow) -> Result<Self, Self::Error> {
        let display_id = parse_display_id(&row.display_id)?;
        let profile = match (row.email, row.created_at) {
            (Some(email), Some(created_at)) => Some(AccountProfile {
                email,
                first_name: row.first_name.unwrap_or_default(),
                last_name: row.last_name.unwrap_or_default(),
                department: row.department.unwrap_or_default(),
                is_first_login: row.is_first_login.unwrap_or(true),
                is_active: row.is_active.unwrap_or(true),
                created_at,
            }),
            _ => None,
        };
        IdentityRecord::new(
            InternalId::from_uuid(row.internal_id),
            display_id,
            row.creation_date,
            profile,
        )
        .map_err(|e| IdentityStoreError::Storage(format!("corrupt identity row: {e}")))
    }
}
