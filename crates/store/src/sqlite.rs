//! SQLite repository.
//!
//! Uses a single SQLite database with three tables:
//! - `sessions`: one row per diagnostic session; a partial unique index
//!   allows at most one `in_progress` row per student
//! - `responses`: append-only answer history, ordered by `seq`
//! - `results`: terminal classifications, keyed by student
//!
//! `save_session` is a compare-and-swap on the `version` column, so two
//! processes racing on the same student cannot both win. `record_response`
//! runs that swap and the response INSERT in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::str::FromStr;
use tierwise_core::error::StoreError;
use tierwise_core::item::Domain;
use tierwise_core::level::Level;
use tierwise_core::repository::DiagnosticRepository;
use tierwise_core::session::{DiagnosticResult, Response, Session, SessionStatus};
use tracing::{debug, info};

/// A production SQLite diagnostic repository.
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open (or create) the database at `url` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an ephemeral database (useful for tests).
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite URL: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every connection to ":memory:" is its own database
        let max_connections = if url.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let repo = Self { pool };
        repo.run_migrations().await?;
        info!("SQLite repository initialized at {url}");
        Ok(repo)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let repo = Self { pool };
        repo.run_migrations().await?;
        Ok(repo)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id                    TEXT PRIMARY KEY NOT NULL,
                student_id            TEXT NOT NULL,
                status                TEXT NOT NULL,
                theta_estimate        REAL NOT NULL,
                items_administered    INTEGER NOT NULL,
                total_items           INTEGER NOT NULL,
                current_item_id       TEXT,
                administered_item_ids TEXT NOT NULL DEFAULT '[]',
                version               INTEGER NOT NULL DEFAULT 0,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_active ON sessions(student_id) WHERE status = 'in_progress'",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("active session index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS responses (
                seq              INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id       TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                item_id          TEXT NOT NULL,
                selected_option  INTEGER NOT NULL,
                is_correct       INTEGER NOT NULL,
                theta_after      REAL NOT NULL,
                response_time_ms INTEGER,
                answered_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("responses table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_responses_session ON responses(session_id, seq)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("responses index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS results (
                student_id         TEXT PRIMARY KEY NOT NULL,
                session_id         TEXT NOT NULL,
                overall_level      TEXT NOT NULL,
                theta_final        REAL NOT NULL,
                standard_error     REAL,
                items_administered INTEGER NOT NULL,
                domain_levels      TEXT NOT NULL,
                domain_scores      TEXT NOT NULL,
                completed_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("results table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_session(row: &SqliteRow) -> Result<Session, StoreError> {
        let status: String = column(row, "status")?;
        let administered_json: String = column(row, "administered_item_ids")?;
        let created_at: String = column(row, "created_at")?;
        let updated_at: String = column(row, "updated_at")?;

        Ok(Session {
            id: column(row, "id")?,
            student_id: column(row, "student_id")?,
            status: SessionStatus::parse(&status)
                .ok_or_else(|| StoreError::QueryFailed(format!("unknown session status: {status}")))?,
            theta_estimate: column(row, "theta_estimate")?,
            items_administered: to_count(column(row, "items_administered")?)?,
            total_items: to_count(column(row, "total_items")?)?,
            current_item_id: column(row, "current_item_id")?,
            administered_item_ids: serde_json::from_str(&administered_json)
                .map_err(|e| StoreError::QueryFailed(format!("administered_item_ids: {e}")))?,
            version: to_count(column(row, "version")?)? as u64,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }

    fn row_to_response(row: &SqliteRow) -> Result<Response, StoreError> {
        let answered_at: String = column(row, "answered_at")?;
        let response_time_ms: Option<i64> = column(row, "response_time_ms")?;
        Ok(Response {
            session_id: column(row, "session_id")?,
            item_id: column(row, "item_id")?,
            selected_option: to_count(column(row, "selected_option")?)?,
            is_correct: column(row, "is_correct")?,
            theta_after: column(row, "theta_after")?,
            response_time_ms: response_time_ms.map(|ms| ms.max(0) as u64),
            answered_at: parse_timestamp(&answered_at)?,
        })
    }

    fn row_to_result(row: &SqliteRow) -> Result<DiagnosticResult, StoreError> {
        let overall_level: String = column(row, "overall_level")?;
        let domain_levels: String = column(row, "domain_levels")?;
        let domain_scores: String = column(row, "domain_scores")?;
        let completed_at: String = column(row, "completed_at")?;

        let domain_levels: BTreeMap<Domain, Level> = serde_json::from_str(&domain_levels)
            .map_err(|e| StoreError::QueryFailed(format!("domain_levels: {e}")))?;
        let domain_scores: BTreeMap<Domain, f64> = serde_json::from_str(&domain_scores)
            .map_err(|e| StoreError::QueryFailed(format!("domain_scores: {e}")))?;

        Ok(DiagnosticResult {
            student_id: column(row, "student_id")?,
            session_id: column(row, "session_id")?,
            overall_level: overall_level.parse().map_err(StoreError::QueryFailed)?,
            theta_final: column(row, "theta_final")?,
            standard_error: column(row, "standard_error")?,
            items_administered: to_count(column(row, "items_administered")?)?,
            domain_levels,
            domain_scores,
            completed_at: parse_timestamp(&completed_at)?,
        })
    }
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn to_count(value: i64) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::QueryFailed(format!("negative count: {value}")))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("timestamp {value}: {e}")))
}

fn insert_error(e: sqlx::Error, what: String) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        _ => StoreError::Storage(format!("INSERT failed: {e}")),
    }
}

fn to_json<T: serde::Serialize>(value: &T, what: &str) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Storage(format!("{what} serialization: {e}")))
}

/// Compare-and-swap the session row on `version`. Returns the new version.
async fn update_session(conn: &mut SqliteConnection, session: &Session) -> Result<u64, StoreError> {
    let administered = to_json(&session.administered_item_ids, "administered_item_ids")?;
    let new_version = session.version + 1;

    let outcome = sqlx::query(
        r#"
        UPDATE sessions SET
            status = ?1,
            theta_estimate = ?2,
            items_administered = ?3,
            total_items = ?4,
            current_item_id = ?5,
            administered_item_ids = ?6,
            version = ?7,
            updated_at = ?8
        WHERE id = ?9 AND version = ?10
        "#,
    )
    .bind(session.status.as_str())
    .bind(session.theta_estimate)
    .bind(session.items_administered as i64)
    .bind(session.total_items as i64)
    .bind(&session.current_item_id)
    .bind(&administered)
    .bind(new_version as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(&session.id)
    .bind(session.version as i64)
    .execute(&mut *conn)
    .await
    .map_err(|e| StoreError::Storage(format!("UPDATE failed: {e}")))?;

    if outcome.rows_affected() == 0 {
        let exists = sqlx::query("SELECT 1 FROM sessions WHERE id = ?1")
            .bind(&session.id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("save_session lookup: {e}")))?
            .is_some();
        return Err(if exists {
            StoreError::Conflict {
                session_id: session.id.clone(),
                expected_version: session.version,
            }
        } else {
            StoreError::QueryFailed(format!("session {} not found", session.id))
        });
    }

    Ok(new_version)
}

#[async_trait]
impl DiagnosticRepository for SqliteRepository {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_session(&self, student_id: &str) -> Result<Option<Session>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM sessions
            WHERE student_id = ?1
            ORDER BY (status = 'in_progress') DESC, created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("get_session: {e}")))?;

        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn create_session(&self, session: &Session) -> Result<(), StoreError> {
        let administered = to_json(&session.administered_item_ids, "administered_item_ids")?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, student_id, status, theta_estimate, items_administered,
                                  total_items, current_item_id, administered_item_ids, version,
                                  created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&session.id)
        .bind(&session.student_id)
        .bind(session.status.as_str())
        .bind(session.theta_estimate)
        .bind(session.items_administered as i64)
        .bind(session.total_items as i64)
        .bind(&session.current_item_id)
        .bind(&administered)
        .bind(session.version as i64)
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, format!("in-progress session for student {}", session.student_id)))?;

        debug!(session_id = %session.id, student_id = %session.student_id, "Session created");
        Ok(())
    }

    async fn save_session(&self, session: &Session) -> Result<u64, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to acquire connection: {e}")))?;
        update_session(&mut conn, session).await
    }

    async fn record_response(&self, session: &Session, response: &Response) -> Result<u64, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        let new_version = update_session(&mut tx, session).await?;

        sqlx::query(
            r#"
            INSERT INTO responses (session_id, item_id, selected_option, is_correct, theta_after,
                                   response_time_ms, answered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&response.session_id)
        .bind(&response.item_id)
        .bind(response.selected_option as i64)
        .bind(response.is_correct)
        .bind(response.theta_after)
        .bind(response.response_time_ms.map(|ms| ms as i64))
        .bind(response.answered_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;

        debug!(session_id = %session.id, item_id = %response.item_id, version = new_version, "Response recorded");
        Ok(new_version)
    }

    async fn list_responses(&self, session_id: &str) -> Result<Vec<Response>, StoreError> {
        let rows = sqlx::query("SELECT * FROM responses WHERE session_id = ?1 ORDER BY seq")
            .bind(session_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list_responses: {e}")))?;

        rows.iter().map(Self::row_to_response).collect()
    }

    async fn get_result(&self, student_id: &str) -> Result<Option<DiagnosticResult>, StoreError> {
        let row = sqlx::query("SELECT * FROM results WHERE student_id = ?1")
            .bind(student_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("get_result: {e}")))?;

        row.as_ref().map(Self::row_to_result).transpose()
    }

    async fn create_result(&self, result: &DiagnosticResult) -> Result<(), StoreError> {
        let domain_levels = to_json(&result.domain_levels, "domain_levels")?;
        let domain_scores = to_json(&result.domain_scores, "domain_scores")?;

        sqlx::query(
            r#"
            INSERT INTO results (student_id, session_id, overall_level, theta_final, standard_error,
                                 items_administered, domain_levels, domain_scores, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&result.student_id)
        .bind(&result.session_id)
        .bind(result.overall_level.as_str())
        .bind(result.theta_final)
        .bind(result.standard_error)
        .bind(result.items_administered as i64)
        .bind(&domain_levels)
        .bind(&domain_scores)
        .bind(result.completed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| insert_error(e, format!("result for student {}", result.student_id)))?;

        debug!(student_id = %result.student_id, level = %result.overall_level, "Result stored");
        Ok(())
    }

    async fn delete_session(&self, student_id: &str) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("BEGIN failed: {e}")))?;

        let session_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM sessions WHERE student_id = ?1 AND status = 'in_progress'")
                .bind(student_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| StoreError::QueryFailed(format!("delete_session lookup: {e}")))?;

        let Some(session_id) = session_id else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM responses WHERE session_id = ?1")
            .bind(&session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE responses failed: {e}")))?;
        sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(&session_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE session failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("COMMIT failed: {e}")))?;
        Ok(true)
    }
}
