//! Postgres-backed store and ownership checker.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{Instrument, Span};
use uuid::Uuid;

use super::store::{
    CredentialWrite, Identity, IdentityStore, OwnershipChecker, Room, SessionRecord,
};

const IDENTITY_COLUMNS: &str = r"
    students.id,
    students.student_public_id,
    students.full_name,
    students.email,
    students.grade,
    students.pin_hash,
    students.pin_reset_required,
    students.last_login_at,
    (
        SELECT rooms.name
        FROM room_students
        JOIN rooms ON rooms.id = room_students.room_id
        WHERE room_students.student_id = students.id
        ORDER BY rooms.name
        LIMIT 1
    ) AS room_name
";

fn db_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn identity_from_row(row: &PgRow) -> Result<Identity> {
    Ok(Identity {
        id: row.try_get("id")?,
        public_id: row.try_get("student_public_id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        grade: row.try_get("grade")?,
        room_name: row.try_get("room_name")?,
        credential: row.try_get("pin_hash")?,
        reset_required: row.try_get("pin_reset_required")?,
        last_login_at: row.try_get("last_login_at")?,
    })
}

#[derive(Clone, Debug)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_session_row(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        session: &SessionRecord,
    ) -> Result<()> {
        let query = r"
            INSERT INTO student_sessions (student_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
        ";
        sqlx::query(query)
            .bind(session.identity_id)
            .bind(&session.token_hash)
            .bind(session.expires_at)
            .execute(&mut **tx)
            .instrument(db_span("INSERT", query))
            .await
            .context("failed to insert student session")?;
        Ok(())
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_public_id(&self, public_id: &str) -> Result<Option<Identity>> {
        let query = format!(
            "SELECT {IDENTITY_COLUMNS} FROM students WHERE UPPER(students.student_public_id) = $1 LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup student by public id")?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>> {
        let query = format!("SELECT {IDENTITY_COLUMNS} FROM students WHERE students.id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup student by id")?;
        row.as_ref().map(identity_from_row).transpose()
    }

    async fn update_credential(
        &self,
        id: Uuid,
        credential: &str,
        session: &SessionRecord,
    ) -> Result<CredentialWrite> {
        let mut tx = self.pool.begin().await.context("begin set-pin transaction")?;

        // The WHERE clause is the compare-and-swap: a concurrent writer that already
        // established a credential makes this update match zero rows.
        let query = r"
            UPDATE students
            SET pin_hash = $2,
                pin_reset_required = FALSE,
                pin_set_at = NOW(),
                last_login_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
              AND (pin_hash IS NULL OR pin_hash = '' OR pin_reset_required)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(id)
            .bind(credential)
            .fetch_optional(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update student credential")?;

        if row.is_none() {
            tx.rollback().await.context("rollback set-pin conflict")?;
            return Ok(CredentialWrite::Conflict);
        }

        Self::insert_session_row(&mut tx, session).await?;
        tx.commit().await.context("commit set-pin transaction")?;

        Ok(CredentialWrite::Applied)
    }

    async fn record_login(
        &self,
        credential: &str,
        session: &SessionRecord,
    ) -> Result<CredentialWrite> {
        let mut tx = self.pool.begin().await.context("begin login transaction")?;

        // Holds the student row until commit; a reset either ran before (no match) or waits.
        let query = r"
            UPDATE students
            SET last_login_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
              AND pin_hash = $2
              AND NOT pin_reset_required
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(session.identity_id)
            .bind(credential)
            .fetch_optional(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update last login")?;

        if row.is_none() {
            tx.rollback().await.context("rollback login conflict")?;
            return Ok(CredentialWrite::Conflict);
        }

        Self::insert_session_row(&mut tx, session).await?;
        tx.commit().await.context("commit login transaction")?;
        Ok(CredentialWrite::Applied)
    }

    async fn find_session_by_hash(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        // Exact match on the hash; expiry is judged by the caller so it can tell
        // "expired" from "unknown".
        let query = r"
            SELECT student_id, token_hash, expires_at
            FROM student_sessions
            WHERE token_hash = $1
            LIMIT 1
        ";
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup student session")?;
        row.map(|row| -> Result<SessionRecord> {
            Ok(SessionRecord {
                identity_id: row.try_get("student_id")?,
                token_hash: row.try_get("token_hash")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }

    async fn reset_credential(&self, id: Uuid) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await.context("begin reset transaction")?;

        let query = r"
            UPDATE students
            SET pin_hash = NULL,
                pin_reset_required = TRUE,
                updated_at = NOW()
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to clear student credential")?;
        if result.rows_affected() == 0 {
            tx.rollback().await.context("rollback reset of missing student")?;
            return Ok(None);
        }

        let query = "DELETE FROM student_sessions WHERE student_id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&mut *tx)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete student sessions")?;

        tx.commit().await.context("commit reset transaction")?;
        Ok(Some(result.rows_affected()))
    }

    async fn rooms_for_identity(&self, id: Uuid) -> Result<Vec<Room>> {
        let query = r"
            SELECT rooms.id, rooms.name
            FROM room_students
            JOIN rooms ON rooms.id = room_students.room_id
            WHERE room_students.student_id = $1
            ORDER BY rooms.name
        ";
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load student rooms")?;
        rows.into_iter()
            .map(|row| -> Result<Room> {
                Ok(Room {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let query = "DELETE FROM student_sessions WHERE expires_at <= $1";
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(db_span("DELETE", query))
            .await
            .context("failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = tracing::info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;
        let ping_span = tracing::info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")
    }
}

/// Teachers own students assigned to them directly or through their grade list;
/// admins own every student.
#[derive(Clone, Debug)]
pub struct PgOwnership {
    pool: PgPool,
}

impl PgOwnership {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnershipChecker for PgOwnership {
    async fn resolve_caller(&self, external_user_id: &str) -> Result<Option<Uuid>> {
        let query = "SELECT id FROM teachers WHERE auth0_user_id = $1";
        let row = sqlx::query(query)
            .bind(external_user_id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to resolve caller")?;
        row.map(|row| row.try_get("id"))
            .transpose()
            .context("failed to decode caller id")
    }

    async fn owns(&self, caller: Uuid, target: Uuid) -> Result<bool> {
        let query = r"
            SELECT EXISTS (
                SELECT 1
                FROM students
                JOIN teachers ON teachers.id = $1
                WHERE students.id = $2
                  AND (
                      teachers.is_admin
                      OR students.teacher_id = teachers.id
                      OR students.grade = ANY(teachers.grades)
                  )
            ) AS owns
        ";
        let row = sqlx::query(query)
            .bind(caller)
            .bind(target)
            .fetch_one(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to check student ownership")?;
        row.try_get("owns").context("failed to decode ownership flag")
    }
}
