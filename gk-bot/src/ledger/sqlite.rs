//! SQLite-backed attempt ledger

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use gk_common::events::Snowflake;
use sqlx::SqlitePool;

use super::{AttemptLedger, AttemptOutcome, AttemptRecord};
use crate::error::Result;

/// Ledger stored in the `quiz_attempts` and `role_grants` tables
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
    cooldown: Duration,
}

type AttemptRow = (i64, String, DateTime<Utc>, String);

impl SqliteLedger {
    pub fn new(pool: SqlitePool, cooldown: Duration) -> Self {
        Self { pool, cooldown }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode(row: AttemptRow) -> Result<AttemptRecord> {
        let (member_id, command, created_at, result) = row;
        Ok(AttemptRecord {
            member_id: Snowflake(member_id as u64),
            command,
            created_at,
            outcome: result.parse()?,
        })
    }
}

#[async_trait]
impl AttemptLedger for SqliteLedger {
    async fn record_attempt(&self, record: &AttemptRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO quiz_attempts (member_id, command, created_at, result) VALUES (?, ?, ?, ?)",
        )
        .bind(record.member_id.get() as i64)
        .bind(&record.command)
        .bind(record.created_at)
        .bind(record.outcome.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            member_id = %record.member_id,
            command = %record.command,
            outcome = %record.outcome,
            "Recorded quiz attempt"
        );

        Ok(())
    }

    async fn last_attempt(&self, member_id: Snowflake) -> Result<Option<AttemptRecord>> {
        // Row ids are monotonic; timestamps may share a second
        let row: Option<AttemptRow> = sqlx::query_as(
            r#"
            SELECT member_id, command, created_at, result
            FROM quiz_attempts
            WHERE member_id = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(member_id.get() as i64)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode).transpose()
    }

    async fn last_attempt_for(
        &self,
        member_id: Snowflake,
        command: &str,
    ) -> Result<Option<AttemptRecord>> {
        let row: Option<AttemptRow> = sqlx::query_as(
            r#"
            SELECT member_id, command, created_at, result
            FROM quiz_attempts
            WHERE member_id = ? AND command = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(member_id.get() as i64)
        .bind(command)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::decode).transpose()
    }

    async fn record_role_grant(
        &self,
        member_id: Snowflake,
        role_name: &str,
        granted_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("INSERT INTO role_grants (member_id, role_name, granted_at) VALUES (?, ?, ?)")
            .bind(member_id.get() as i64)
            .bind(role_name)
            .bind(granted_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
