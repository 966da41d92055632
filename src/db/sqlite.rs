use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::schema::{PROGRESS_SCHEMA, RECORD_SCHEMA_VERSION, SCHEMA_VERSION};
use super::{ProgressRepository, StoreError};
use crate::mastery::{CompetencyProgressState, ConfidenceReason};

const PROGRESS_COLUMNS: &str =
    r#""competency_id", "user_id", "progress", "confidence", "confidence_reason", "last_modified""#;

/// Competency progress stored in SQLite.
#[derive(Debug, Clone)]
pub struct SqliteProgressRepository {
    pool: SqlitePool,
}

impl SqliteProgressRepository {
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(|e| StoreError::Config(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// Single-connection in-memory database; the data lives as long as the pool.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Config(e.to_string()))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    for stmt in PROGRESS_SCHEMA {
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    sqlx::query(RECORD_SCHEMA_VERSION)
        .bind(SCHEMA_VERSION)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(())
}

fn row_to_state(row: &SqliteRow) -> Result<CompetencyProgressState, StoreError> {
    let reason: String = row.try_get("confidence_reason")?;
    let last_modified: Option<DateTime<Utc>> = row.try_get("last_modified")?;
    Ok(CompetencyProgressState {
        competency_id: row.try_get("competency_id")?,
        user_id: row.try_get("user_id")?,
        progress: row.try_get("progress")?,
        confidence: row.try_get("confidence")?,
        confidence_reason: ConfidenceReason::from_str(&reason),
        last_modified,
    })
}

#[async_trait]
impl ProgressRepository for SqliteProgressRepository {
    async fn find(
        &self,
        competency_id: i64,
        user_id: i64,
    ) -> Result<Option<CompetencyProgressState>, StoreError> {
        let sql = format!(
            r#"SELECT {PROGRESS_COLUMNS} FROM "competency_progress" WHERE "competency_id" = ? AND "user_id" = ?"#
        );
        let row = sqlx::query(&sql)
            .bind(competency_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_state).transpose()
    }

    async fn find_all_by_competency(
        &self,
        competency_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError> {
        let sql = format!(
            r#"SELECT {PROGRESS_COLUMNS} FROM "competency_progress" WHERE "competency_id" = ? ORDER BY "user_id""#
        );
        let rows = sqlx::query(&sql)
            .bind(competency_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_state).collect()
    }

    async fn find_all_by_competencies_and_user(
        &self,
        competency_ids: &[i64],
        user_id: i64,
    ) -> Result<Vec<CompetencyProgressState>, StoreError> {
        if competency_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            r#"SELECT {PROGRESS_COLUMNS} FROM "competency_progress" WHERE "user_id" = "#
        ));
        qb.push_bind(user_id);
        qb.push(r#" AND "competency_id" IN ("#);
        let mut separated = qb.separated(", ");
        for id in competency_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(r#") ORDER BY "competency_id""#);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_state).collect()
    }

    async fn insert_if_absent(&self, state: &CompetencyProgressState) -> Result<bool, StoreError> {
        let sql = format!(
            r#"INSERT INTO "competency_progress" ({PROGRESS_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT ("competency_id", "user_id") DO NOTHING"#
        );
        let result = sqlx::query(&sql)
            .bind(state.competency_id)
            .bind(state.user_id)
            .bind(state.progress)
            .bind(state.confidence)
            .bind(state.confidence_reason.as_str())
            .bind(state.last_modified)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, state: &CompetencyProgressState) -> Result<(), StoreError> {
        let sql = format!(
            r#"INSERT INTO "competency_progress" ({PROGRESS_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT ("competency_id", "user_id") DO UPDATE SET
                "progress" = excluded."progress",
                "confidence" = excluded."confidence",
                "confidence_reason" = excluded."confidence_reason",
                "last_modified" = excluded."last_modified""#
        );
        sqlx::query(&sql)
            .bind(state.competency_id)
            .bind(state.user_id)
            .bind(state.progress)
            .bind(state.confidence)
            .bind(state.confidence_reason.as_str())
            .bind(state.last_modified)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_by_competency(&self, competency_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(r#"DELETE FROM "competency_progress" WHERE "competency_id" = ?"#)
            .bind(competency_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_by_competency(&self, competency_id: i64) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM "competency_progress" WHERE "competency_id" = ?"#,
        )
        .bind(competency_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_mastered_by_competency(
        &self,
        competency_id: i64,
        mastery_threshold: f64,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM "competency_progress"
            WHERE "competency_id" = ?
              AND MIN(MAX("progress" * "confidence", 0.0), 100.0) >= ?
            "#,
        )
        .bind(competency_id)
        .bind(mastery_threshold)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}
