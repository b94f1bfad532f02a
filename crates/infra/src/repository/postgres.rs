//! Postgres-backed diagnostic repository.
//!
//! ## Atomic transitions
//!
//! `apply` is a single conditional statement:
//!
//! ```sql
//! UPDATE diagnostics SET status = $2, artifact_path = $3, updated_at = $4
//! WHERE id = $1 AND status = ANY($5)
//! ```
//!
//! where `$5` holds the legal predecessors of the target status. Zero rows
//! affected means either the job does not exist or it is in a status the
//! state machine does not allow leaving; a follow-up read tells which.
//!
//! ## Error Mapping
//!
//! | SQLx Error | RepositoryError |
//! |------------|-----------------|
//! | Database / PoolClosed / other | `Storage` |
//! | Undecodable row | `Storage` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use diagpro_core::{
    Diagnostic, DiagnosticId, DiagnosticInput, DiagnosticStatus, DiagnosticUpdate, DomainError,
};

use super::{CreateOutcome, DiagnosticRepository, RepositoryError};

const SCHEMA: &str = include_str!("../../migrations/0001_create_diagnostics.sql");

const COLUMNS: &str = "id, owner, status, artifact_path, input, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresDiagnosticRepository {
    pool: Arc<PgPool>,
}

impl PostgresDiagnosticRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `diagnostics` table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), RepositoryError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn row_to_diagnostic(row: &PgRow) -> Result<Diagnostic, RepositoryError> {
    let decode = |e: sqlx::Error| map_sqlx_error("decode", e);

    let id: String = row.try_get("id").map_err(decode)?;
    let status: String = row.try_get("status").map_err(decode)?;
    let Json(input): Json<DiagnosticInput> = row.try_get("input").map_err(decode)?;

    Ok(Diagnostic {
        id: DiagnosticId::new(id)?,
        owner: row.try_get("owner").map_err(decode)?,
        status: status.parse::<DiagnosticStatus>()?,
        artifact_path: row.try_get("artifact_path").map_err(decode)?,
        input,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

#[async_trait::async_trait]
impl DiagnosticRepository for PostgresDiagnosticRepository {
    #[instrument(skip(self), fields(diagnostic_id = %id), err)]
    async fn get(&self, id: &DiagnosticId) -> Result<Option<Diagnostic>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM diagnostics WHERE id = $1"))
            .bind(id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.as_ref().map(row_to_diagnostic).transpose()
    }

    #[instrument(skip(self, diagnostic), fields(diagnostic_id = %diagnostic.id), err)]
    async fn create_if_absent(&self, diagnostic: Diagnostic) -> Result<CreateOutcome, RepositoryError> {
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO diagnostics ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            RETURNING {COLUMNS}
            "#
        ))
        .bind(diagnostic.id.as_str())
        .bind(&diagnostic.owner)
        .bind(diagnostic.status.as_str())
        .bind(diagnostic.artifact_path.as_deref())
        .bind(Json(&diagnostic.input))
        .bind(diagnostic.created_at)
        .bind(diagnostic.updated_at)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_if_absent", e))?;

        if let Some(row) = inserted {
            return Ok(CreateOutcome::Created(row_to_diagnostic(&row)?));
        }

        // Lost the insert race (or the row predates us): return what is stored.
        self.get(&diagnostic.id)
            .await?
            .map(CreateOutcome::Existing)
            .ok_or_else(|| RepositoryError::Storage("row vanished after conflict".into()))
    }

    #[instrument(skip(self, update), fields(diagnostic_id = %id, status = %update.status), err)]
    async fn apply(
        &self,
        id: &DiagnosticId,
        update: &DiagnosticUpdate,
    ) -> Result<Diagnostic, RepositoryError> {
        update.validate()?;

        let allowed_from: Vec<String> = DiagnosticStatus::predecessors(update.status)
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let updated = sqlx::query(&format!(
            r#"
            UPDATE diagnostics
            SET status = $2, artifact_path = $3, updated_at = $4
            WHERE id = $1 AND status = ANY($5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id.as_str())
        .bind(update.status.as_str())
        .bind(update.artifact_path.as_deref())
        .bind(update.at)
        .bind(&allowed_from)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("apply", e))?;

        match updated {
            Some(row) => row_to_diagnostic(&row),
            None => match self.get(id).await? {
                None => Err(RepositoryError::NotFound(id.clone())),
                Some(current) => Err(DomainError::illegal_transition(current.status, update.status).into()),
            },
        }
    }

    #[instrument(skip(self), err)]
    async fn list_by_status_older_than(
        &self,
        status: DiagnosticStatus,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Diagnostic>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS}
            FROM diagnostics
            WHERE status = $1 AND updated_at < $2
            ORDER BY updated_at ASC, id ASC
            LIMIT $3
            "#
        ))
        .bind(status.as_str())
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_by_status_older_than", e))?;

        rows.iter().map(row_to_diagnostic).collect()
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> RepositoryError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();
            RepositoryError::Storage(format!(
                "database error in {operation} ({code}): {}",
                db_err.message()
            ))
        }
        sqlx::Error::PoolClosed => {
            RepositoryError::Storage(format!("connection pool closed in {operation}"))
        }
        other => RepositoryError::Storage(format!("sqlx error in {operation}: {other}")),
    }
}
