//! Transactional execution of built queries against the pooled store.

use crate::{
    builder::{BindParam, BuiltQuery},
    db::PgPool,
    error::{Result, ServiceError},
    serialize,
};
use serde_json::Value;
use tokio_postgres::types::ToSql;
use tracing::{debug, error};

/// Outcome of a successful execution: row contents for reads, an
/// affected-row count for everything else. Never both.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Rows(Vec<Value>),
    Affected(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write,
}

/// A statement is read-only iff its leading keyword is SELECT; every
/// other statement takes the mutating path.
pub fn classify(statement: &str) -> StatementKind {
    let keyword = statement.trim_start().split_whitespace().next().unwrap_or("");
    if keyword.eq_ignore_ascii_case("select") {
        StatementKind::Read
    } else {
        StatementKind::Write
    }
}

#[derive(Clone)]
pub struct Engine {
    pool: PgPool,
}

impl Engine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs one logical transaction: lease a connection, execute,
    /// commit on success, roll back on any failure. The lease returns
    /// to the pool on every exit path. Reads fetch the full result set
    /// eagerly and still commit, keeping the transaction lifecycle
    /// uniform across both statement kinds.
    pub async fn execute(&self, query: &BuiltQuery) -> Result<ExecutionResult> {
        let mut conn = self.pool.get().await.map_err(|err| {
            error!(error = ?err, "failed to lease database connection");
            ServiceError::Connection(format!("{err:?}"))
        })?;

        let tx = conn.transaction().await.map_err(map_backend_error)?;
        let params: Vec<&(dyn ToSql + Sync)> =
            query.params.iter().map(BindParam::as_sql).collect();

        let outcome = match classify(&query.text) {
            StatementKind::Read => tx.query(query.text.as_str(), &params).await.map(|rows| {
                ExecutionResult::Rows(rows.iter().map(serialize::row_to_json).collect())
            }),
            StatementKind::Write => tx
                .execute(query.text.as_str(), &params)
                .await
                .map(ExecutionResult::Affected),
        };

        match outcome {
            Ok(result) => {
                tx.commit().await.map_err(map_backend_error)?;
                Ok(result)
            }
            Err(err) => {
                // dropping the transaction would also roll back; doing it
                // explicitly surfaces rollback failures in the log
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "rollback after failed statement");
                }
                Err(map_backend_error(err))
            }
        }
    }
}

/// Single conversion point for driver errors: statement rejections
/// carry the backend message, transport failures mid-execution map to
/// the same client-visible kind, everything else is internal.
fn map_backend_error(err: tokio_postgres::Error) -> ServiceError {
    if let Some(db_err) = err.as_db_error() {
        return ServiceError::Sql(db_err.message().to_string());
    }
    if err.is_closed() || has_io_source(&err) {
        return ServiceError::Sql(err.to_string());
    }
    ServiceError::Internal(anyhow::Error::new(err))
}

fn has_io_source(err: &tokio_postgres::Error) -> bool {
    use std::error::Error as _;
    err.source().is_some_and(|source| source.is::<std::io::Error>())
}
