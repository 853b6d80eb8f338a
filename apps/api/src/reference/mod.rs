//! Company reference store: the verified facts the pipeline grounds drafts
//! in. The pipeline only ever sees the trait, so tests swap in an in-memory
//! implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::company::{CompanyDetail, CompanySummary};

/// Lookup interface over the company reference data.
///
/// Failures surface as [`AppError::ReferenceData`] rather than a generic
/// database error: the retrieval stage degrades instead of failing when the
/// store is unreachable, and it keys that decision off this variant.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Finds a company by name. Matching is case-insensitive on the trimmed
    /// name; `Ok(None)` means the store answered and had no match.
    async fn search(&self, name: &str) -> Result<Option<CompanySummary>, AppError>;

    /// Fetches the full fact row for a previously found company.
    async fn get_detail(&self, id: Uuid) -> Result<Option<CompanyDetail>, AppError>;
}

/// Postgres-backed reference store over the `companies` table.
pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn search(&self, name: &str) -> Result<Option<CompanySummary>, AppError> {
        sqlx::query_as::<_, CompanySummary>(
            "SELECT id, name FROM companies WHERE name ILIKE $1 LIMIT 1",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::ReferenceData(e.to_string()))
    }

    async fn get_detail(&self, id: Uuid) -> Result<Option<CompanyDetail>, AppError> {
        sqlx::query_as::<_, CompanyDetail>(
            "SELECT id, name, industry, location, employee_count, founded_year, website, description \
             FROM companies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::ReferenceData(e.to_string()))
    }
}
