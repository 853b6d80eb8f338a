//! Workflow checkpointing. The orchestrator persists the full
//! [`WorkflowState`] after every stage, so a restarted process can answer
//! status queries for past runs and a suspended workflow keeps its
//! suspension token across the wait.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::errors::AppError;
use crate::models::workflow::WorkflowState;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, workflow_id: &str, state: &WorkflowState) -> Result<(), AppError>;

    async fn load(&self, workflow_id: &str) -> Result<Option<WorkflowState>, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory backend
// ────────────────────────────────────────────────────────────────────────────

/// Process-local checkpoint store used in tests and single-node deployments
/// that can tolerate losing history on restart.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, WorkflowState>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, workflow_id: &str, state: &WorkflowState) -> Result<(), AppError> {
        let mut checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        checkpoints.insert(workflow_id.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, workflow_id: &str) -> Result<Option<WorkflowState>, AppError> {
        let checkpoints = self
            .checkpoints
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(checkpoints.get(workflow_id).cloned())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres backend
// ────────────────────────────────────────────────────────────────────────────

/// Durable checkpoint store over the `workflow_checkpoints` table. One JSONB
/// row per workflow, upserted on every save.
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn save(&self, workflow_id: &str, state: &WorkflowState) -> Result<(), AppError> {
        let state_json = serde_json::to_value(state)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("checkpoint serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO workflow_checkpoints (workflow_id, state, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (workflow_id)
            DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            "#,
        )
        .bind(workflow_id)
        .bind(state_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, workflow_id: &str) -> Result<Option<WorkflowState>, AppError> {
        let row: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT state FROM workflow_checkpoints WHERE workflow_id = $1")
                .bind(workflow_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(value) => {
                let state = serde_json::from_value(value).map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("checkpoint deserialization: {e}"))
                })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
