//! `InMemoryRunRepo`: the gateway's own tenant-scoped run registry
//! backing [`RunRepo`], modeled on `InMemoryTaskStore`'s single
//! `RwLock<HashMap>` shape (spec.md §4.5, §9 monotonic terminality).
//!
//! The first caller to resolve a given `run_id` binds it to their
//! tenant; every subsequent lookup from a different tenant is treated
//! as not found, the same outcome a tenant-scoped row in a real run
//! registry would produce.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::auth::context::AuthContext;
use crate::error::{GatewayError, GatewayResult};
use crate::services::types::{RunRecord, RunRepo, RunStatus};

#[derive(Default)]
pub struct InMemoryRunRepo {
    records: Arc<RwLock<HashMap<String, RunRecord>>>,
}

impl InMemoryRunRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunRepo for InMemoryRunRepo {
    async fn get(&self, ctx: &AuthContext, run_id: &str) -> GatewayResult<RunRecord> {
        {
            let records = self.records.read();
            if let Some(record) = records.get(run_id) {
                return if record.tenant_id == ctx.tenant_id {
                    Ok(record.clone())
                } else {
                    Err(GatewayError::NotFound(format!("run {run_id}")))
                };
            }
        }

        let now = Utc::now();
        let record = RunRecord {
            run_id: run_id.to_string(),
            tenant_id: ctx.tenant_id.clone(),
            stored_status: None,
            close_time: None,
            total_actions: 0,
            first_seen: now,
            last_updated: now,
        };
        self.records.write().insert(run_id.to_string(), record.clone());
        Ok(record)
    }

    async fn cache_terminal_status(
        &self,
        run_id: &str,
        status: RunStatus,
        close_time: DateTime<Utc>,
    ) -> Result<(), String> {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(run_id) else {
            return Err(format!("run {run_id} has no registry entry to cache against"));
        };
        // Monotonic terminality: a terminal status, once stored, is
        // never replaced.
        if record.stored_status.map(|s| s.is_terminal()).unwrap_or(false) {
            return Ok(());
        }
        record.stored_status = Some(status);
        record.close_time = Some(close_time);
        record.last_updated = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(tenant: &str) -> AuthContext {
        AuthContext::public_link(tenant)
    }

    #[tokio::test]
    async fn first_lookup_binds_run_to_caller_tenant() {
        let repo = InMemoryRunRepo::new();
        let record = repo.get(&ctx("tenant-a"), "run-1").await.unwrap();
        assert_eq!(record.tenant_id, "tenant-a");
        assert!(record.stored_status.is_none());
    }

    #[tokio::test]
    async fn cross_tenant_lookup_is_not_found() {
        let repo = InMemoryRunRepo::new();
        repo.get(&ctx("tenant-a"), "run-1").await.unwrap();
        let err = repo.get(&ctx("tenant-b"), "run-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn terminal_cache_write_is_not_overwritten() {
        let repo = InMemoryRunRepo::new();
        repo.get(&ctx("tenant-a"), "run-1").await.unwrap();
        repo.cache_terminal_status("run-1", RunStatus::Completed, Utc::now())
            .await
            .unwrap();
        repo.cache_terminal_status("run-1", RunStatus::Failed, Utc::now())
            .await
            .unwrap();
        let record = repo.get(&ctx("tenant-a"), "run-1").await.unwrap();
        assert_eq!(record.stored_status, Some(RunStatus::Completed));
    }
}
