//! Audit trail service

use crate::{
    error::AppResult,
    models::audit::{AuditEntry, AuditQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuditService {
    repository: Repository,
}

impl AuditService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List audit entries, newest first
    pub async fn list_entries(&self, query: &AuditQuery) -> AppResult<(Vec<AuditEntry>, i64)> {
        self.repository.audit.list(query).await
    }
}
