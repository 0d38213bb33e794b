//! Audit trail endpoints

use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    error::AppResult,
    models::audit::{AuditEntry, AuditQuery},
};

use super::{books::PaginatedResponse, AuthenticatedUser};

/// List audit entries, newest first
#[utoipa::path(
    get,
    path = "/audit",
    tag = "audit",
    security(("bearer_auth" = [])),
    params(
        ("page" = Option<i64>, Query, description = "Page number (default: 1)"),
        ("per_page" = Option<i64>, Query, description = "Entries per page (default: 50)")
    ),
    responses(
        (status = 200, description = "Audit entries", body = PaginatedResponse<AuditEntry>),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn list_audit(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<AuditQuery>,
) -> AppResult<Json<PaginatedResponse<AuditEntry>>> {
    claims.require_admin()?;

    let (entries, total) = state.services.audit.list_entries(&query).await?;

    Ok(Json(PaginatedResponse {
        items: entries,
        total,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(50),
    }))
}
