//! Dashboard statistics endpoints

use axum::{extract::State, Json};

use crate::{error::AppResult, services::stats::Stats};

use super::AuthenticatedUser;

/// Get dashboard counters
#[utoipa::path(
    get,
    path = "/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard counters", body = Stats),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_stats(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Stats>> {
    let stats = state.services.stats.get_stats().await?;
    Ok(Json(stats))
}
