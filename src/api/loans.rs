//! Loan workflow endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::loan::{CreateLoan, LoanDetails, LoanQuery, ReturnLoan},
};

use super::AuthenticatedUser;

/// List loans, optionally filtered by status and date range
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("status" = Option<String>, Query, description = "Filter by status (ACTIVE or RETURNED)"),
        ("from" = Option<String>, Query, description = "Inclusive lower bound on loan date (YYYY-MM-DD)"),
        ("to" = Option<String>, Query, description = "Inclusive upper bound on loan date (YYYY-MM-DD)")
    ),
    responses(
        (status = 200, description = "List of loans", body = Vec<LoanDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.list_loans(&query).await?;
    Ok(Json(loans))
}

/// Get loan details by ID
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanDetails),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state.services.loans.get_loan(id).await?;
    Ok(Json(loan))
}

/// Lend one or more books to a borrower
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loans created", body = Vec<LoanDetails>),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copies available or borrower limit reached")
    )
)]
pub async fn create_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(loan): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Vec<LoanDetails>>)> {
    let created = state
        .services
        .loans
        .create_loans(claims.user_id, loan)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ReturnLoan,
    responses(
        (status = 200, description = "Loan returned", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan was already returned")
    )
)]
pub async fn return_loan(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    request: Option<Json<ReturnLoan>>,
) -> AppResult<Json<LoanDetails>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let returned = state
        .services
        .loans
        .return_loan(id, request, claims.user_id)
        .await?;
    Ok(Json(returned))
}
