//! Dashboard statistics service

use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, repository::Repository};

/// Aggregated counters for the dashboard
#[derive(Debug, Serialize, ToSchema)]
pub struct Stats {
    pub books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub users: i64,
}

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Collect the dashboard counters
    pub async fn get_stats(&self) -> AppResult<Stats> {
        let (books, total_copies, available_copies) =
            self.repository.books.inventory_totals().await?;
        let active_loans = self.repository.loans.count_active().await?;
        let overdue_loans = self.repository.loans.count_overdue().await?;
        let users = self.repository.users.count().await?;

        Ok(Stats {
            books,
            total_copies,
            available_copies,
            active_loans,
            overdue_loans,
            users,
        })
    }
}
