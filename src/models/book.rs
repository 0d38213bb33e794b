//! Book (inventory) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    /// Monotonically assigned inventory number, used for display ordering
    pub sequence_number: i32,
    pub title: String,
    pub author: Option<String>,
    /// Shelf classification ("SIG. TOP" on the physical register)
    pub sig_top: Option<String>,
    /// Human-assigned registration code
    pub registration_code: Option<String>,
    pub edition: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    pub total_copies: i32,
    /// Copies not currently on loan; never negative, never above total_copies
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short book representation embedded in loan listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookShort {
    pub id: i32,
    pub sequence_number: i32,
    pub title: String,
    pub author: Option<String>,
    pub registration_code: Option<String>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author: Option<String>,
    pub sig_top: Option<String>,
    pub registration_code: Option<String>,
    pub edition: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Copy count must be at least 1"))]
    pub total_copies: i32,
    /// Defaults to total_copies when omitted
    #[validate(range(min = 0, message = "Available copies cannot be negative"))]
    pub available_copies: Option<i32>,
}

/// Update book request; only provided fields change
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    pub sig_top: Option<String>,
    pub registration_code: Option<String>,
    pub edition: Option<String>,
    pub registration_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, message = "Copy count must be at least 1"))]
    pub total_copies: Option<i32>,
}

/// Book search parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Substring match over title, author, registration code and shelf mark
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Recompute availability when the copy count of a book is edited.
///
/// The delta between the new and old totals is applied to the current
/// availability, floored at 0 and capped at the new total so the
/// `0 <= available <= total` invariant survives the edit.
pub fn recompute_available(old_total: i32, old_available: i32, new_total: i32) -> i32 {
    (old_available + (new_total - old_total)).clamp(0, new_total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growing_the_total_grows_availability_by_the_delta() {
        // {total: 3, available: 1} edited to total 5 -> available 3
        assert_eq!(recompute_available(3, 1, 5), 3);
    }

    #[test]
    fn shrinking_the_total_floors_availability_at_zero() {
        assert_eq!(recompute_available(5, 1, 2), 0);
    }

    #[test]
    fn availability_never_exceeds_the_new_total() {
        assert_eq!(recompute_available(2, 2, 1), 1);
    }

    #[test]
    fn unchanged_total_keeps_availability() {
        assert_eq!(recompute_available(4, 2, 4), 2);
    }
}
