//! Loan model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::book::BookShort;
use super::user::UserShort;

/// Maximum concurrent active loans per borrower (by ID number)
pub const MAX_ACTIVE_LOANS_PER_BORROWER: i64 = 3;

/// Loan lifecycle state. "Overdue" is derived at read time, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Returned,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Returned => "RETURNED",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(LoanStatus::Active),
            "RETURNED" => Ok(LoanStatus::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as TEXT)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Loan {
    pub id: i32,
    /// NULL once the book has been removed from the inventory
    pub book_id: Option<i32>,
    pub borrower_name: String,
    /// Borrower document number; string to preserve leading zeros.
    /// Keyed on for the delinquency check.
    pub borrower_id_number: String,
    pub borrower_email: Option<String>,
    pub operator_user_id: i32,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub notes: Option<String>,
}

/// Loan joined with book and operator for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i32,
    /// Absent when the book was deleted after the loan closed
    pub book: Option<BookShort>,
    pub borrower_name: String,
    pub borrower_id_number: String,
    pub borrower_email: Option<String>,
    pub operator: UserShort,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub notes: Option<String>,
    pub is_overdue: bool,
}

/// Create loan request. Several books may be lent to the same borrower
/// in one operation; each produces its own loan row.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    #[validate(length(min = 1, message = "At least one book must be selected"))]
    pub book_ids: Vec<i32>,
    #[validate(length(min = 2, message = "Borrower name must be at least 2 characters"))]
    pub borrower_name: String,
    #[validate(length(min = 5, message = "Borrower ID number must be at least 5 characters"))]
    pub borrower_id_number: String,
    #[validate(email(message = "Invalid email format"))]
    pub borrower_email: Option<String>,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// Return loan request body
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ReturnLoan {
    pub notes: Option<String>,
}

/// Loan listing filters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    /// Inclusive lower bound on loan_date
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on loan_date (end of day)
    pub to: Option<NaiveDate>,
}

/// A loan is overdue when it is still active past its due date.
pub fn is_overdue(status: LoanStatus, due_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    status == LoanStatus::Active && due_date < now
}

/// Append return notes to the existing notes, newline-separated.
pub fn append_return_notes(existing: Option<&str>, notes: Option<&str>) -> Option<String> {
    match notes {
        Some(n) if !n.trim().is_empty() => {
            let combined = format!("{}\n[Return] {}", existing.unwrap_or(""), n.trim());
            Some(combined.trim().to_string())
        }
        _ => existing.map(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn return_notes_append_newline_separated() {
        let combined = append_return_notes(Some("handle with care"), Some("cover damaged"));
        assert_eq!(
            combined.as_deref(),
            Some("handle with care\n[Return] cover damaged")
        );
    }

    #[test]
    fn return_notes_without_existing_drop_leading_newline() {
        let combined = append_return_notes(None, Some("all good"));
        assert_eq!(combined.as_deref(), Some("[Return] all good"));
    }

    #[test]
    fn blank_return_notes_keep_existing() {
        assert_eq!(
            append_return_notes(Some("keep me"), Some("   ")).as_deref(),
            Some("keep me")
        );
        assert_eq!(append_return_notes(None, None), None);
    }

    #[test]
    fn overdue_is_derived_from_active_past_due() {
        let due = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2024, 1, 9, 12, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 1, 11, 12, 0, 0).unwrap();

        assert!(!is_overdue(LoanStatus::Active, due, before));
        assert!(is_overdue(LoanStatus::Active, due, after));
        // Returned loans are never overdue
        assert!(!is_overdue(LoanStatus::Returned, due, after));
    }

    #[test]
    fn status_round_trips_through_strings() {
        assert_eq!("ACTIVE".parse::<LoanStatus>().unwrap(), LoanStatus::Active);
        assert_eq!(
            "returned".parse::<LoanStatus>().unwrap(),
            LoanStatus::Returned
        );
        assert!("CANCELLED".parse::<LoanStatus>().is_err());
    }
}
