//! Loans repository for database operations

use chrono::{DateTime, Duration, NaiveTime, Utc};
use sqlx::{postgres::PgRow, Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        audit::{AuditAction, NewAuditEntry},
        book::{Book, BookShort},
        loan::{
            append_return_notes, is_overdue, CreateLoan, Loan, LoanDetails, LoanQuery, LoanStatus,
            MAX_ACTIVE_LOANS_PER_BORROWER,
        },
        user::UserShort,
    },
    repository::audit,
};

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.borrower_name, l.borrower_id_number, l.borrower_email,
           l.loan_date, l.due_date, l.return_date, l.status, l.notes,
           b.id AS book_id, b.sequence_number AS book_sequence_number,
           b.title AS book_title, b.author AS book_author,
           b.registration_code AS book_registration_code,
           u.id AS operator_id, u.name AS operator_name
    FROM loans l
    LEFT JOIN books b ON l.book_id = b.id
    JOIN users u ON l.operator_user_id = u.id
"#;

fn row_to_details(row: &PgRow, now: DateTime<Utc>) -> LoanDetails {
    let status: LoanStatus = row.get("status");
    let due_date: DateTime<Utc> = row.get("due_date");

    // The book side of the join is empty once the book was deleted
    let book = row
        .get::<Option<i32>, _>("book_id")
        .map(|book_id| BookShort {
            id: book_id,
            sequence_number: row.get("book_sequence_number"),
            title: row.get("book_title"),
            author: row.get("book_author"),
            registration_code: row.get("book_registration_code"),
        });

    LoanDetails {
        id: row.get("id"),
        book,
        borrower_name: row.get("borrower_name"),
        borrower_id_number: row.get("borrower_id_number"),
        borrower_email: row.get("borrower_email"),
        operator: UserShort {
            id: row.get("operator_id"),
            name: row.get("operator_name"),
        },
        loan_date: row.get("loan_date"),
        due_date,
        return_date: row.get("return_date"),
        status,
        notes: row.get("notes"),
        is_overdue: is_overdue(status, due_date, now),
    }
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loan with book and operator joined
    pub async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        let query = format!("{} WHERE l.id = $1", DETAILS_SELECT);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))?;

        Ok(row_to_details(&row, Utc::now()))
    }

    /// Count active loans held by a borrower (by ID number)
    pub async fn active_count_for_borrower(&self, borrower_id_number: &str) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id_number = $1 AND status = 'ACTIVE'",
        )
        .bind(borrower_id_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Create loans for the requested books, one row per book.
    ///
    /// The availability decrement and loan insert commit atomically; the
    /// decrement is predicated on `available_copies > 0` so concurrent
    /// requests for the last copy serialize on the book row and the loser
    /// maps to a conflict.
    pub async fn create(
        &self,
        operator_user_id: i32,
        loan: &CreateLoan,
    ) -> AppResult<Vec<LoanDetails>> {
        let borrower_id = loan.borrower_id_number.trim().to_string();
        let borrower_name = loan.borrower_name.trim().to_string();
        let now = Utc::now();
        let due_date = loan.due_date.and_time(NaiveTime::MIN).and_utc();

        let books = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ANY($1)")
            .bind(&loan.book_ids[..])
            .fetch_all(&self.pool)
            .await?;

        for &book_id in &loan.book_ids {
            let book = books
                .iter()
                .find(|b| b.id == book_id)
                .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

            if book.available_copies <= 0 {
                return Err(AppError::Conflict(format!(
                    "No copies of \"{}\" available",
                    book.title
                )));
            }
        }

        let active = self.active_count_for_borrower(&borrower_id).await?;
        let requested = loan.book_ids.len() as i64;
        if active + requested > MAX_ACTIVE_LOANS_PER_BORROWER {
            return Err(AppError::Conflict(format!(
                "The borrower already has {} active loan(s) and cannot take {} more (maximum {})",
                active, requested, MAX_ACTIVE_LOANS_PER_BORROWER
            )));
        }

        let mut tx = self.pool.begin().await?;
        let mut created_ids = Vec::with_capacity(loan.book_ids.len());

        for &book_id in &loan.book_ids {
            let updated = sqlx::query(
                r#"
                UPDATE books
                SET available_copies = available_copies - 1, updated_at = $1
                WHERE id = $2 AND available_copies > 0
                "#,
            )
            .bind(now)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

            // A concurrent loan may have taken the last copy between the
            // pre-check and this point; the guarded update catches it.
            if updated.rows_affected() == 0 {
                let title = books
                    .iter()
                    .find(|b| b.id == book_id)
                    .map(|b| b.title.clone())
                    .unwrap_or_else(|| format!("book {}", book_id));
                return Err(AppError::Conflict(format!(
                    "No copies of \"{}\" available",
                    title
                )));
            }

            let loan_id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO loans (
                    book_id, borrower_name, borrower_id_number, borrower_email,
                    operator_user_id, loan_date, due_date, status, notes
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, 'ACTIVE', $8)
                RETURNING id
                "#,
            )
            .bind(book_id)
            .bind(&borrower_name)
            .bind(&borrower_id)
            .bind(&loan.borrower_email)
            .bind(operator_user_id)
            .bind(now)
            .bind(due_date)
            .bind(&loan.notes)
            .fetch_one(&mut *tx)
            .await?;

            let title = books
                .iter()
                .find(|b| b.id == book_id)
                .map(|b| b.title.as_str())
                .unwrap_or("?");

            audit::append(
                &mut *tx,
                &NewAuditEntry {
                    action: AuditAction::Create,
                    entity_type: "Loan",
                    entity_id: Some(loan_id),
                    acting_user_id: Some(operator_user_id),
                    details: format!(
                        "Loan created: {} for {} (ID {})",
                        title, borrower_name, borrower_id
                    ),
                },
            )
            .await?;

            created_ids.push(loan_id);
        }

        tx.commit().await?;

        let mut details = Vec::with_capacity(created_ids.len());
        for id in created_ids {
            details.push(self.get_details(id).await?);
        }
        Ok(details)
    }

    /// Return a loan. The status change and the availability increment
    /// commit atomically; a second return of the same loan is rejected.
    pub async fn return_loan(
        &self,
        loan_id: i32,
        notes: Option<&str>,
        acting_user_id: i32,
    ) -> AppResult<LoanDetails> {
        let loan = self.get_by_id(loan_id).await?;

        if loan.status == LoanStatus::Returned {
            return Err(AppError::Conflict(
                "This loan was already returned".to_string(),
            ));
        }

        let book_title: Option<String> = match loan.book_id {
            Some(book_id) => {
                sqlx::query_scalar("SELECT title FROM books WHERE id = $1")
                    .bind(book_id)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => None,
        };

        let now = Utc::now();
        let combined_notes = append_return_notes(loan.notes.as_deref(), notes);

        let mut tx = self.pool.begin().await?;

        // Predicated on ACTIVE so a concurrent return of the same loan
        // loses here instead of incrementing availability twice.
        let updated = sqlx::query(
            r#"
            UPDATE loans SET status = 'RETURNED', return_date = $1, notes = $2
            WHERE id = $3 AND status = 'ACTIVE'
            "#,
        )
        .bind(now)
        .bind(&combined_notes)
        .bind(loan_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "This loan was already returned".to_string(),
            ));
        }

        if let Some(book_id) = loan.book_id {
            sqlx::query(
                "UPDATE books SET available_copies = available_copies + 1, updated_at = $1 WHERE id = $2",
            )
            .bind(now)
            .bind(book_id)
            .execute(&mut *tx)
            .await?;
        }

        audit::append(
            &mut *tx,
            &NewAuditEntry {
                action: AuditAction::Return,
                entity_type: "Loan",
                entity_id: Some(loan_id),
                acting_user_id: Some(acting_user_id),
                details: format!(
                    "Book returned: {} by {}",
                    book_title.as_deref().unwrap_or("(removed book)"),
                    loan.borrower_name
                ),
            },
        )
        .await?;

        tx.commit().await?;

        self.get_details(loan_id).await
    }

    /// List loans joined with book and operator, newest first. Supports an
    /// optional status filter and an inclusive date range (end-of-day upper
    /// bound) for reporting.
    pub async fn list(&self, query: &LoanQuery) -> AppResult<Vec<LoanDetails>> {
        let mut conditions = Vec::new();
        let mut param_idx = 1;

        if query.status.is_some() {
            conditions.push(format!("l.status = ${}", param_idx));
            param_idx += 1;
        }
        if query.from.is_some() {
            conditions.push(format!("l.loan_date >= ${}", param_idx));
            param_idx += 1;
        }
        if query.to.is_some() {
            conditions.push(format!("l.loan_date < ${}", param_idx));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "{} {} ORDER BY l.loan_date DESC, l.id DESC",
            DETAILS_SELECT, where_clause
        );

        let mut builder = sqlx::query(&sql);
        if let Some(status) = query.status {
            builder = builder.bind(status);
        }
        if let Some(from) = query.from {
            builder = builder.bind(from.and_time(NaiveTime::MIN).and_utc());
        }
        if let Some(to) = query.to {
            // Upper bound is inclusive of the whole day
            builder = builder.bind(to.and_time(NaiveTime::MIN).and_utc() + Duration::days(1));
        }

        let rows = builder.fetch_all(&self.pool).await?;

        let now = Utc::now();
        Ok(rows.iter().map(|row| row_to_details(row, now)).collect())
    }

    /// Count active loans
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE status = 'ACTIVE'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Count overdue loans (active past their due date)
    pub async fn count_overdue(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE status = 'ACTIVE' AND due_date < NOW()",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Count loans recorded by an operator (active or returned)
    pub async fn count_for_operator(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE operator_user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
