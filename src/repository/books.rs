//! Books repository for database operations

use chrono::Utc;
use sqlx::{Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        audit::{AuditAction, NewAuditEntry},
        book::{recompute_available, Book, BookQuery, CreateBook, UpdateBook},
    },
    repository::audit,
};

const SEQUENCE_CONSTRAINT: &str = "books_sequence_number_key";

/// Escape LIKE metacharacters so user input only ever matches literally
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Search books with pagination. The query string matches title, author,
    /// registration code and shelf mark case-insensitively; an empty query
    /// returns the whole inventory ordered by sequence number.
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).clamp(1, 200);
        let offset = (page - 1) * per_page;

        let pattern = query
            .q
            .as_ref()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(&q.to_lowercase())));

        let where_clause = if pattern.is_some() {
            r#"
            WHERE LOWER(title) LIKE $1
               OR LOWER(COALESCE(author, '')) LIKE $1
               OR LOWER(COALESCE(registration_code, '')) LIKE $1
               OR LOWER(COALESCE(sig_top, '')) LIKE $1
            "#
        } else {
            ""
        };

        let count_query = format!("SELECT COUNT(*) FROM books {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        if let Some(ref p) = pattern {
            count_builder = count_builder.bind(p);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "SELECT * FROM books {} ORDER BY sequence_number ASC LIMIT {} OFFSET {}",
            where_clause, per_page, offset
        );
        let mut select_builder = sqlx::query_as::<_, Book>(&select_query);
        if let Some(ref p) = pattern {
            select_builder = select_builder.bind(p);
        }
        let books = select_builder.fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    /// Create a new book, assigning the next sequence number.
    ///
    /// The max+1 read is racy under concurrent creates; the UNIQUE
    /// constraint on sequence_number turns the lost update into a database
    /// conflict, which we absorb with a bounded retry.
    pub async fn create(&self, book: &CreateBook, acting_user_id: i32) -> AppResult<Book> {
        let available = book
            .available_copies
            .unwrap_or(book.total_copies)
            .min(book.total_copies);

        for _ in 0..3 {
            let mut tx = self.pool.begin().await?;

            let inserted = sqlx::query_as::<_, Book>(
                r#"
                INSERT INTO books (
                    sequence_number, title, author, sig_top, registration_code,
                    edition, registration_date, total_copies, available_copies
                )
                SELECT COALESCE(MAX(sequence_number), 0) + 1, $1, $2, $3, $4, $5, $6, $7, $8
                FROM books
                RETURNING *
                "#,
            )
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.sig_top)
            .bind(&book.registration_code)
            .bind(&book.edition)
            .bind(&book.registration_date)
            .bind(book.total_copies)
            .bind(available)
            .fetch_one(&mut *tx)
            .await;

            match inserted {
                Ok(created) => {
                    audit::append(
                        &mut *tx,
                        &NewAuditEntry {
                            action: AuditAction::Create,
                            entity_type: "Book",
                            entity_id: Some(created.id),
                            acting_user_id: Some(acting_user_id),
                            details: format!(
                                "Created book: {} (No. {})",
                                created.title, created.sequence_number
                            ),
                        },
                    )
                    .await?;
                    tx.commit().await?;
                    return Ok(created);
                }
                Err(sqlx::Error::Database(db))
                    if db.constraint() == Some(SEQUENCE_CONSTRAINT) =>
                {
                    tx.rollback().await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(
            "Could not assign an inventory number, please retry".to_string(),
        ))
    }

    /// Update an existing book. A change to total_copies adjusts
    /// available_copies by the same delta, floored at zero.
    pub async fn update(
        &self,
        id: i32,
        book: &UpdateBook,
        acting_user_id: i32,
    ) -> AppResult<Book> {
        let existing = self.get_by_id(id).await?;
        let now = Utc::now();

        let copies = book.total_copies.map(|new_total| {
            (
                new_total,
                recompute_available(existing.total_copies, existing.available_copies, new_total),
            )
        });

        // Build dynamic update query
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(book.title, "title");
        add_field!(book.author, "author");
        add_field!(book.sig_top, "sig_top");
        add_field!(book.registration_code, "registration_code");
        add_field!(book.edition, "edition");
        add_field!(book.registration_date, "registration_date");

        if copies.is_some() {
            sets.push(format!("total_copies = ${}", param_idx));
            sets.push(format!("available_copies = ${}", param_idx + 1));
        }

        let query = format!("UPDATE books SET {} WHERE id = {}", sets.join(", "), id);

        let mut tx = self.pool.begin().await?;

        let mut builder = sqlx::query(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(book.title);
        bind_field!(book.author);
        bind_field!(book.sig_top);
        bind_field!(book.registration_code);
        bind_field!(book.edition);
        bind_field!(book.registration_date);

        if let Some((total, available)) = copies {
            builder = builder.bind(total).bind(available);
        }

        builder.execute(&mut *tx).await?;

        audit::append(
            &mut *tx,
            &NewAuditEntry {
                action: AuditAction::Update,
                entity_type: "Book",
                entity_id: Some(id),
                acting_user_id: Some(acting_user_id),
                details: format!(
                    "Updated book: {} (No. {})",
                    existing.title, existing.sequence_number
                ),
            },
        )
        .await?;

        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Delete a book. Blocked while the book has active loans.
    pub async fn delete(&self, id: i32, acting_user_id: i32) -> AppResult<()> {
        let book = self.get_by_id(id).await?;

        let active_loans: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE book_id = $1 AND status = 'ACTIVE'",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if active_loans > 0 {
            return Err(AppError::Conflict(format!(
                "Cannot delete: the book has {} active loan(s)",
                active_loans
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::append(
            &mut *tx,
            &NewAuditEntry {
                action: AuditAction::Delete,
                entity_type: "Book",
                entity_id: Some(id),
                acting_user_id: Some(acting_user_id),
                details: format!(
                    "Deleted book: {} (No. {})",
                    book.title, book.sequence_number
                ),
            },
        )
        .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Insert a book from the CSV importer. Same sequence assignment as
    /// create, but without an audit entry per row.
    pub async fn create_from_import(&self, book: &CreateBook) -> AppResult<Book> {
        let available = book.available_copies.unwrap_or(book.total_copies);

        for _ in 0..3 {
            let inserted = sqlx::query_as::<_, Book>(
                r#"
                INSERT INTO books (
                    sequence_number, title, author, sig_top, registration_code,
                    edition, registration_date, total_copies, available_copies
                )
                SELECT COALESCE(MAX(sequence_number), 0) + 1, $1, $2, $3, $4, $5, $6, $7, $8
                FROM books
                RETURNING *
                "#,
            )
            .bind(&book.title)
            .bind(&book.author)
            .bind(&book.sig_top)
            .bind(&book.registration_code)
            .bind(&book.edition)
            .bind(&book.registration_date)
            .bind(book.total_copies)
            .bind(available)
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(created) => return Ok(created),
                Err(sqlx::Error::Database(db))
                    if db.constraint() == Some(SEQUENCE_CONSTRAINT) =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AppError::Conflict(
            "Could not assign an inventory number, please retry".to_string(),
        ))
    }

    /// Inventory totals for the dashboard: (books, total copies, available copies)
    pub async fn inventory_totals(&self) -> AppResult<(i64, i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS books,
                   COALESCE(SUM(total_copies), 0)::bigint AS total_copies,
                   COALESCE(SUM(available_copies), 0)::bigint AS available_copies
            FROM books
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((
            row.get("books"),
            row.get("total_copies"),
            row.get("available_copies"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_metacharacters_are_matched_literally() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("sig_top"), "sig\\_top");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain title"), "plain title");
    }
}
