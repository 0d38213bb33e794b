//! CSV inventory import service.
//!
//! Accepts the physical register exported as CSV: one row per book with
//! the columns shelf mark, registration code, author, title, edition and
//! copy count. The header row is skipped, quoted fields are honored, and
//! rows too short to carry a title are dropped.

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::CreateBook,
    repository::Repository,
};

/// Outcome of an import run
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Clone)]
pub struct ImportService {
    repository: Repository,
}

impl ImportService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Import books from CSV data. Rows that fail to parse or insert are
    /// skipped; the rest keep arriving, so a bad line never aborts the run.
    pub async fn import_csv(&self, data: &[u8]) -> AppResult<ImportReport> {
        let rows = parse_rows(data)?;

        let mut imported = 0;
        let mut skipped = 0;
        for row in &rows {
            match self.repository.books.create_from_import(row).await {
                Ok(_) => imported += 1,
                Err(e) => {
                    tracing::warn!("Skipping import row '{}': {}", row.title, e);
                    skipped += 1;
                }
            }
        }

        Ok(ImportReport { imported, skipped })
    }
}

fn clean(field: Option<&str>) -> Option<String> {
    field
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}

/// Parse CSV bytes into create-book rows.
///
/// Column layout: shelf mark, registration code, author, title, edition,
/// copies. Rows with fewer than four columns are skipped, as are rows
/// whose parsed form fails validation.
pub fn parse_rows(data: &[u8]) -> AppResult<Vec<CreateBook>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| AppError::BadRequest(format!("Malformed CSV: {}", e)))?;

        if record.len() < 4 {
            continue;
        }

        let total_copies = record
            .get(5)
            .and_then(|c| c.trim().parse::<i32>().ok())
            .unwrap_or(1)
            .max(1);

        let book = CreateBook {
            title: clean(record.get(3)).unwrap_or_else(|| "Untitled".to_string()),
            author: clean(record.get(2)),
            sig_top: clean(record.get(0)),
            registration_code: clean(record.get(1)),
            edition: clean(record.get(4)),
            registration_date: None,
            total_copies,
            available_copies: None,
        };

        if book.validate().is_ok() {
            rows.push(book);
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_the_header() {
        let data = b"sig_top,code,author,title,edition,copies\n\
            HIS-01,R-100,Galeano,Las venas abiertas,2a,3\n\
            ,,Borges,Ficciones,,\n";
        let rows = parse_rows(data).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Las venas abiertas");
        assert_eq!(rows[0].sig_top.as_deref(), Some("HIS-01"));
        assert_eq!(rows[0].total_copies, 3);
        assert_eq!(rows[1].title, "Ficciones");
        assert_eq!(rows[1].total_copies, 1);
        assert!(rows[1].author.as_deref() == Some("Borges"));
    }

    #[test]
    fn quoted_fields_keep_embedded_commas() {
        let data = b"sig_top,code,author,title,edition,copies\n\
            LIT-02,R-200,\"Cervantes, Miguel de\",\"Don Quijote, I\",1a,2\n";
        let rows = parse_rows(data).unwrap();
        assert_eq!(rows[0].author.as_deref(), Some("Cervantes, Miguel de"));
        assert_eq!(rows[0].title, "Don Quijote, I");
    }

    #[test]
    fn short_rows_are_skipped() {
        let data = b"sig_top,code,author,title,edition,copies\n\
            only,three,columns\n\
            A,B,C,Valid title\n";
        let rows = parse_rows(data).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "Valid title");
    }

    #[test]
    fn blank_titles_fall_back_to_a_placeholder() {
        let data = b"sig_top,code,author,title,edition,copies\n\
            A,B,C,   ,1a,2\n";
        let rows = parse_rows(data).unwrap();
        assert_eq!(rows[0].title, "Untitled");
    }

    #[test]
    fn nonsense_copy_counts_default_to_one() {
        let data = b"sig_top,code,author,title,edition,copies\n\
            A,B,C,T,1a,zero\n\
            A,B,C,T2,1a,-4\n";
        let rows = parse_rows(data).unwrap();
        assert_eq!(rows[0].total_copies, 1);
        assert_eq!(rows[1].total_copies, 1);
    }
}
