//! Inventory management service

use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct BooksService {
    repository: Repository,
}

impl BooksService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Search the inventory
    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        self.repository.books.search(query).await
    }

    /// Register a new book
    pub async fn create_book(&self, book: CreateBook, acting_user_id: i32) -> AppResult<Book> {
        book.validate()?;
        self.repository.books.create(&book, acting_user_id).await
    }

    /// Update an existing book
    pub async fn update_book(
        &self,
        id: i32,
        book: UpdateBook,
        acting_user_id: i32,
    ) -> AppResult<Book> {
        book.validate()?;
        self.repository.books.update(id, &book, acting_user_id).await
    }

    /// Delete a book. Fails while the book has active loans.
    pub async fn delete_book(&self, id: i32, acting_user_id: i32) -> AppResult<()> {
        self.repository.books.delete(id, acting_user_id).await
    }
}
