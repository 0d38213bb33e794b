//! Data models for the Biblioteca server

pub mod audit;
pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use audit::{AuditAction, AuditEntry};
pub use book::{Book, BookShort};
pub use loan::{Loan, LoanDetails, LoanStatus};
pub use user::{Role, User, UserShort};
