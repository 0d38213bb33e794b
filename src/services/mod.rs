//! Business logic services

pub mod audit;
pub mod books;
pub mod import;
pub mod loans;
pub mod stats;
pub mod users;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub books: books::BooksService,
    pub loans: loans::LoansService,
    pub users: users::UsersService,
    pub audit: audit::AuditService,
    pub import: import::ImportService,
    pub stats: stats::StatsService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        Self {
            books: books::BooksService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            users: users::UsersService::new(repository.clone(), auth_config),
            audit: audit::AuditService::new(repository.clone()),
            import: import::ImportService::new(repository.clone()),
            stats: stats::StatsService::new(repository),
        }
    }
}
