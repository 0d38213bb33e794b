//! Biblioteca Library Inventory and Lending Server
//!
//! A Rust REST API server managing a physical book inventory, its
//! lending workflow, operator accounts and the audit trail behind them.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
