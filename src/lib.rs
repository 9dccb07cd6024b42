//! Inventaris server
//!
//! REST JSON API for a school inventory: catalog items (consumable stock or
//! serialized units), loan requests with an approval workflow and returns,
//! and an activity log.

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
