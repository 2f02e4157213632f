pub mod app;
pub mod config;
pub mod engine;
pub mod gateway;
pub mod models;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::{AppError, Result};
