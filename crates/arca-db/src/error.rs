use std::path::PathBuf;

use arca_core::InvalidFilter;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Store not found at {}", .0.display())]
    StoreMissing(PathBuf),

    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilter),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Unreadable timestamp in store: {value}")]
    Timestamp { value: String },
}

pub type Result<T> = std::result::Result<T, DbError>;
