use arca_core::InvalidFilter;
use arca_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    InvalidFilter(#[from] InvalidFilter),

    #[error("Message not found: {message_id}")]
    NotFound { message_id: String },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(DbError),

    /// A row the bridge wrote that cannot be decoded. Never degraded.
    #[error("Unreadable archive row: {0}")]
    CorruptRow(DbError),
}

impl From<DbError> for ArchiveError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InvalidFilter(filter) => ArchiveError::InvalidFilter(filter),
            DbError::MessageNotFound(message_id) => ArchiveError::NotFound { message_id },
            err @ DbError::Timestamp { .. } => ArchiveError::CorruptRow(err),
            other => ArchiveError::StoreUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}
