use std::path::{Path, PathBuf};
use std::time::Duration;

use arca_core::UserId;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};

use crate::error::{DbError, Result};

pub const DEFAULT_STORE_FILE: &str = "messages.db";

/// Maps a user to the store file the bridge keeps for them:
/// `<root>/<user_id>/<file_name>`.
#[derive(Debug, Clone)]
pub struct StoreLocator {
    root: PathBuf,
    file_name: String,
}

impl StoreLocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_name: DEFAULT_STORE_FILE.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn path_for(&self, user: &UserId) -> PathBuf {
        self.root.join(user.as_str()).join(&self.file_name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// One read-only connection to a user's store.
///
/// Opened per operation and handed back through [`ArchiveDb::close`]. The
/// bridge is the only writer, so nothing here takes locks of its own.
pub struct ArchiveDb {
    pub(crate) conn: SqliteConnection,
}

impl ArchiveDb {
    pub async fn open(path: &Path, options: &StoreOptions) -> Result<Self> {
        if !path.is_file() {
            return Err(DbError::StoreMissing(path.to_path_buf()));
        }

        let conn = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false)
            .busy_timeout(options.busy_timeout)
            .connect()
            .await?;

        tracing::debug!(path = %path.display(), "Store opened read-only");

        Ok(Self { conn })
    }

    /// Release the connection. Close failures are only logged since the
    /// caller already has its result.
    pub async fn close(self) {
        if let Err(e) = self.conn.close().await {
            tracing::warn!("Failed to close store connection: {}", e);
        }
    }
}
