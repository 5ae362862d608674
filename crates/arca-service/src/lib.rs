mod config;
mod error;
mod format;
mod keywords;
mod service;

pub use config::{ArchiveConfig, DEFAULT_KEYWORD_CAP};
pub use error::{ArchiveError, ConfigError, Result};
pub use format::format_message;
pub use keywords::{KeywordRequest, KeywordSet, match_messages};
pub use service::ArchiveService;

pub use arca_core::*;
