mod chats;
mod context;
mod error;
mod messages;
pub mod query;
mod rows;
pub mod schema;
mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use store::{ArchiveDb, DEFAULT_STORE_FILE, StoreLocator, StoreOptions};
