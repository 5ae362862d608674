mod error;
mod filters;
pub mod jid;
mod models;
mod timestamp;

pub use error::InvalidFilter;
pub use filters::*;
pub use models::*;
pub use timestamp::{parse_date_bound, parse_stored_timestamp};
