use thiserror::Error;

/// A caller-supplied filter value that cannot be used to build a query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid value for '{field}': {value}")]
pub struct InvalidFilter {
    pub field: &'static str,
    pub value: String,
}

impl InvalidFilter {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }
}
