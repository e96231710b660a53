use thiserror::Error;

/// Errors that can occur during skill graph operations.
#[derive(Error, Debug)]
pub enum SkillGraphError {
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("not found: {uri}")]
    NotFound { uri: String },

    #[error("ambiguous prefix '{prefix}' matches {} records", candidates.len())]
    Ambiguous {
        prefix: String,
        candidates: Vec<String>,
    },

    #[error("data source error: {message} (category: {category})")]
    DataSource { message: String, category: String },

    #[error("vector index not found at {location}")]
    IndexNotFound { location: String },

    #[error("index has {index_count} entries but table has {table_count}")]
    IndexConsistency {
        table_count: usize,
        index_count: usize,
    },

    #[error("http error: {message} (url: {url})")]
    Http { message: String, url: String },

    #[error("storage error: {message} (operation: {operation})")]
    Storage { message: String, operation: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SkillGraphError {
    /// Shorthand for an `InvalidInput` error with the given message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        SkillGraphError::InvalidInput {
            message: message.into(),
        }
    }
}

/// Convenience alias for results using `SkillGraphError`.
pub type Result<T> = std::result::Result<T, SkillGraphError>;
