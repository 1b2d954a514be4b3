use thiserror::Error;

/// Postgres SQLSTATE for `unique_violation`.
pub const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Postgres SQLSTATE for `foreign_key_violation`.
pub const FOREIGN_KEY_VIOLATION_CODE: &str = "23503";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Backend(String),
}

impl DatabaseError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::UniqueViolation(_))
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, DatabaseError::ForeignKeyViolation(_))
    }

    /// Classify a non-success PostgREST response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let code = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(|c| c.as_str()).map(str::to_owned));

        match (status, code.as_deref()) {
            (_, Some(UNIQUE_VIOLATION_CODE)) => DatabaseError::UniqueViolation(body.to_string()),
            (_, Some(FOREIGN_KEY_VIOLATION_CODE)) => DatabaseError::ForeignKeyViolation(body.to_string()),
            (401 | 403, _) => DatabaseError::Auth(body.to_string()),
            (404, _) => DatabaseError::NotFound(body.to_string()),
            _ => DatabaseError::Api {
                status,
                message: body.to_string(),
            },
        }
    }
}
