use std::fmt;

use rusqlite::ErrorCode;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure taxonomy of every store operation.
///
/// Directory and Ledger raise these at the point of violation; only the API
/// layer turns them into a transport representation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// Lock acquisition timed out or the engine reported contention.
    /// The only retryable kind.
    #[error("storage busy: {0}")]
    Busy(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    Busy,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Busy => "busy",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::BadRequest(_) => ErrorKind::BadRequest,
            StoreError::Unauthorized(_) => ErrorKind::Unauthorized,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Busy(_) => ErrorKind::Busy,
            StoreError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }

    /// Human-readable description without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            StoreError::BadRequest(d)
            | StoreError::Unauthorized(d)
            | StoreError::NotFound(d)
            | StoreError::Conflict(d)
            | StoreError::Busy(d) => d.clone(),
            StoreError::Internal(e) => e.to_string(),
        }
    }

    pub(crate) fn corrupt(what: impl fmt::Display) -> Self {
        StoreError::Internal(anyhow::anyhow!("Corrupt record: {}", what))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StoreError::Busy(e.to_string())
            }
            Some(ErrorCode::ConstraintViolation) if e.to_string().contains("users.username") => {
                StoreError::Conflict("Username already in use".into())
            }
            _ => StoreError::Internal(e.into()),
        }
    }
}
