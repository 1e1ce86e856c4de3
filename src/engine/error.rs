use chrono::NaiveDate;
use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    StoreNotFound(Ulid),
    SlotNotFound {
        store_id: Ulid,
        date: NaiveDate,
    },
    ScrapNotFound(Ulid),
    /// The per-store lock was not acquired within the wait window.
    Conflict(Ulid),
    Forbidden {
        scrap_id: Ulid,
        user_id: Ulid,
    },
    AlreadyExists(Ulid),
    /// The store already has slots; allocation runs once per store.
    AlreadyInitialized(Ulid),
    InvalidStore(&'static str),
    LimitExceeded(&'static str),
    Backend(StoreError),
}

/// Coarse category for the calling layer. Conflict is the only retryable kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Forbidden,
    AlreadyExists,
    InvalidInput,
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict | ErrorKind::AlreadyExists => 409,
            ErrorKind::Forbidden => 403,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Internal => 500,
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::StoreNotFound(_)
            | EngineError::SlotNotFound { .. }
            | EngineError::ScrapNotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Forbidden { .. } => ErrorKind::Forbidden,
            EngineError::AlreadyExists(_) | EngineError::AlreadyInitialized(_) => {
                ErrorKind::AlreadyExists
            }
            EngineError::InvalidStore(_) | EngineError::LimitExceeded(_) => ErrorKind::InvalidInput,
            EngineError::Backend(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::StoreNotFound(id) => write!(f, "store not found: {id}"),
            EngineError::SlotNotFound { store_id, date } => {
                write!(f, "no slots for store {store_id} on {date}")
            }
            EngineError::ScrapNotFound(id) => write!(f, "scrap not found: {id}"),
            EngineError::Conflict(id) => {
                write!(f, "store {id} is busy: scrap lock not acquired, retry later")
            }
            EngineError::Forbidden { scrap_id, user_id } => {
                write!(f, "user {user_id} does not own scrap {scrap_id}")
            }
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::AlreadyInitialized(id) => {
                write!(f, "store {id} already has slots")
            }
            EngineError::InvalidStore(msg) => write!(f, "invalid store: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Backend(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Backend(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_and_forbidden_are_distinguishable() {
        let conflict = EngineError::Conflict(Ulid::new());
        let forbidden = EngineError::Forbidden { scrap_id: Ulid::new(), user_id: Ulid::new() };

        assert_eq!(conflict.kind().status_code(), 409);
        assert_eq!(forbidden.kind().status_code(), 403);
        assert!(conflict.is_retryable());
        assert!(!forbidden.is_retryable());
        assert!(!EngineError::AlreadyInitialized(Ulid::new()).is_retryable());
    }

    #[test]
    fn backend_errors_keep_their_source() {
        let err = EngineError::from(StoreError::Unavailable("cache down".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("cache down"));
    }
}
