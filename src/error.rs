use diesel::result::DatabaseErrorKind;
use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Contact not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store rejected contact: {0}")]
    ValidationRejected(String),
}

impl ContactError {
    pub fn store_unavailable(context: &str, e: impl std::fmt::Display) -> Self {
        ContactError::StoreUnavailable(format!("{context}: {e}"))
    }
}

impl From<diesel::result::Error> for ContactError {
    fn from(e: diesel::result::Error) -> Self {
        match e {
            diesel::result::Error::NotFound => ContactError::NotFound("no matching row".to_string()),
            diesel::result::Error::DatabaseError(kind, info) => match kind {
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::CheckViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::ForeignKeyViolation => {
                    ContactError::ValidationRejected(info.message().to_string())
                }
                _ => ContactError::StoreUnavailable(info.message().to_string()),
            },
            other => ContactError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for ContactError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        ContactError::store_unavailable("failed to get connection from pool", e)
    }
}

impl From<serde_json::Error> for ContactError {
    fn from(e: serde_json::Error) -> Self {
        ContactError::store_unavailable("malformed social_media column", e)
    }
}

pub type Result<T> = std::result::Result<T, ContactError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        let err: ContactError = diesel::result::Error::NotFound.into();
        assert!(matches!(err, ContactError::NotFound(_)));
    }

    #[test]
    fn test_unique_violation_is_rejected_verbatim() {
        let err: ContactError = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("UNIQUE constraint failed: contacts.id".to_string()),
        )
        .into();

        match err {
            ContactError::ValidationRejected(msg) => {
                assert_eq!(msg, "UNIQUE constraint failed: contacts.id");
            }
            other => panic!("Expected ValidationRejected, got {other:?}"),
        }
    }

    #[test]
    fn test_other_database_errors_are_unavailable() {
        let err: ContactError = diesel::result::Error::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("connection closed".to_string()),
        )
        .into();
        assert!(matches!(err, ContactError::StoreUnavailable(_)));

        let err: ContactError = diesel::result::Error::RollbackTransaction.into();
        assert!(matches!(err, ContactError::StoreUnavailable(_)));
    }

    #[test]
    fn test_error_display() {
        let err = ContactError::StoreUnavailable("operation timed out".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Store unavailable"));
        assert!(msg.contains("operation timed out"));
    }
}
