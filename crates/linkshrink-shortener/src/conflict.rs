use linkshrink_core::{ShortCode, StorageError};

/// How a failed write should be handled by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// The URL is already stored; the write resolves to this id.
    Unique(ShortCode),
    /// A fresh attempt may succeed.
    Transient,
    /// Give up and surface the error.
    Fatal,
}

impl ErrorClass {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorClass::Fatal)
    }
}

/// Classifies a storage error by its variant.
pub fn classify(err: &StorageError) -> ErrorClass {
    match err {
        StorageError::Conflict { existing } => ErrorClass::Unique(existing.clone()),
        StorageError::IdCollision(_) => ErrorClass::Transient,
        StorageError::NotFound(_)
        | StorageError::AttemptsExhausted { .. }
        | StorageError::Unavailable(_)
        | StorageError::Timeout(_)
        | StorageError::Query(_)
        | StorageError::InvalidData(_)
        | StorageError::Io(_)
        | StorageError::Transaction(_) => ErrorClass::Fatal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_unique_with_existing_id() {
        let existing = ShortCode::new("abc").unwrap();
        let err = StorageError::Conflict {
            existing: existing.clone(),
        };

        assert_eq!(classify(&err), ErrorClass::Unique(existing));
    }

    #[test]
    fn id_collision_is_transient() {
        let err = StorageError::IdCollision("abc".to_string());
        assert_eq!(classify(&err), ErrorClass::Transient);
    }

    #[test]
    fn other_errors_are_fatal() {
        let errors = [
            StorageError::NotFound("abc".to_string()),
            StorageError::AttemptsExhausted { attempts: 10 },
            StorageError::Unavailable("down".to_string()),
            StorageError::Timeout("slow".to_string()),
            StorageError::Query("syntax".to_string()),
            StorageError::InvalidData("garbage".to_string()),
            StorageError::Io("disk full".to_string()),
            StorageError::Transaction("aborted".to_string()),
        ];

        for err in &errors {
            assert!(classify(err).is_fatal(), "{err:?} should be fatal");
        }
    }

    #[test]
    fn classification_ignores_message_text() {
        let err = StorageError::Query("duplicate key value violates unique constraint".to_string());
        assert_eq!(classify(&err), ErrorClass::Fatal);
    }
}
