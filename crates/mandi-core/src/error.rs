use thiserror::Error;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Malformed input to a calculation or record. Always raised before any
/// side effect reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Unit price must be positive")]
    NonPositiveUnitPrice,

    #[error("Total amount must be non-negative")]
    NegativeTotalAmount,

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} is out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("{field} {actual} does not match the calculated {expected}")]
    InconsistentAmount {
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("created_at must not be later than updated_at")]
    TimestampOrder,

    #[error("malformed parchi document: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}

/// Backing-store connectivity or integrity failure.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("store has not been initialized")]
    NotInitialized,

    #[error("store has been closed")]
    Closed,

    #[error("{context}: {source}")]
    Backend {
        context: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("stored parchi {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },
}

impl DatabaseError {
    pub fn backend<E>(context: &'static str) -> impl FnOnce(E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        move |source| Self::Backend {
            context,
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}
