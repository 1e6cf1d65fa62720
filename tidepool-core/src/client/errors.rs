//! The errors that can be returned while paging through a source

use crate::shared::traits::SourceKind;

/// A boxed error from a store or a mapping layer
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// The errors that can be returned while paging
#[derive(Debug, thiserror::Error)]
pub enum Errors {
    /// A position token was malformed or did not come from us
    #[error("corrupt position: {0}")]
    CorruptPosition(String),
    /// A key field holds a value kind that positions cannot carry
    #[error("field {field:?} holds a {kind} value which cannot be part of a position")]
    UnsupportedScalarKind { field: String, kind: &'static str },
    /// A numeric key field holds text that is not a finite number
    #[error("field {field:?} holds {text:?} which is not a finite number")]
    InvalidNumber { field: String, text: String },
    /// Something was called at the wrong point of an iteration
    #[error("usage error: {0}")]
    UsageOrder(&'static str),
    /// The configured limit was already consumed
    #[error("the limit of {0} results was already reached")]
    LimitReached(usize),
    /// A past-limit check was made without configuring a limit
    #[error("no limit was configured")]
    NoLimitConfigured,
    /// A limit must be at least one
    #[error("a limit must be positive but {0} was given")]
    InvalidLimit(usize),
    /// The operation does not exist for this continuation style
    #[error("{operation} is not supported by {variant} sources")]
    UnsupportedByVariant {
        variant: SourceKind,
        operation: &'static str,
    },
    /// A record or start key is missing one of the tables key fields
    #[error("missing key field {0:?}")]
    MissingKeyField(String),
    /// The store failed to return a page
    #[error("failed to fetch a page: {0}")]
    SourceFetch(#[source] BoxedCause),
    /// A record could not be materialized
    #[error("failed to materialize a record: {0}")]
    Materialize(#[source] BoxedCause),
}

impl Errors {
    /// Wrap a store error
    ///
    /// # Arguments
    ///
    /// * `error` - The error the store returned
    pub fn source_fetch<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Errors::SourceFetch(Box::new(error))
    }

    /// Wrap an error from a mapping layer
    ///
    /// # Arguments
    ///
    /// * `error` - The error the mapping layer returned
    pub fn materialize<E: Into<BoxedCause>>(error: E) -> Self {
        Errors::Materialize(error.into())
    }

    /// Build an unsupported operation error
    ///
    /// # Arguments
    ///
    /// * `variant` - The source kind that rejected this operation
    /// * `operation` - The operation that was rejected
    #[must_use]
    pub fn unsupported(variant: SourceKind, operation: &'static str) -> Self {
        Errors::UnsupportedByVariant { variant, operation }
    }
}

impl From<base64::DecodeError> for Errors {
    /// Convert this error to our error type
    ///
    /// # Arguments
    ///
    /// * `error` - The error to convert
    fn from(error: base64::DecodeError) -> Self {
        Errors::CorruptPosition(error.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Errors {
    /// Convert this error to our error type
    ///
    /// # Arguments
    ///
    /// * `error` - The error to convert
    fn from(error: std::string::FromUtf8Error) -> Self {
        Errors::CorruptPosition(error.to_string())
    }
}
