use backtrace::Backtrace;
#[cfg(feature = "serde")]
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::{atomic, Atomic};

/// Categorizes the errors raised by RippleDB.
///
/// The first group covers violations detected by the query/update engine and
/// the index subsystem. The rest are raised by the surrounding database
/// machinery (registry, events, configuration).
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Engine errors
    PrimaryKeyViolation,
    IndexViolation,
    MalformedQuery,
    MalformedUpdate,
    MissingArgument,

    // Registry and lifecycle errors
    CollectionNotFound,
    CollectionDropped,
    IndexNotFound,
    IndexAlreadyExists,
    InvalidOperation,

    // Event errors
    EventError,

    // Configuration errors
    ConfigError,

    // Serialization errors
    ObjectMappingError,

    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::PrimaryKeyViolation => write!(f, "Primary key violation"),
            ErrorKind::IndexViolation => write!(f, "Index violation"),
            ErrorKind::MalformedQuery => write!(f, "Malformed query"),
            ErrorKind::MalformedUpdate => write!(f, "Malformed update"),
            ErrorKind::MissingArgument => write!(f, "Missing argument"),
            ErrorKind::CollectionNotFound => write!(f, "Collection not found"),
            ErrorKind::CollectionDropped => write!(f, "Collection dropped"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::IndexAlreadyExists => write!(f, "Index already exists"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::ConfigError => write!(f, "Configuration error"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The error type of every fallible RippleDB operation.
///
/// A `RippleError` carries a human readable message, an [ErrorKind], an
/// optional cause and the backtrace captured where it was created.
///
/// # Examples
///
/// ```rust
/// use rippledb::errors::{ErrorKind, RippleError};
///
/// let error = RippleError::new("Primary key violation in update: 42", ErrorKind::PrimaryKeyViolation);
/// assert_eq!(error.kind(), &ErrorKind::PrimaryKeyViolation);
/// ```
#[derive(Clone)]
pub struct RippleError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<RippleError>>,
    backtrace: Atomic<Backtrace>,
}

impl RippleError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        RippleError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: RippleError) -> Self {
        RippleError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&RippleError> {
        self.cause.as_deref()
    }
}

impl Display for RippleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for RippleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for RippleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

pub type RippleResult<T> = Result<T, RippleError>;

#[cfg(feature = "serde")]
impl de::Error for RippleError {
    fn custom<T: Display>(msg: T) -> Self {
        RippleError::new(&msg.to_string(), ErrorKind::ObjectMappingError)
    }
}

#[cfg(feature = "serde")]
impl ser::Error for RippleError {
    fn custom<T: Display>(msg: T) -> Self {
        RippleError::new(&msg.to_string(), ErrorKind::ObjectMappingError)
    }
}

impl From<regex::Error> for RippleError {
    fn from(err: regex::Error) -> Self {
        RippleError::new(
            &format!("Invalid regular expression: {}", err),
            ErrorKind::MalformedQuery,
        )
    }
}

impl From<std::fmt::Error> for RippleError {
    fn from(err: std::fmt::Error) -> Self {
        RippleError::new(&format!("Formatting error: {}", err), ErrorKind::InternalError)
    }
}

impl From<String> for RippleError {
    fn from(msg: String) -> Self {
        RippleError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for RippleError {
    fn from(msg: &str) -> Self {
        RippleError::new(msg, ErrorKind::InternalError)
    }
}
