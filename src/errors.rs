//! Normalized Cache Error Hierarchy
//!
//! Defines the error types surfaced by the cache, categorized by the layer
//! that produced them: cache reads, network transport, response parsing,
//! storage backends and the store worker.

use std::fmt;
use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A record or field needed by a read was absent from the cache
    #[error(transparent)]
    CacheMiss(#[from] CacheMissError),

    /// Transport-level failures (connection, timeout, cancelled request)
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Non-2xx HTTP responses
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Malformed or unparseable response bodies
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Every attempt of a multi-source fetch failed
    #[error(transparent)]
    Composite(#[from] CompositeError),

    /// Record store backend failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Store worker unavailable
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Cache configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    pub fn is_cache_miss(&self) -> bool {
        matches!(self, Error::CacheMiss(_))
    }

    /// Network, HTTP and parse failures all count as a failed network attempt.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Http(_) | Error::Parse(_))
    }
}

/// Raised when a read reaches a record or field that is not in the cache.
///
/// An absent field is never read as `null`: only an explicitly stored
/// `FieldValue::Null` is.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct CacheMissError {
    /// Key of the record that was unreachable or incomplete
    pub key: String,
    /// Field key that was absent, `None` when the whole record was missing
    pub field_name: Option<String>,
}

impl CacheMissError {
    pub fn missing_record(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_name: None,
        }
    }

    pub fn missing_field(
        key: impl Into<String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            field_name: Some(field_name.into()),
        }
    }
}

impl fmt::Display for CacheMissError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match &self.field_name {
            Some(field) => write!(f, "Object '{}' has no field named '{}'", self.key, field),
            None => write!(f, "Object '{}' not found", self.key),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Transport gave up after the configured timeout
    #[error("Network request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection could not be established or was reset
    #[error("Failed to execute GraphQL request: {0}")]
    Transport(String),

    /// Transport failure with an underlying source
    #[error("Network unreachable: {source}")]
    Unreachable {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Non-2xx response from the server.
///
/// The raw body is only carried when explicitly enabled
/// (`fetch.expose_http_error_body`).
#[derive(Debug, Clone, thiserror::Error)]
#[error("Http request failed with status code `{status_code}`")]
pub struct HttpError {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse GraphQL http network response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed GraphQL response: {0}")]
    Malformed(String),
}

/// Aggregates the failures of every attempted source of a fetch plan.
#[derive(Debug, thiserror::Error)]
pub struct CompositeError {
    errors: Vec<Error>,
}

impl CompositeError {
    pub fn new(errors: Vec<Error>) -> Self {
        debug_assert!(errors.len() >= 2, "composite error needs at least two causes");
        Self { errors }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }
}

impl fmt::Display for CompositeError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "All {} fetch attempts failed: ", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "[{}] {}", i + 1, e)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Embedded database errors
    #[error("Embedded database error: {0}")]
    DbError(String),

    /// Record (de)serialization failures for persisted data
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Normalization input did not have the expected shape
    #[error("Invalid response data: {0}")]
    InvalidData(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Store worker stopped")]
    WorkerStopped,

    #[error("Store worker dropped the reply for a job")]
    ReplyDropped,
}

// ============== Conversion Implementations ============== //
impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        StorageError::DbError(err.to_string()).into()
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err).into()
    }
}
