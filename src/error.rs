//! # Errors
//!
//! This module defines the error types used by the DID lifecycle engine, including for the
//! registrar client trait that may be implemented in other crates.

use std::fmt::Display;

use thiserror::Error;

/// Simplify creation of errors with tracing.
///
/// # Example
/// ```
/// use vercre_didadmin::error::Err;
/// use vercre_didadmin::{tracerr, Result};
///
/// fn with_msg() -> Result<()> {
///     tracerr!(Err::Validation, "message: {}", "some message")
/// }
///
/// fn no_msg() -> Result<()> {
///     tracerr!(Err::Validation)
/// }
/// ```
#[macro_export]
macro_rules! tracerr {
    // with context
    ($code:expr, $($msg:tt)*) => {
        {
        use $crate::error::Context as _;
        tracing::error!($($msg)*);
        return Err($code).context(format!($($msg)*));
        }
    };
    // no context
    ($code:expr) => {
        {
        tracing::error!("{}", $code);
        return Err($code.into());
        }
    }
}

/// Public error type for the DID lifecycle engine.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(#[from] anyhow::Error);

impl Error {
    /// Serialize the error to a JSON object with a stable error code and a human-readable
    /// description.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.0.root_cause().to_string(),
            "error_description": self.to_string(),
        })
    }

    /// Returns true if `E` is the type held by this error object.
    #[must_use]
    pub fn is(&self, err: Err) -> bool {
        self.0.downcast_ref::<Err>().map_or(false, |e| e == &err)
    }
}

/// Typed errors for the DID lifecycle engine.
#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
pub enum Err {
    /// A local precondition failed before any network call was made: missing identifier,
    /// missing key, draft not compiled, relationship referencing a missing verification
    /// method, or an out-of-order pipeline step.
    #[error("validation_error")]
    Validation,

    /// The registrar reported failure, either as a `state=error` envelope or as an HTTP
    /// error response. Context carries the registrar's reason.
    #[error("registrar_error")]
    Registrar,

    /// Certificate content could not be decoded or decrypted during preview or persist.
    #[error("upload_error")]
    Upload,

    /// Invalid key is where the format of the key is incorrect or the key structure cannot
    /// be interpreted.
    #[error("invalid_key")]
    InvalidKey,

    /// Invalid format. (See context for details)
    #[error("invalid_format")]
    InvalidFormat,

    /// Request failed. This is used when a request to the registrar fails to connect, times
    /// out, or gets no response.
    #[error("request_error")]
    RequestError,

    /// An error occurred trying to deserialize data.
    #[error("deserialization_error")]
    DeserializationError,

    /// An error occurred trying to serialize data.
    #[error("serialization_error")]
    SerializationError,

    /// No DID document was found for the requested DID.
    #[error("not_found")]
    NotFound,

    /// An unspecified error occurred (see context for information)
    #[error("unknown")]
    Unknown,
}

/// Context is used to decorate errors with useful context information.
pub trait Context<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Adds context to the error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context to add to the error.
    ///
    /// # Returns
    ///
    /// Original return object or error with context appended.
    ///
    /// # Errors
    ///
    /// * Original error with context appended.
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static;
}

impl<T, E> Context<T, E> for core::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
    {
        match self {
            Ok(ok) => Ok(ok),
            Err(e) => Err(Error(anyhow::Error::from(e).context(context))),
        }
    }
}

impl From<Err> for Error {
    fn from(error: Err) -> Self {
        Error(error.into())
    }
}

impl From<base64ct::Error> for Error {
    fn from(err: base64ct::Error) -> Error {
        Error(err.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Error {
        Error(err.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error(err.into())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error(err.into())
    }
}
