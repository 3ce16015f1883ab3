//! Error types for routerchat.
//!
//! Every failure a turn can produce is one variant of [`Error`].  The variants fall into four
//! families: configuration (missing credentials), transport (connectivity, timeouts, requests
//! cancelled before a response arrived), API (non-2xx responses, carrying the raw body) and
//! decode (stream I/O failures and streams cancelled mid-reply).  A single malformed event in
//! a stream is never an error; the decoder skips it.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Where in a turn a cancellation was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    /// Before the response headers arrived.
    Request,
    /// While reading the response body.
    Stream,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Request => write!(f, "request"),
            Stage::Stream => write!(f, "stream"),
        }
    }
}

/// The main error type for routerchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// Missing or unusable configuration, detected before any network activity.
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// Connection, DNS or other transport failure.
    Transport {
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The HTTP client's deadline expired.
    Timeout {
        /// Human-readable error message.
        message: String,
        /// Duration of the timeout in seconds.
        duration: Option<f64>,
    },

    /// The caller cancelled the turn.
    Abort {
        /// Human-readable error message.
        message: String,
        /// Where the cancellation was observed.
        stage: Stage,
    },

    /// The endpoint answered with a non-2xx status.
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Message extracted from the error body, or the body itself.
        message: String,
        /// The raw response body, verbatim.
        body: String,
    },

    /// The response body could not be read or understood.
    Decode {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// Error during JSON serialization or deserialization outside the chat stream.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// A URL parsing or manipulation error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// Local I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },
}

impl Error {
    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Creates a new transport error.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new timeout error.
    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    /// Creates a new abort error.
    pub fn abort(message: impl Into<String>, stage: Stage) -> Self {
        Error::Abort {
            message: message.into(),
            stage,
        }
    }

    /// Creates a new API error.
    pub fn api(status_code: u16, message: impl Into<String>, body: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            message: message.into(),
            body: body.into(),
        }
    }

    /// Creates a new decode error.
    pub fn decode(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Decode {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Returns true if this error is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    /// Returns true if this error happened before a response was received.
    ///
    /// Cancellation during the request counts as a transport error.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. }
                | Error::Timeout { .. }
                | Error::Abort {
                    stage: Stage::Request,
                    ..
                }
        )
    }

    /// Returns true if this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    /// Returns true if the caller cancelled the turn, at either stage.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Abort { .. })
    }

    /// Returns true if this error is a non-2xx API response.
    pub fn is_api(&self) -> bool {
        matches!(self, Error::Api { .. })
    }

    /// Returns true if this error happened while reading the response body.
    ///
    /// Cancellation during the stream counts as a decode error.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            Error::Decode { .. }
                | Error::Abort {
                    stage: Stage::Stream,
                    ..
                }
        )
    }

    /// Returns true if the endpoint rejected the credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(self.status_code(), Some(401 | 403))
    }

    /// Returns true if the endpoint rate-limited the request.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self.status_code(), Some(429))
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns the raw response body associated with this error, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::Api { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config { message } => {
                write!(f, "Configuration error: {message}")
            }
            Error::Transport { message, .. } => {
                write!(f, "Transport error: {message}")
            }
            Error::Timeout { message, duration } => {
                if let Some(duration) = duration {
                    write!(f, "Timeout error: {message} ({duration} seconds)")
                } else {
                    write!(f, "Timeout error: {message}")
                }
            }
            Error::Abort { message, stage } => {
                write!(f, "Cancelled during {stage}: {message}")
            }
            Error::Api {
                status_code,
                message,
                ..
            } => {
                write!(f, "API error (status {status_code}): {message}")
            }
            Error::Decode { message, .. } => {
                write!(f, "Decode error: {message}")
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Decode { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for routerchat operations.
pub type Result<T> = std::result::Result<T, Error>;
