//! Client-level error types shared across the dispatch pipeline, cache, and
//! session boundaries.

// self
use crate::_prelude::*;

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Session storage failure.
	#[error(transparent)]
	Session(#[from] crate::session::SessionError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The backend rejected the stored credentials with HTTP 401. The token has
	/// already been cleared and the navigator pointed at the login path; callers
	/// should treat the current view as dead.
	#[error("Authentication expired; the stored token was cleared.")]
	AuthExpired,
	/// Non-retryable HTTP error status, or a retryable one that exhausted the
	/// retry budget.
	#[error("HTTP {status}: {message}")]
	Http {
		/// HTTP status code returned by the backend.
		status: u16,
		/// Response body rendered as text, for diagnostics.
		message: String,
	},
	/// Response body could not be decoded as JSON.
	#[error("Response body is not valid JSON.")]
	Decode {
		/// Structured parsing failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response, when known.
		status: Option<u16>,
	},
	/// A batch worker task panicked or was cancelled before settling.
	#[error("Batch operation failed to complete.")]
	Task {
		/// Join failure reported by the runtime.
		#[source]
		source: tokio::task::JoinError,
	},
	/// Failure observed through the read-deduplication cache. Every caller
	/// collapsed onto the same in-flight request receives the same underlying
	/// error.
	#[error(transparent)]
	Shared(Arc<Error>),
}
impl Error {
	/// Returns the HTTP status associated with the error, when one exists.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::AuthExpired => Some(401),
			Self::Http { status, .. } => Some(*status),
			Self::Decode { status, .. } => *status,
			Self::Shared(inner) => inner.status(),
			_ => None,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP transport could not be constructed.
	#[error("HTTP transport could not be constructed.")]
	TransportBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL `{url}` is invalid.")]
	InvalidBaseUrl {
		/// Raw URL string that failed to parse.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path cannot be resolved against the base URL.
	#[error("Request path `{path}` is invalid.")]
	InvalidPath {
		/// Raw path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body cannot be serialized as JSON.
	#[error("Request body could not be serialized as JSON.")]
	BodySerialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn transport_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::TransportBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::transport_build(e)
	}
}

/// Transport-level failures (network, IO, timeout). All variants are considered
/// retryable by the dispatch pipeline.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a connectivity failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The transport's connect/response timeout elapsed.
	#[error("API call timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_drills_through_shared_errors() {
		let inner = Error::Http { status: 503, message: "upstream down".into() };
		let shared = Error::Shared(Arc::new(inner));

		assert_eq!(shared.status(), Some(503));
		assert_eq!(Error::AuthExpired.status(), Some(401));
		assert_eq!(Error::Transport(TransportError::Timeout).status(), None);
	}

	#[test]
	fn shared_errors_surface_the_inner_message() {
		let inner = Error::Http { status: 500, message: "boom".into() };
		let shared = Error::Shared(Arc::new(inner));

		assert_eq!(shared.to_string(), "HTTP 500: boom");
	}
}
