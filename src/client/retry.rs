//! Retry policy: linear backoff for transient failures, immediate pass-through
//! for everything else.

// self
use crate::{_prelude::*, error::TransportError, http::TransportResponse};

/// Linear-backoff retry policy for transient failures.
///
/// Retry N waits `base_delay × N`, so the default configuration (3 retries,
/// 1000 ms base) sleeps 1 s, 2 s, then 3 s before giving up. Exhaustion
/// propagates the last failure unchanged; there is no dedicated "exhausted"
/// error kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Maximum number of additional attempts after the initial one.
	pub max_retries: u32,
	/// Backoff multiplier base.
	pub base_delay: Duration,
}
impl RetryPolicy {
	/// Overrides the retry ceiling.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the backoff base delay.
	pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
		self.base_delay = base_delay;

		self
	}

	/// Returns the backoff to sleep before the next retry, or `None` when the
	/// failure is non-retryable or the ceiling is reached. `retries_so_far`
	/// counts retries already performed for this request.
	pub(crate) fn next_delay(
		&self,
		failure: &AttemptFailure,
		retries_so_far: u32,
	) -> Option<Duration> {
		if retries_so_far >= self.max_retries || !failure.is_retryable() {
			return None;
		}

		Some(self.base_delay * (retries_so_far + 1))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 3, base_delay: Duration::from_millis(1_000) }
	}
}

/// Failure produced by a single dispatch attempt, before retry classification.
#[derive(Debug)]
pub(crate) enum AttemptFailure {
	/// The backend answered with a non-success status.
	Status(TransportResponse),
	/// The transport failed before producing a response.
	Transport(TransportError),
}
impl AttemptFailure {
	pub(crate) fn status(&self) -> Option<u16> {
		match self {
			Self::Status(response) => Some(response.status),
			Self::Transport(_) => None,
		}
	}

	/// HTTP ≥ 500 and connectivity failures are worth retrying. 401 never
	/// reaches this check; the auth-expiry stage short-circuits it first.
	pub(crate) fn is_retryable(&self) -> bool {
		match self {
			Self::Status(response) => response.status >= 500,
			Self::Transport(_) => true,
		}
	}

	pub(crate) fn into_error(self) -> Error {
		match self {
			Self::Status(response) => Error::Http {
				status: response.status,
				message: String::from_utf8_lossy(&response.body).trim().to_owned(),
			},
			Self::Transport(err) => Error::Transport(err),
		}
	}
}
