//! Optional observability helpers plus always-on request counters.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit slow-call warnings and cache-invalidation events as structured
//!   tracing records.
//! - Enable `metrics` to increment the `crm_api_client_request_total` counter for every dispatch
//!   attempt outcome, labeled by `method` + `outcome`.
//!
//! [`ClientMetrics`] is independent of both features: an injected per-instance
//! counter set, so tests and dashboards can observe a single client without a
//! global recorder.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{_prelude::*, http::Method};

/// Outcome labels recorded for each dispatch attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// The attempt returned a success status.
	Success,
	/// The attempt failed with a retryable condition and a retry was scheduled.
	Retry,
	/// The attempt failed with HTTP 401 and the session was torn down.
	AuthExpired,
	/// The attempt failed terminally.
	Failure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Success => "success",
			RequestOutcome::Retry => "retry",
			RequestOutcome::AuthExpired => "auth_expired",
			RequestOutcome::Failure => "failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records an attempt outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(method: Method, outcome: RequestOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"crm_api_client_request_total",
			"method" => method.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (method, outcome);
	}
}

/// Emits a slow-call warning when the `tracing` feature is enabled.
pub fn warn_slow(method: Method, path: &str, elapsed: Duration, threshold: Duration) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		method = method.as_str(),
		path,
		elapsed_ms = elapsed.as_millis() as u64,
		threshold_ms = threshold.as_millis() as u64,
		"Slow API call."
	);

	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, path, elapsed, threshold);
	}
}

/// Thread-safe counters for a single client instance.
#[derive(Debug, Default)]
pub struct ClientMetrics {
	requests: AtomicU64,
	retries: AtomicU64,
	cache_hits: AtomicU64,
	cache_misses: AtomicU64,
	auth_expiries: AtomicU64,
}
impl ClientMetrics {
	/// Returns the total number of dispatch attempts, retries included.
	pub fn requests(&self) -> u64 {
		self.requests.load(Ordering::Relaxed)
	}

	/// Returns the number of retries performed.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of reads served from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Returns the number of reads that went to the transport.
	pub fn cache_misses(&self) -> u64 {
		self.cache_misses.load(Ordering::Relaxed)
	}

	/// Returns the number of 401 session teardowns.
	pub fn auth_expiries(&self) -> u64 {
		self.auth_expiries.load(Ordering::Relaxed)
	}

	pub(crate) fn record_request(&self) {
		self.requests.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_miss(&self) {
		self.cache_misses.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_auth_expiry(&self) {
		self.auth_expiries.fetch_add(1, Ordering::Relaxed);
	}
}
