//! Client configuration: base URL resolution plus dispatch, retry, and cache
//! tuning carried by every client instance.

// std
use std::env;
// self
use crate::{_prelude::*, client::RetryPolicy, error::ConfigError};

/// Environment variable consulted by [`ClientConfig::from_env`] for the base URL.
pub const API_URL_ENV: &str = "NEXT_PUBLIC_API_URL";
/// Base URL used when [`API_URL_ENV`] is unset.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Tunable settings owned by every client instance.
///
/// Constructing configs explicitly (rather than reading hidden globals) keeps
/// client instances isolated, so tests can shrink timers without affecting each
/// other.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// Base URL every request path is resolved against.
	pub base_url: Url,
	/// Transport connect/response timeout.
	pub timeout: Duration,
	/// Threshold above which a completed call is reported as slow.
	pub slow_call_threshold: Duration,
	/// Retry policy applied to retryable failures.
	pub retry: RetryPolicy,
	/// Maximum lifetime of a cache entry, pending or settled.
	pub cache_ttl: Duration,
	/// Grace period a settled entry is retained to absorb near-simultaneous
	/// duplicate reads.
	pub settle_grace: Duration,
	/// Number of batch operations dispatched concurrently per chunk.
	pub batch_chunk_size: usize,
	/// Path the navigator is pointed at when credentials expire.
	pub login_path: String,
}
impl ClientConfig {
	/// Creates a configuration with production defaults for the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			timeout: Duration::from_secs(10),
			slow_call_threshold: Duration::from_millis(1_000),
			retry: RetryPolicy::default(),
			cache_ttl: Duration::from_millis(5_000),
			settle_grace: Duration::from_millis(1_000),
			batch_chunk_size: 5,
			login_path: "/login".into(),
		}
	}

	/// Resolves the base URL from [`API_URL_ENV`], falling back to
	/// [`DEFAULT_API_URL`] when the variable is unset.
	pub fn from_env() -> Result<Self, ConfigError> {
		let raw = env::var(API_URL_ENV).unwrap_or_else(|_| DEFAULT_API_URL.into());
		let base_url =
			Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl { url: raw, source })?;

		Ok(Self::new(base_url))
	}

	/// Overrides the transport timeout.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;

		self
	}

	/// Overrides the slow-call reporting threshold.
	pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
		self.slow_call_threshold = threshold;

		self
	}

	/// Overrides the retry policy.
	pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the cache TTL.
	pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
		self.cache_ttl = ttl;

		self
	}

	/// Overrides the post-settlement grace period.
	pub fn with_settle_grace(mut self, grace: Duration) -> Self {
		self.settle_grace = grace;

		self
	}

	/// Overrides the batch chunk size; clamped to at least one.
	pub fn with_batch_chunk_size(mut self, size: usize) -> Self {
		self.batch_chunk_size = size.max(1);

		self
	}

	/// Overrides the login path used on credential expiry.
	pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
		self.login_path = path.into();

		self
	}
}
