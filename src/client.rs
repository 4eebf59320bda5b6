//! High-level CRM API client: cached reads, invalidating mutations, prefetch,
//! and batch dispatch behind one instance-owned policy set.

pub mod retry;

mod batch;
mod pipeline;

pub use retry::RetryPolicy;

// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	cache::{CacheKey, RequestCache},
	config::ClientConfig,
	error::ConfigError,
	http::{ApiTransport, Method},
	obs::ClientMetrics,
	session::{Navigator, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport stack.
pub type ReqwestApiClient = ApiClient<ReqwestTransport>;

/// Per-call request options: extra query parameters and headers.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Query parameters, kept ordered so identical sets produce identical cache
	/// keys.
	pub params: BTreeMap<String, String>,
	/// Extra headers sent with every attempt of this call.
	pub headers: Vec<(String, String)>,
}
impl RequestOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a query parameter.
	pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.insert(name.into(), value.into());

		self
	}

	/// Adds a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}
}

/// Coordinates every CRM API call for one backend.
///
/// The client owns the transport, token store, navigator, request cache, and
/// metrics so call sites only deal in paths and payloads. Instances are
/// explicitly constructed and cheaply cloneable (all shared state sits behind
/// `Arc`s), and two instances never share cache or counters, which keeps tests
/// isolated.
pub struct ApiClient<C>
where
	C: ?Sized + ApiTransport,
{
	/// HTTP transport used for every outbound attempt.
	pub transport: Arc<C>,
	/// Token storage consulted before each attempt and cleared on HTTP 401.
	pub tokens: Arc<dyn TokenStore>,
	/// Navigation sink invoked when credentials expire.
	pub navigator: Arc<dyn Navigator>,
	/// Tuning shared by the dispatcher, cache, and batch runner.
	pub config: ClientConfig,
	/// Always-on request counters for this instance.
	pub metrics: Arc<ClientMetrics>,
	cache: RequestCache,
}
impl<C> ApiClient<C>
where
	C: ?Sized + ApiTransport,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_transport(
		config: ClientConfig,
		transport: impl Into<Arc<C>>,
		tokens: Arc<dyn TokenStore>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		Self {
			transport: transport.into(),
			tokens,
			navigator,
			config,
			metrics: Default::default(),
			cache: Default::default(),
		}
	}

	/// Fetches `path` and deserializes the response body.
	///
	/// Concurrent identical reads share one transport call, and recently
	/// settled results are reused until the cache evicts them.
	pub async fn get<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.get_with(path, RequestOptions::new()).await
	}

	/// [`get`](Self::get) with explicit query parameters and headers.
	pub async fn get_with<T>(&self, path: &str, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let value = self.get_value(path, options).await?;

		decode_value(value)
	}

	async fn get_value(&self, path: &str, options: RequestOptions) -> Result<Value> {
		let key = CacheKey::new(Method::Get, path, &options.params);
		let (read, hit) = self.cache.get_or_insert_with(
			key,
			self.config.cache_ttl,
			self.config.settle_grace,
			|| pipeline::shared_read(self, path, options),
		);

		if hit {
			self.metrics.record_cache_hit();
		} else {
			self.metrics.record_cache_miss();
		}

		read.await.map_err(Error::Shared)
	}

	/// Sends a POST with a JSON body and invalidates cached reads under the
	/// target path on success.
	pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.post_with(path, body, RequestOptions::new()).await
	}

	/// [`post`](Self::post) with explicit query parameters and headers.
	pub async fn post_with<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::BodySerialize)?;

		self.mutate(Method::Post, path, Some(body), options).await
	}

	/// Sends a PUT with a JSON body and invalidates cached reads under the
	/// target path on success.
	pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		self.put_with(path, body, RequestOptions::new()).await
	}

	/// [`put`](Self::put) with explicit query parameters and headers.
	pub async fn put_with<T, B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
		B: ?Sized + Serialize,
	{
		let body = serde_json::to_value(body).map_err(ConfigError::BodySerialize)?;

		self.mutate(Method::Put, path, Some(body), options).await
	}

	/// Sends a DELETE and invalidates cached reads under the target path on
	/// success.
	pub async fn delete<T>(&self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.delete_with(path, RequestOptions::new()).await
	}

	/// [`delete`](Self::delete) with explicit query parameters and headers.
	pub async fn delete_with<T>(&self, path: &str, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.mutate(Method::Delete, path, None, options).await
	}

	async fn mutate<T>(
		&self,
		method: Method,
		path: &str,
		body: Option<Value>,
		options: RequestOptions,
	) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let context = pipeline::RequestContext::new(self, method, path, options, body)?;
		let value = pipeline::run(context).await?;

		self.cache.invalidate_path(path);

		decode_value(value)
	}

	/// Warms the cache for `path` on a background task; failures are swallowed.
	pub fn prefetch(&self, path: &str) {
		self.prefetch_with(path, RequestOptions::new());
	}

	/// [`prefetch`](Self::prefetch) with explicit query parameters and headers.
	/// Never panics and never surfaces a rejection.
	pub fn prefetch_with(&self, path: &str, options: RequestOptions) {
		let client = self.clone();
		let path = path.to_owned();

		tokio::spawn(async move {
			let _ = client.get_value(&path, options).await;
		});
	}

	/// Drops every cached read; subsequent GETs refetch from the backend.
	pub fn clear_cache(&self) {
		self.cache.clear();
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestTransport> {
	/// Creates a client with the crate's default reqwest transport.
	///
	/// The transport is built from the config's timeout so callers do not need
	/// to pass HTTP handles explicitly; use [`ApiClient::with_transport`] to
	/// supply a custom stack.
	pub fn new(
		config: ClientConfig,
		tokens: Arc<dyn TokenStore>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self, ConfigError> {
		let transport = ReqwestTransport::new(&config)?;

		Ok(Self::with_transport(config, transport, tokens, navigator))
	}
}
impl<C> Clone for ApiClient<C>
where
	C: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			tokens: self.tokens.clone(),
			navigator: self.navigator.clone(),
			config: self.config.clone(),
			metrics: self.metrics.clone(),
			cache: self.cache.clone(),
		}
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("cache", &self.cache)
			.finish()
	}
}

fn decode_value<T>(value: Value) -> Result<T>
where
	T: DeserializeOwned,
{
	serde_path_to_error::deserialize(value)
		.map_err(|source| Error::Decode { source, status: None })
}
