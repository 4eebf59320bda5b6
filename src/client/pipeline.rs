//! Ordered dispatch pipeline behind every request.
//!
//! Each attempt flows through named stages in a fixed order: auth injection,
//! transport dispatch, timing observation, the auth-expiry check, then the
//! retry decision. Keeping the stages as plain functions makes their contracts
//! and ordering visible instead of burying them in transport hooks.

// self
use crate::{
	_prelude::*,
	cache::ReadFuture,
	client::{ApiClient, RequestOptions, retry::AttemptFailure},
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{ApiTransport, Method, TransportRequest, TransportResponse},
	obs::{self, ClientMetrics, RequestOutcome},
	session::{Navigator, TokenStore},
};

/// Owned state for one logical request, shared by every attempt of it.
pub(crate) struct RequestContext<C>
where
	C: ?Sized + ApiTransport,
{
	transport: Arc<C>,
	tokens: Arc<dyn TokenStore>,
	navigator: Arc<dyn Navigator>,
	config: ClientConfig,
	metrics: Arc<ClientMetrics>,
	method: Method,
	url: Url,
	headers: Vec<(String, String)>,
	body: Option<Value>,
}
impl<C> RequestContext<C>
where
	C: ?Sized + ApiTransport,
{
	/// Resolves the request URL and snapshots everything the attempts need, so
	/// the resulting context is `'static` and can outlive the calling scope.
	pub(crate) fn new(
		client: &ApiClient<C>,
		method: Method,
		path: &str,
		options: RequestOptions,
		body: Option<Value>,
	) -> Result<Self> {
		let mut url = client
			.config
			.base_url
			.join(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		if !options.params.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (name, value) in &options.params {
				pairs.append_pair(name, value);
			}
		}

		Ok(Self {
			transport: client.transport.clone(),
			tokens: client.tokens.clone(),
			navigator: client.navigator.clone(),
			config: client.config.clone(),
			metrics: client.metrics.clone(),
			method,
			url,
			headers: options.headers,
			body,
		})
	}
}

/// Builds the boxed computation a deduplicated read is shared from. Errors are
/// arc-wrapped so every collapsed caller can observe the same rejection.
pub(crate) fn shared_read<C>(
	client: &ApiClient<C>,
	path: &str,
	options: RequestOptions,
) -> ReadFuture
where
	C: ?Sized + ApiTransport,
{
	let context = RequestContext::new(client, Method::Get, path, options, None);

	Box::pin(async move { run(context?).await.map_err(Arc::new) })
}

/// Drives a request through the stage pipeline until it settles.
pub(crate) async fn run<C>(ctx: RequestContext<C>) -> Result<Value>
where
	C: ?Sized + ApiTransport,
{
	let mut retries: u32 = 0;

	loop {
		ctx.metrics.record_request();

		let started = Instant::now();
		let outcome = dispatch(&ctx).await;

		observe_timing(&ctx, started.elapsed());

		let failure = match outcome {
			Ok(response) if response.is_success() => {
				obs::record_request_outcome(ctx.method, RequestOutcome::Success);

				return decode_response(response);
			},
			Ok(response) => AttemptFailure::Status(response),
			Err(err) => AttemptFailure::Transport(err),
		};

		if let Some(err) = check_auth_expiry(&ctx, &failure) {
			obs::record_request_outcome(ctx.method, RequestOutcome::AuthExpired);

			return Err(err);
		}

		match ctx.config.retry.next_delay(&failure, retries) {
			Some(delay) => {
				retries += 1;
				ctx.metrics.record_retry();
				obs::record_request_outcome(ctx.method, RequestOutcome::Retry);
				tokio::time::sleep(delay).await;
			},
			None => {
				obs::record_request_outcome(ctx.method, RequestOutcome::Failure);

				return Err(failure.into_error());
			},
		}
	}
}

/// Stage 1 + 2: assemble the attempt request, inject the bearer header, and
/// hand it to the transport.
async fn dispatch<C>(ctx: &RequestContext<C>) -> Result<TransportResponse, TransportError>
where
	C: ?Sized + ApiTransport,
{
	let mut request = TransportRequest {
		method: ctx.method,
		url: ctx.url.clone(),
		headers: ctx.headers.clone(),
		body: ctx.body.clone(),
	};

	inject_auth(ctx, &mut request);

	ctx.transport.execute(request).await
}

/// Attaches `Authorization: Bearer <token>` when the store holds a token. The
/// token is re-read on every attempt so retries pick up rotations.
fn inject_auth<C>(ctx: &RequestContext<C>, request: &mut TransportRequest)
where
	C: ?Sized + ApiTransport,
{
	if let Some(token) = ctx.tokens.token() {
		request.headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
	}
}

/// Stage 3: non-fatal latency observation.
fn observe_timing<C>(ctx: &RequestContext<C>, elapsed: Duration)
where
	C: ?Sized + ApiTransport,
{
	if elapsed > ctx.config.slow_call_threshold {
		obs::warn_slow(ctx.method, ctx.url.path(), elapsed, ctx.config.slow_call_threshold);
	}
}

/// Stage 4: terminal 401 handling. Clears the stored token, issues exactly one
/// navigation to the login path, and converts the failure; the retry stage is
/// never consulted for the triggering request.
fn check_auth_expiry<C>(ctx: &RequestContext<C>, failure: &AttemptFailure) -> Option<Error>
where
	C: ?Sized + ApiTransport,
{
	if failure.status() != Some(401) {
		return None;
	}

	ctx.tokens.clear();
	ctx.navigator.navigate(&ctx.config.login_path);
	ctx.metrics.record_auth_expiry();

	Some(Error::AuthExpired)
}

/// Parses a successful response body. Empty bodies (204, DELETE acks) decode to
/// JSON null.
fn decode_response(response: TransportResponse) -> Result<Value> {
	if response.body.is_empty() {
		return Ok(Value::Null);
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| Error::Decode { source, status: Some(response.status) })
}
