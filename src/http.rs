//! Transport primitives for CRM API calls.
//!
//! The module exposes [`ApiTransport`] so downstream crates can integrate custom
//! HTTP stacks without reimplementing the client's retry, caching, or auth
//! behavior. Implementations must resolve `Ok` for every response that carries a
//! status line, whatever the status code; `Err` is reserved for connectivity,
//! TLS, and timeout failures so the dispatch pipeline can classify retryable
//! conditions itself.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::CONTENT_TYPE;
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::ClientConfig, error::ConfigError};

/// HTTP methods issued by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// Cached, deduplicated read.
	Get,
	/// Creating mutation.
	Post,
	/// Replacing mutation.
	Put,
	/// Deleting mutation.
	Delete,
}
impl Method {
	/// Returns a stable label suitable for cache keys, spans, and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}

	/// True for operations that modify server state and bust cached reads.
	pub const fn is_mutation(self) -> bool {
		!matches!(self, Method::Get)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outbound request handed to an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct TransportRequest {
	/// HTTP method.
	pub method: Method,
	/// Fully resolved request URL, query string included.
	pub url: Url,
	/// Extra headers beyond the transport's own defaults, authorization included.
	pub headers: Vec<(String, String)>,
	/// JSON body for mutating calls.
	pub body: Option<Value>,
}

/// Raw response returned by an [`ApiTransport`].
#[derive(Clone, Debug)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes; may be empty.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// True when the status signals success (2xx).
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing CRM API calls.
///
/// The trait is the client's only dependency on an HTTP stack. Callers provide
/// an implementation (typically behind `Arc<T>` where `T: ApiTransport`) and the
/// client issues one `execute` call per attempt, retries included.
/// Implementations must be `Send + Sync + 'static` so deduplicated requests can
/// be driven to completion by detached tasks after every caller has dropped.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes a single HTTP request attempt.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. The connect/response timeout is fixed at transport build time from
/// [`ClientConfig::timeout`]; every request is sent as JSON.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport honoring the config's timeout.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(config.timeout).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]. Configure the client's own
	/// timeout; the transport applies none of its own.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				Method::Get => reqwest::Method::GET,
				Method::Post => reqwest::Method::POST,
				Method::Put => reqwest::Method::PUT,
				Method::Delete => reqwest::Method::DELETE,
			};
			let mut builder =
				client.request(method, request.url).header(CONTENT_TYPE, "application/json");

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = &request.body {
				builder = builder.json(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(TransportResponse { status, body })
		})
	}
}
