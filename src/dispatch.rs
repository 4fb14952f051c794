//! Request dispatch adapter: attaches the session's bearer token to outgoing requests and
//! routes `401 Unauthorized` answers back through the coordinator.
//!
//! Requests are plain [`RequestDescriptor`] values, so a rejected request can be handed to
//! [`Coordinator::on_unauthorized`] and come back as a replayable continuation. The wire side
//! is abstracted behind [`RequestTransport`]; [`ReqwestTransport`] is the default.

#[cfg(feature = "reqwest")] mod transport;

#[cfg(feature = "reqwest")] pub use transport::ReqwestTransport;

// self
use crate::{
	_prelude::*,
	api::AuthApi,
	auth::TokenSecret,
	http::{self, ResponseMetadata},
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{Coordinator, UnauthorizedOutcome},
};

/// HTTP method of a dispatched request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
}
impl Method {
	/// Upper-case method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Everything needed to send, and later replay, one API request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestDescriptor {
	method: Method,
	path: String,
	query: Vec<(String, String)>,
	body: Option<serde_json::Value>,
	bearer: Option<TokenSecret>,
	replayed: bool,
}
impl RequestDescriptor {
	/// Creates a request for `path`, relative to the transport's base URL.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			query: Vec::new(),
			body: None,
			bearer: None,
			replayed: false,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::Post, path)
	}

	/// Shorthand for a `PATCH` request.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::Patch, path)
	}

	/// Shorthand for a `DELETE` request.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Sets the JSON body.
	pub fn with_json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Sets (or removes) the bearer token the request is sent with.
	pub fn authorize(mut self, bearer: Option<TokenSecret>) -> Self {
		self.bearer = bearer;

		self
	}

	/// HTTP method.
	pub fn method(&self) -> Method {
		self.method
	}

	/// Path relative to the base URL.
	pub fn path(&self) -> &str {
		&self.path
	}

	/// Query parameters in insertion order.
	pub fn query(&self) -> &[(String, String)] {
		&self.query
	}

	/// JSON body, if any.
	pub fn body(&self) -> Option<&serde_json::Value> {
		self.body.as_ref()
	}

	/// Bearer token attached to the request.
	pub fn bearer(&self) -> Option<&TokenSecret> {
		self.bearer.as_ref()
	}

	/// Returns `true` if this request is already the one permitted replay.
	pub fn is_replay(&self) -> bool {
		self.replayed
	}

	pub(crate) fn into_replay(mut self, bearer: TokenSecret) -> Self {
		self.bearer = Some(bearer);
		self.replayed = true;

		self
	}
}

/// Raw response handed back by a [`RequestTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
	/// Response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns `true` for any `2xx` status.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` for `401 Unauthorized`.
	///
	/// `403 Forbidden` is a role problem, not a credential problem, and is returned to the
	/// caller as is.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}

	/// Status and Retry-After hint.
	pub fn metadata(&self) -> ResponseMetadata {
		ResponseMetadata { status: Some(self.status), retry_after: self.retry_after }
	}

	/// Decodes a successful JSON body, or maps a non-success status to a transient error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let meta = self.metadata();

		if self.is_success() {
			http::decode_json(&meta, &self.body)
		} else {
			Err(http::upstream_failure(&meta, &self.body))
		}
	}
}

/// Boxed future returned by [`RequestTransport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Sends a described request over the wire.
pub trait RequestTransport
where
	Self: Send + Sync,
{
	/// Sends `request` exactly as described, bearer token included.
	///
	/// Only transport failures are errors; every HTTP status comes back as an [`ApiResponse`].
	fn send<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a>;
}

/// Attaches session credentials to requests and recovers from `401` once per request.
pub struct Dispatcher<A, T>
where
	A: ?Sized + AuthApi,
	T: ?Sized + RequestTransport,
{
	coordinator: Arc<Coordinator<A>>,
	transport: Arc<T>,
}
impl<A, T> Dispatcher<A, T>
where
	A: ?Sized + AuthApi,
	T: ?Sized + RequestTransport,
{
	/// Creates a dispatcher over a shared coordinator.
	pub fn new(coordinator: Arc<Coordinator<A>>, transport: Arc<T>) -> Self {
		Self { coordinator, transport }
	}

	/// Coordinator driving this dispatcher.
	pub fn coordinator(&self) -> &Arc<Coordinator<A>> {
		&self.coordinator
	}

	/// Sends `request` with a fresh bearer token.
	///
	/// A signed-out session sends the request without a token, so public endpoints keep
	/// working. A `401` answer goes through [`Coordinator::on_unauthorized`] and the request is
	/// replayed at most once; a second `401` ends the session with
	/// [`Error::AuthenticationRequired`]. Any other status is returned to the caller.
	pub async fn execute(&self, request: RequestDescriptor) -> Result<ApiResponse> {
		const KIND: OpKind = OpKind::Dispatch;

		let span = OpSpan::new(KIND, "execute");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.execute_inner(request)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Sends `request` and decodes a successful JSON body.
	pub async fn execute_json<R>(&self, request: RequestDescriptor) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.execute(request).await?.json()
	}

	async fn execute_inner(&self, request: RequestDescriptor) -> Result<ApiResponse> {
		let bearer = match self.coordinator.ensure_fresh().await {
			Ok(token) => Some(token),
			Err(Error::AuthenticationRequired) => None,
			Err(e) => return Err(e),
		};
		let mut request = request.authorize(bearer);

		loop {
			let response = self.transport.send(&request).await?;

			if !response.is_unauthorized() {
				return Ok(response);
			}

			match self.coordinator.on_unauthorized(request).await {
				UnauthorizedOutcome::Retry(replay) => request = replay,
				UnauthorizedOutcome::Fail(e) => return Err(e),
			}
		}
	}
}
impl<A, T> Clone for Dispatcher<A, T>
where
	A: ?Sized + AuthApi,
	T: ?Sized + RequestTransport,
{
	fn clone(&self) -> Self {
		Self { coordinator: self.coordinator.clone(), transport: self.transport.clone() }
	}
}
impl<A, T> Debug for Dispatcher<A, T>
where
	A: ?Sized + AuthApi,
	T: ?Sized + RequestTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher").field("coordinator", &self.coordinator).finish()
	}
}
