// self
use crate::{
	_prelude::*,
	api,
	dispatch::{ApiResponse, Method, RequestDescriptor, RequestTransport, TransportFuture},
	error::TransportError,
	http,
};

/// reqwest-backed [`RequestTransport`] rooted at the API base URL.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	base: Url,
}
impl ReqwestTransport {
	/// Creates a transport with a default reqwest client.
	pub fn new(base: Url) -> Self {
		Self::with_client(ReqwestClient::default(), base)
	}

	/// Reuses a caller-configured reqwest client (for example one sharing a cookie store with
	/// [`RestAuthApi`](crate::api::RestAuthApi)).
	pub fn with_client(client: ReqwestClient, base: Url) -> Self {
		Self { client, base: api::rest::directory_url(base) }
	}

	/// Base URL every request path is resolved against.
	pub fn base(&self) -> &Url {
		&self.base
	}
}
impl RequestTransport for ReqwestTransport {
	fn send<'a>(&'a self, request: &'a RequestDescriptor) -> TransportFuture<'a> {
		Box::pin(async move {
			let url = api::rest::resolve_endpoint(&self.base, request.path())?;
			let mut builder = self.client.request(reqwest_method(request.method()), url);

			if !request.query().is_empty() {
				builder = builder.query(request.query());
			}
			if let Some(body) = request.body() {
				builder = builder.json(body);
			}
			if let Some(bearer) = request.bearer() {
				builder = builder.bearer_auth(bearer.expose());
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let meta = http::metadata_of(&response);
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(ApiResponse {
				status: meta.status.unwrap_or_default(),
				retry_after: meta.retry_after,
				body,
			})
		})
	}
}

fn reqwest_method(method: Method) -> reqwest::Method {
	match method {
		Method::Get => reqwest::Method::GET,
		Method::Post => reqwest::Method::POST,
		Method::Put => reqwest::Method::PUT,
		Method::Patch => reqwest::Method::PATCH,
		Method::Delete => reqwest::Method::DELETE,
	}
}
