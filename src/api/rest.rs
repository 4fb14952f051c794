//! reqwest-backed [`AuthApi`] speaking the JSON REST dialect of the storefront API.

// self
use crate::{
	_prelude::*,
	api::{ApiFuture, AuthApi, LoginGrant, LoginRequest, RefreshGrant},
	auth::{TokenSecret, UserSnapshot},
	error::{ConfigError, TransportError},
	http::{self, ResponseMetadata},
};

/// Endpoint paths, relative to the API base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthEndpoints {
	/// `POST` with `{ email, password }`.
	pub login: String,
	/// `POST` with `{ refreshToken }`.
	pub refresh: String,
	/// `POST` with `{ refreshToken }` when one is held.
	pub logout: String,
	/// `GET` with the bearer token.
	pub profile: String,
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			refresh: "/auth/refresh-token".into(),
			logout: "/auth/logout".into(),
			profile: "/users/profile".into(),
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody<'a> {
	refresh_token: &'a str,
}

/// [`AuthApi`] implementation over HTTP.
///
/// The reqwest client should keep a cookie store if the deployment relies on an HTTP-only
/// refresh cookie; the refresh token is also sent in the request body for deployments that do
/// not.
#[derive(Clone, Debug)]
pub struct RestAuthApi {
	client: ReqwestClient,
	base: Url,
	endpoints: AuthEndpoints,
}
impl RestAuthApi {
	/// Creates a boundary rooted at `base` (for example `http://localhost:5000/api/v1`).
	pub fn new(base: Url) -> Self {
		Self::with_client(ReqwestClient::default(), base)
	}

	/// Creates a boundary whose requests give up after `timeout`.
	pub fn with_timeout(base: Url, timeout: Duration) -> Result<Self, ConfigError> {
		let timeout = std::time::Duration::try_from(timeout)
			.ok()
			.filter(|t| !t.is_zero())
			.ok_or(ConfigError::NonPositiveDuration { field: "request_timeout" })?;
		let client = ReqwestClient::builder().timeout(timeout).build()?;

		Ok(Self::with_client(client, base))
	}

	/// Reuses a caller-configured reqwest client.
	pub fn with_client(client: ReqwestClient, base: Url) -> Self {
		Self { client, base: directory_url(base), endpoints: AuthEndpoints::default() }
	}

	/// Overrides the endpoint paths.
	pub fn with_endpoints(mut self, endpoints: AuthEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Base URL every endpoint is resolved against.
	pub fn base(&self) -> &Url {
		&self.base
	}

	fn resolve(&self, path: &str) -> Result<Url> {
		resolve_endpoint(&self.base, path)
	}

	async fn send(&self, request: reqwest::RequestBuilder) -> Result<(ResponseMetadata, Vec<u8>)> {
		let response = request.send().await.map_err(TransportError::from)?;
		let meta = http::metadata_of(&response);
		let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

		Ok((meta, body))
	}
}
impl AuthApi for RestAuthApi {
	fn login<'a>(&'a self, request: &'a LoginRequest) -> ApiFuture<'a, LoginGrant> {
		Box::pin(async move {
			let url = self.resolve(&self.endpoints.login)?;
			let (meta, body) = self.send(self.client.post(url).json(request)).await?;

			match meta.status {
				_ if meta.is_success() => http::decode_json(&meta, &body),
				Some(400 | 401 | 403) =>
					Err(Error::InvalidCredentials { reason: http::error_message(&meta, &body) }),
				_ => Err(http::upstream_failure(&meta, &body)),
			}
		})
	}

	fn refresh_token<'a>(&'a self, refresh: &'a TokenSecret) -> ApiFuture<'a, RefreshGrant> {
		Box::pin(async move {
			let url = self.resolve(&self.endpoints.refresh)?;
			let request =
				self.client.post(url).json(&RefreshBody { refresh_token: refresh.expose() });
			let (meta, body) = self.send(request).await?;

			match meta.status {
				_ if meta.is_success() => http::decode_json(&meta, &body),
				Some(400 | 401 | 403) =>
					Err(Error::Unauthorized { reason: http::error_message(&meta, &body) }),
				_ => Err(http::upstream_failure(&meta, &body)),
			}
		})
	}

	fn logout<'a>(&'a self, refresh: Option<&'a TokenSecret>) -> ApiFuture<'a, ()> {
		Box::pin(async move {
			let url = self.resolve(&self.endpoints.logout)?;
			let mut request = self.client.post(url);

			if let Some(refresh) = refresh {
				request = request.json(&RefreshBody { refresh_token: refresh.expose() });
			}

			let (meta, body) = self.send(request).await?;

			// A session the server no longer knows is as logged out as it gets.
			if meta.is_success() || meta.is_unauthorized() {
				Ok(())
			} else {
				Err(http::upstream_failure(&meta, &body))
			}
		})
	}

	fn get_profile<'a>(&'a self, access: Option<&'a TokenSecret>) -> ApiFuture<'a, UserSnapshot> {
		Box::pin(async move {
			let url = self.resolve(&self.endpoints.profile)?;
			let mut request = self.client.get(url);

			if let Some(access) = access {
				request = request.bearer_auth(access.expose());
			}

			let (meta, body) = self.send(request).await?;

			if meta.is_success() {
				http::decode_json(&meta, &body)
			} else if meta.is_unauthorized() {
				Err(Error::Unauthorized { reason: http::error_message(&meta, &body) })
			} else {
				Err(http::upstream_failure(&meta, &body))
			}
		})
	}
}

/// Makes sure `base` ends with `/` so relative joins append instead of replacing the last
/// segment.
pub(crate) fn directory_url(mut base: Url) -> Url {
	if !base.path().ends_with('/') {
		let path = format!("{}/", base.path());

		base.set_path(&path);
	}

	base
}

/// Joins an endpoint path (with or without a leading `/`) onto a directory-style base URL.
pub(crate) fn resolve_endpoint(base: &Url, path: &str) -> Result<Url> {
	base.join(path.trim_start_matches('/'))
		.map_err(|source| ConfigError::InvalidEndpoint { path: path.into(), source }.into())
}
