//! Auth service boundary consumed by the coordinator.
//!
//! [`AuthApi`] is the coordinator's only dependency on the remote auth endpoints. Every
//! method returns a boxed future so implementations stay object safe and can be shared behind
//! `Arc<dyn AuthApi>`. Failures are reported as crate [`Error`]s; the coordinator relies on
//! the following classification:
//!
//! - [`Error::InvalidCredentials`]: login rejected the identifier/secret pair.
//! - [`Error::Unauthorized`]: `401`-class rejection of a refresh or profile call.
//! - [`Error::Transient`] / [`Error::Transport`]: anything else (server errors, throttling,
//!   network failures).

#[cfg(feature = "reqwest")] pub mod rest;

#[cfg(feature = "reqwest")] pub use rest::*;

// self
use crate::{
	_prelude::*,
	auth::{TokenSecret, UserSnapshot},
};

/// Boxed future returned by [`AuthApi`] operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Remote login/refresh/logout/profile endpoints.
pub trait AuthApi
where
	Self: Send + Sync,
{
	/// Exchanges an identifier/secret pair for a token pair and the user snapshot.
	fn login<'a>(&'a self, request: &'a LoginRequest) -> ApiFuture<'a, LoginGrant>;

	/// Exchanges the refresh token for a new access token (and optionally a rotated refresh
	/// token).
	fn refresh_token<'a>(&'a self, refresh: &'a TokenSecret) -> ApiFuture<'a, RefreshGrant>;

	/// Ends the server-side session. `refresh` is the token being retired, when one was held.
	fn logout<'a>(&'a self, refresh: Option<&'a TokenSecret>) -> ApiFuture<'a, ()>;

	/// Resolves the identity behind `access`.
	///
	/// Implementations backed by ambient credentials (cookies) may succeed without a token.
	fn get_profile<'a>(&'a self, access: Option<&'a TokenSecret>) -> ApiFuture<'a, UserSnapshot>;
}

/// Login form sent to the auth service.
#[derive(Clone, Debug, Serialize)]
pub struct LoginRequest {
	/// Account identifier (email on the wire).
	#[serde(rename = "email")]
	pub identifier: String,
	/// Account secret (password on the wire); redacted in debug output.
	#[serde(rename = "password")]
	pub secret: TokenSecret,
}
impl LoginRequest {
	/// Creates a login form.
	pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { identifier: identifier.into(), secret: TokenSecret::new(secret) }
	}
}

/// Successful login response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Newly issued refresh token.
	pub refresh_token: TokenSecret,
	/// Authenticated identity.
	pub user: UserSnapshot,
}

/// Successful refresh response.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshGrant {
	/// Newly issued access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; `None` keeps the current one.
	#[serde(default)]
	pub refresh_token: Option<TokenSecret>,
}
