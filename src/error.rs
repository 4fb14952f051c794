//! Coordinator-level error types shared across the auth boundary, gate, and dispatch layers.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Login hint storage failure.
	#[error("{0}")]
	Hint(
		#[from]
		#[source]
		crate::store::HintError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; the session is kept.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Login rejected the supplied identifier/secret pair.
	#[error("Login was rejected: {reason}.")]
	InvalidCredentials {
		/// Server- or coordinator-supplied reason string.
		reason: String,
	},
	/// The auth service answered with a `401`-class rejection (expired or revoked token).
	#[error("Auth service rejected the credential: {reason}.")]
	Unauthorized {
		/// Server- or coordinator-supplied reason string.
		reason: String,
	},
	/// The authenticated user lacks the role required for the operation.
	#[error("User role `{role}` is not permitted here.")]
	Forbidden {
		/// Role held by the current user.
		role: String,
	},
	/// The session is gone; the user must sign in again.
	#[error("Authentication required.")]
	AuthenticationRequired,
}
impl Error {
	/// Returns `true` for rejections that invalidate the whole session.
	///
	/// Transient and transport failures keep the session; everything the auth service answered
	/// with a `401`-class status does not.
	pub fn is_session_clearing(&self) -> bool {
		matches!(self, Self::Unauthorized { .. } | Self::AuthenticationRequired)
	}

	/// Returns `true` when the failure happened on the wire or upstream and may succeed later.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL or endpoint path cannot be joined into a request URL.
	#[error("Endpoint `{path}` cannot be resolved against the base URL.")]
	InvalidEndpoint {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Renewal threshold must leave part of the lifetime usable.
	#[error("Renewal threshold {threshold} must be shorter than the token lifetime {lifetime}.")]
	ThresholdExceedsLifetime {
		/// Configured access-token lifetime.
		lifetime: Duration,
		/// Configured renewal threshold.
		threshold: Duration,
	},
	/// A policy duration was negative or zero where a positive value is required.
	#[error("Policy field `{field}` must be positive.")]
	NonPositiveDuration {
		/// Policy field name.
		field: &'static str,
	},
	/// Policy could not be decoded.
	#[error("Session policy could not be parsed.")]
	PolicyParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry later).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Auth service returned an unexpected but non-fatal response.
	#[error("Auth service returned an unexpected response: {message}.")]
	Upstream {
		/// Server- or coordinator-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Auth service responded with malformed JSON that could not be parsed.
	#[error("Auth service returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TransientError {
	/// HTTP status associated with the failure, when one was observed.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Upstream { status, .. } | Self::ResponseParse { status, .. } => *status,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
