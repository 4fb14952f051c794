//! Response helpers shared by the REST auth boundary and the reqwest dispatch transport.
//!
//! Both layers read the status and `Retry-After` hint into [`ResponseMetadata`] before the body
//! is consumed, then use [`decode_json`] and [`upstream_failure`] so that decoding errors and
//! non-success statuses are classified the same way everywhere.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransientError};

/// Metadata captured from an HTTP response before its body is consumed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl ResponseMetadata {
	/// Returns `true` for `401 Unauthorized` and `403 Forbidden`.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self.status, Some(401 | 403))
	}

	/// Returns `true` for any `2xx` status.
	pub fn is_success(&self) -> bool {
		matches!(self.status, Some(200..=299))
	}
}

/// Optional `{ "data": ... }` envelope some API deployments wrap responses in.
#[derive(Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
	Wrapped { data: T },
	Bare(T),
}

/// Decodes a JSON body, accepting both bare and `data`-wrapped payloads.
pub fn decode_json<T>(meta: &ResponseMetadata, body: &[u8]) -> Result<T>
where
	T: for<'de> Deserialize<'de>,
{
	let mut de = serde_json::Deserializer::from_slice(body);
	let envelope: Envelope<T> = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| TransientError::ResponseParse { source, status: meta.status })?;

	Ok(match envelope {
		Envelope::Wrapped { data } => data,
		Envelope::Bare(value) => value,
	})
}

/// Extracts a human-readable message from an error body (`message` or `error` field), falling
/// back to the status code.
pub fn error_message(meta: &ResponseMetadata, body: &[u8]) -> String {
	#[derive(Deserialize)]
	struct ErrorBody {
		message: Option<String>,
		error: Option<String>,
	}

	serde_json::from_slice::<ErrorBody>(body)
		.ok()
		.and_then(|b| b.message.or(b.error))
		.filter(|m| !m.trim().is_empty())
		.unwrap_or_else(|| match meta.status {
			Some(status) => format!("HTTP {status}"),
			None => "no response".into(),
		})
}

/// Builds the transient error reported for a non-success status that is not session-related.
pub fn upstream_failure(meta: &ResponseMetadata, body: &[u8]) -> Error {
	TransientError::Upstream {
		message: error_message(meta, body),
		status: meta.status,
		retry_after: meta.retry_after,
	}
	.into()
}

/// Captures status and `Retry-After` from a reqwest response.
#[cfg(feature = "reqwest")]
pub fn metadata_of(response: &reqwest::Response) -> ResponseMetadata {
	ResponseMetadata {
		status: Some(response.status().as_u16()),
		retry_after: parse_retry_after(response.headers()),
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<i64>() {
		return Some(Duration::seconds(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
