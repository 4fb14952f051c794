//! Credential snapshot and the freshness predicate that drives proactive renewal.

// self
use crate::{
	_prelude::*,
	auth::{UserSnapshot, token::secret::TokenSecret},
	config::SessionPolicy,
};

/// Freshness classification of a credential at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// No access token is held.
	Absent,
	/// Inside the usable part of the lifetime.
	Fresh,
	/// Inside the renewal threshold but not yet past the declared lifetime.
	Stale,
	/// Past the declared lifetime.
	Expired,
}

/// Current access/refresh token pair plus the identity they belong to.
///
/// Values of this type are snapshots; the live record sits inside
/// [`CredentialStore`](crate::store::CredentialStore) and only the coordinator writes it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
	/// Short-lived bearer token attached to each request.
	pub access_token: Option<TokenSecret>,
	/// Longer-lived token used solely to obtain a new access token.
	pub refresh_token: Option<TokenSecret>,
	/// Instant the current access token was issued.
	pub issued_at: Option<OffsetDateTime>,
	/// Last known authenticated identity.
	pub user: Option<UserSnapshot>,
}
impl Credential {
	/// Returns `true` when an access token is held.
	pub fn has_access_token(&self) -> bool {
		self.access_token.is_some()
	}

	/// Returns `true` when a refresh token is held.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}

	/// Time elapsed since issuance, if the token has an issuance stamp.
	pub fn age_at(&self, now: OffsetDateTime) -> Option<Duration> {
		self.issued_at.map(|issued| now - issued)
	}

	/// Declared expiry instant under `policy`.
	pub fn expires_at(&self, policy: &SessionPolicy) -> Option<OffsetDateTime> {
		self.issued_at.map(|issued| issued + policy.access_token_lifetime)
	}

	/// `now - issued_at < lifetime - threshold`.
	///
	/// A credential without an access token or issuance stamp is never fresh.
	pub fn is_fresh_at(&self, policy: &SessionPolicy, now: OffsetDateTime) -> bool {
		matches!(self.status_at(policy, now), CredentialStatus::Fresh)
	}

	/// Classifies the credential at `now`.
	pub fn status_at(&self, policy: &SessionPolicy, now: OffsetDateTime) -> CredentialStatus {
		if self.access_token.is_none() {
			return CredentialStatus::Absent;
		}

		let Some(age) = self.age_at(now) else {
			return CredentialStatus::Stale;
		};

		if age < policy.fresh_window() {
			CredentialStatus::Fresh
		} else if age < policy.access_token_lifetime {
			CredentialStatus::Stale
		} else {
			CredentialStatus::Expired
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("issued_at", &self.issued_at)
			.field("user", &self.user.as_ref().map(|u| &u.id))
			.finish()
	}
}
