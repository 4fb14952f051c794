//! Credential record owned by the coordinator, plus the cross-reload login hint contract.
//!
//! [`CredentialStore`] is a passive record: readers get [`Credential`] snapshots and only the
//! coordinator (inside this crate) can apply a [`CredentialPatch`]. [`HintStore`] persists the
//! "a login just completed" flag that lets another part of the application ask the coordinator
//! to re-resolve identity without restarting.

pub mod file;
pub mod memory;

pub use file::FileHintStore;
pub use memory::MemoryHintStore;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret, UserId, UserSnapshot},
};

/// One field of a [`CredentialPatch`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Patch<T> {
	/// Leave the field as is.
	#[default]
	Keep,
	/// Replace the field.
	Set(T),
	/// Remove the field.
	Clear,
}
impl<T> Patch<T> {
	fn apply(self, slot: &mut Option<T>) {
		match self {
			Self::Keep => {},
			Self::Set(value) => *slot = Some(value),
			Self::Clear => *slot = None,
		}
	}
}

/// Partial update applied to the credential record.
#[derive(Clone, Debug, Default)]
pub struct CredentialPatch {
	/// Access token update.
	pub access_token: Patch<TokenSecret>,
	/// Refresh token update.
	pub refresh_token: Patch<TokenSecret>,
	/// Issuance stamp update.
	pub issued_at: Patch<OffsetDateTime>,
	/// Identity update.
	pub user: Patch<UserSnapshot>,
}
impl CredentialPatch {
	/// Wipes every field.
	pub fn clear_all() -> Self {
		Self {
			access_token: Patch::Clear,
			refresh_token: Patch::Clear,
			issued_at: Patch::Clear,
			user: Patch::Clear,
		}
	}

	/// Installs a newly issued access token stamped at `issued_at`.
	pub fn issued(access_token: TokenSecret, issued_at: OffsetDateTime) -> Self {
		Self {
			access_token: Patch::Set(access_token),
			issued_at: Patch::Set(issued_at),
			..Default::default()
		}
	}

	/// Replaces the refresh token when `refresh_token` is `Some`, keeps the current one otherwise.
	pub fn with_refresh_token(mut self, refresh_token: Option<TokenSecret>) -> Self {
		if let Some(token) = refresh_token {
			self.refresh_token = Patch::Set(token);
		}

		self
	}

	/// Replaces the identity snapshot.
	pub fn with_user(mut self, user: UserSnapshot) -> Self {
		self.user = Patch::Set(user);

		self
	}
}

/// In-process credential record.
#[derive(Debug, Default)]
pub struct CredentialStore(RwLock<Credential>);
impl CredentialStore {
	/// Creates a store holding `seed`.
	pub fn seeded(seed: Credential) -> Self {
		Self(RwLock::new(seed))
	}

	/// Returns an immutable snapshot of the record.
	pub fn read(&self) -> Credential {
		self.0.read().clone()
	}

	/// Reads one projection of the record without cloning the rest.
	pub fn view<R>(&self, f: impl FnOnce(&Credential) -> R) -> R {
		f(&self.0.read())
	}

	pub(crate) fn write(&self, patch: CredentialPatch) {
		let mut record = self.0.write();

		patch.access_token.apply(&mut record.access_token);
		patch.refresh_token.apply(&mut record.refresh_token);
		patch.issued_at.apply(&mut record.issued_at);
		patch.user.apply(&mut record.user);
	}
}

/// Boxed future returned by [`HintStore`] operations.
pub type HintFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, HintError>> + 'a + Send>>;

/// "A login just completed" marker shared across parts of the application.
///
/// The marker is a hint: the coordinator re-resolves identity when it sees one but never
/// trusts it as proof of authentication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginHint {
	/// Instant the login completed.
	#[serde(with = "time::serde::rfc3339")]
	pub completed_at: OffsetDateTime,
	/// Identity the login resolved to, if known.
	pub user_id: Option<UserId>,
}

/// Storage backend for the login hint.
pub trait HintStore
where
	Self: Send + Sync,
{
	/// Records a completed login, replacing any earlier marker.
	fn mark_login_completed(&self, hint: LoginHint) -> HintFuture<'_, ()>;

	/// Removes and returns the marker, if present.
	fn take_login_completed(&self) -> HintFuture<'_, Option<LoginHint>>;

	/// Removes the marker without reading it.
	fn clear(&self) -> HintFuture<'_, ()>;
}

/// Error type produced by [`HintStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum HintError {
	/// The marker could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage medium.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
