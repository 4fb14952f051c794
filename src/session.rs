//! Session lifecycle coordinator.
//!
//! [`Coordinator`] owns the credential record and the refresh gate, and is the only writer of
//! either. Callers drive it through a handful of operations:
//!
//! - [`Coordinator::initialize`] resolves identity once at startup.
//! - [`Coordinator::ensure_fresh`] renews ahead of expiry before a request goes out.
//! - [`Coordinator::on_unauthorized`] decides whether a `401`-rejected request may be replayed.
//! - [`Coordinator::login`] and [`Coordinator::logout`] start and end sessions.
//!
//! Every renewal funnels through a [`SingleFlightGate`], so a burst of expired requests costs
//! one refresh call. Login and logout advance a private session epoch; a renewal that started
//! under an older epoch still answers its waiters but never writes the record.

mod account;
mod bootstrap;
mod metrics;
mod renew;
mod unauthorized;

pub use metrics::RenewalMetrics;

// self
use crate::{
	_prelude::*,
	api::AuthApi,
	auth::{Credential, TokenSecret, UserSnapshot},
	clock::{self, Clock, SharedClock},
	config::SessionPolicy,
	dispatch::RequestDescriptor,
	gate::SingleFlightGate,
	obs,
	store::{CredentialPatch, CredentialStore, HintStore, MemoryHintStore},
};

/// Coarse lifecycle phase of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	/// Startup identity resolution is running.
	Bootstrapping,
	/// No usable access token is held.
	Unauthenticated,
	/// An access token is held and believed valid.
	Authenticated,
	/// A renewal is in flight; the current access token is still attached to requests.
	Refreshing,
}
impl Phase {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Phase::Bootstrapping => "bootstrapping",
			Phase::Unauthenticated => "unauthenticated",
			Phase::Authenticated => "authenticated",
			Phase::Refreshing => "refreshing",
		}
	}

	/// Returns `true` while an access token is held.
	pub const fn is_authenticated(self) -> bool {
		matches!(self, Phase::Authenticated | Phase::Refreshing)
	}
}
impl Display for Phase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Snapshot of the coordinator's lifecycle flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorState {
	/// Current phase.
	pub phase: Phase,
	/// Whether [`Coordinator::initialize`] has completed.
	pub has_bootstrapped: bool,
	/// Instant the most recent refresh exchange started.
	pub last_refresh_attempt_at: Option<OffsetDateTime>,
}

/// Result of one renewal request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenewOutcome {
	/// The refresh exchange succeeded; carries the new access token.
	Renewed(TokenSecret),
	/// The refresh exchange failed and the session was cleared (or had already been replaced).
	Failed(RenewalFailure),
	/// A renewal completed less than the debounce window ago; nothing was sent.
	TooSoon {
		/// Time left in the debounce window.
		retry_in: Duration,
	},
}
impl RenewOutcome {
	/// Returns the new access token on success.
	pub fn token(&self) -> Option<&TokenSecret> {
		match self {
			Self::Renewed(token) => Some(token),
			_ => None,
		}
	}
}

/// Why a renewal did not produce a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenewalFailure {
	/// The auth service rejected the refresh token or the renewed identity.
	Rejected {
		/// Service-supplied reason.
		reason: String,
	},
	/// The auth service could not be reached or answered with a server error.
	Unreachable {
		/// Transport or upstream failure summary.
		reason: String,
	},
	/// No refresh token was held.
	MissingRefreshToken,
	/// A login or logout replaced the session while the exchange was in flight.
	Superseded,
}
impl RenewalFailure {
	fn from_error(e: &Error) -> Self {
		if e.is_transient() {
			Self::Unreachable { reason: e.to_string() }
		} else {
			Self::Rejected { reason: e.to_string() }
		}
	}
}

/// Decision returned by [`Coordinator::on_unauthorized`].
#[derive(Debug)]
pub enum UnauthorizedOutcome {
	/// Replay the request once with the attached credential.
	Retry(RequestDescriptor),
	/// Give up; the error is the one to surface to the caller.
	Fail(Error),
}

#[derive(Debug)]
struct SessionState {
	phase: Phase,
	has_bootstrapped: bool,
	last_refresh_attempt_at: Option<OffsetDateTime>,
	epoch: u64,
}

/// Coordinates login, logout, bootstrap, and token renewal for one session.
pub struct Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	api: Arc<A>,
	store: CredentialStore,
	state: Mutex<SessionState>,
	gate: SingleFlightGate<RenewOutcome>,
	policy: SessionPolicy,
	clock: SharedClock,
	hints: Arc<dyn HintStore>,
	metrics: RenewalMetrics,
	bootstrap: OnceCell<()>,
}
impl<A> Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	/// Starts a builder around the auth service boundary.
	pub fn builder(api: Arc<A>) -> CoordinatorBuilder<A> {
		CoordinatorBuilder {
			api,
			policy: SessionPolicy::default(),
			clock: clock::system(),
			hints: Arc::new(MemoryHintStore::default()),
			seed: None,
		}
	}

	/// Last known authenticated identity.
	pub fn current_user(&self) -> Option<UserSnapshot> {
		self.store.view(|c| c.user.clone())
	}

	/// Snapshot of the credential record.
	pub fn credential(&self) -> Credential {
		self.store.read()
	}

	/// Snapshot of the lifecycle flags.
	pub fn state(&self) -> CoordinatorState {
		let state = self.state.lock();

		CoordinatorState {
			phase: state.phase,
			has_bootstrapped: state.has_bootstrapped,
			last_refresh_attempt_at: state.last_refresh_attempt_at,
		}
	}

	/// Current phase.
	pub fn phase(&self) -> Phase {
		self.state.lock().phase
	}

	/// Returns `true` while an access token is held.
	pub fn is_authenticated(&self) -> bool {
		self.phase().is_authenticated()
	}

	/// Timing policy in effect.
	pub fn policy(&self) -> &SessionPolicy {
		&self.policy
	}

	/// Renewal counters.
	pub fn metrics(&self) -> &RenewalMetrics {
		&self.metrics
	}

	fn now(&self) -> OffsetDateTime {
		self.clock.now()
	}

	fn epoch(&self) -> u64 {
		self.state.lock().epoch
	}

	/// Applies `patch` and moves to `phase` if no login/logout happened since `epoch` was read.
	fn transition(&self, epoch: u64, patch: Option<CredentialPatch>, phase: Phase) -> bool {
		let mut state = self.state.lock();

		if state.epoch != epoch {
			return false;
		}
		if let Some(patch) = patch {
			self.store.write(patch);
		}

		set_phase(&mut state, phase);

		true
	}

	fn clear_session(&self, epoch: u64) -> bool {
		self.transition(epoch, Some(CredentialPatch::clear_all()), Phase::Unauthenticated)
	}

	/// Starts a new session epoch holding `patch` and returns the record as it was before.
	///
	/// With `expected` set, nothing changes unless the epoch still matches it. The record, the
	/// phase, and the gate are updated under one lock, so a renewal from the previous epoch can
	/// neither write the record nor be joined afterwards.
	fn replace_session(
		&self,
		expected: Option<u64>,
		patch: CredentialPatch,
		phase: Phase,
	) -> Option<Credential> {
		let mut state = self.state.lock();

		if expected.is_some_and(|epoch| epoch != state.epoch) {
			return None;
		}

		state.epoch = state.epoch.wrapping_add(1);

		let previous = self.store.read();

		self.store.write(patch);
		set_phase(&mut state, phase);
		self.gate.reset();

		Some(previous)
	}
}
impl<A> Debug for Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("state", &self.state())
			.field("credential", &self.store.read())
			.field("gate", &self.gate)
			.field("policy", &self.policy)
			.finish()
	}
}

fn set_phase(state: &mut SessionState, phase: Phase) {
	if state.phase == phase {
		return;
	}

	obs::trace_transition(state.phase.as_str(), phase.as_str());
	obs::record_transition(state.phase.as_str(), phase.as_str());

	state.phase = phase;
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder<A>
where
	A: ?Sized + AuthApi,
{
	api: Arc<A>,
	policy: SessionPolicy,
	clock: SharedClock,
	hints: Arc<dyn HintStore>,
	seed: Option<Credential>,
}
impl<A> CoordinatorBuilder<A>
where
	A: ?Sized + AuthApi,
{
	/// Overrides the timing policy.
	pub fn policy(mut self, policy: SessionPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Overrides the clock (defaults to the system clock).
	pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Overrides the login hint backend (defaults to an in-memory store).
	pub fn hint_store(mut self, hints: Arc<dyn HintStore>) -> Self {
		self.hints = hints;

		self
	}

	/// Starts from a credential restored by the host, for example one kept in memory across a
	/// soft restart.
	pub fn seed(mut self, credential: Credential) -> Self {
		self.seed = Some(credential);

		self
	}

	/// Finalizes the coordinator.
	pub fn build(self) -> Coordinator<A> {
		let seed = self.seed.unwrap_or_default();
		let phase =
			if seed.has_access_token() { Phase::Authenticated } else { Phase::Unauthenticated };

		Coordinator {
			gate: SingleFlightGate::new(self.policy.refresh_debounce, self.clock.clone()),
			api: self.api,
			store: CredentialStore::seeded(seed),
			state: Mutex::new(SessionState {
				phase,
				has_bootstrapped: false,
				last_refresh_attempt_at: None,
				epoch: 0,
			}),
			policy: self.policy,
			clock: self.clock,
			hints: self.hints,
			metrics: Default::default(),
			bootstrap: OnceCell::new(),
		}
	}
}
impl<A> Debug for CoordinatorBuilder<A>
where
	A: ?Sized + AuthApi,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CoordinatorBuilder")
			.field("policy", &self.policy)
			.field("seeded", &self.seed.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::*;

	#[test]
	fn new_coordinator_starts_signed_out() {
		let (coordinator, _api, _clock) = build_test_coordinator();
		let state = coordinator.state();

		assert_eq!(state.phase, Phase::Unauthenticated);
		assert!(!state.has_bootstrapped);
		assert_eq!(state.last_refresh_attempt_at, None);
		assert_eq!(coordinator.credential(), Credential::default());
		assert!(coordinator.current_user().is_none());
	}

	#[test]
	fn seeded_access_token_starts_authenticated() {
		let clock = Arc::new(ManualClock::default());
		let coordinator = Coordinator::builder(Arc::new(ScriptedAuthApi::default()))
			.clock(clock.clone())
			.seed(Credential {
				access_token: Some(TokenSecret::new("seed-access")),
				refresh_token: Some(TokenSecret::new("seed-refresh")),
				issued_at: Some(clock.now()),
				user: Some(demo_user()),
			})
			.build();

		assert_eq!(coordinator.phase(), Phase::Authenticated);
		assert_eq!(coordinator.current_user(), Some(demo_user()));
	}

	#[test]
	fn stale_epoch_transitions_are_discarded() {
		let (coordinator, _api, clock) = build_test_coordinator();
		let epoch = coordinator.epoch();

		coordinator.replace_session(None, CredentialPatch::clear_all(), Phase::Unauthenticated);

		assert!(!coordinator.transition(
			epoch,
			Some(CredentialPatch::issued(TokenSecret::new("late"), clock.now())),
			Phase::Authenticated,
		));
		assert_eq!(coordinator.phase(), Phase::Unauthenticated);
		assert!(!coordinator.credential().has_access_token());
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let clock = Arc::new(ManualClock::default());
		let coordinator = Coordinator::builder(Arc::new(ScriptedAuthApi::default()))
			.clock(clock.clone())
			.seed(Credential {
				access_token: Some(TokenSecret::new("very-secret-access")),
				refresh_token: None,
				issued_at: Some(clock.now()),
				user: None,
			})
			.build();
		let rendered = format!("{coordinator:?}");

		assert!(!rendered.contains("very-secret-access"));
		assert!(rendered.contains("Authenticated"));
	}
}
