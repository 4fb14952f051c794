//! Startup identity resolution.

// self
use crate::{
	api::AuthApi,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{Coordinator, Phase, RenewOutcome},
	store::CredentialPatch,
};

impl<A> Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	/// Resolves the session once at startup and returns the resulting phase.
	///
	/// The profile is fetched with whatever access token is held. If that is rejected (or no
	/// token is held) and a refresh token exists, one renewal is attempted, which re-checks the
	/// profile under the new token. Only `401`-class answers clear a held session; transient
	/// failures keep it. Later calls, and calls racing the first one, wait for the same run and
	/// return the current phase.
	pub async fn initialize(&self) -> Phase {
		self.bootstrap.get_or_init(|| self.bootstrap_once()).await;

		self.phase()
	}

	async fn bootstrap_once(&self) {
		const KIND: OpKind = OpKind::Bootstrap;

		let span = OpSpan::new(KIND, "initialize");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let epoch = {
			let mut state = self.state.lock();

			super::set_phase(&mut state, Phase::Bootstrapping);

			state.epoch
		};

		span.instrument(self.resolve_identity(epoch)).await;

		let phase = {
			let mut state = self.state.lock();

			state.has_bootstrapped = true;

			if state.phase == Phase::Bootstrapping {
				let settled = if self.store.view(|c| c.has_access_token()) {
					Phase::Authenticated
				} else {
					Phase::Unauthenticated
				};

				super::set_phase(&mut state, settled);
			}

			state.phase
		};

		if phase.is_authenticated() {
			obs::record_op_outcome(KIND, OpOutcome::Success);
		} else {
			obs::record_op_outcome(KIND, OpOutcome::Failure);
		}
	}

	/// Confirms the held credential against the profile endpoint, renewing or clearing it as
	/// needed. Returns the phase once resolution settles.
	pub(super) async fn resolve_identity(&self, epoch: u64) -> Phase {
		let credential = self.store.read();

		match self.api.get_profile(credential.access_token.as_ref()).await {
			Ok(user) if credential.has_access_token() => {
				self.transition(
					epoch,
					Some(CredentialPatch::default().with_user(user)),
					Phase::Authenticated,
				);
			},
			Ok(_) => {
				obs::trace_warning("Profile resolved without an access token; renewing.");
				self.recover_identity(epoch, credential.has_refresh_token()).await;
			},
			Err(e) if credential.has_access_token() && !e.is_session_clearing() => {
				obs::trace_warning(&format!("Profile check failed, keeping the session: {e}."));
				self.transition(epoch, None, Phase::Authenticated);
			},
			Err(e) => {
				obs::trace_warning(&format!("Profile check failed: {e}."));
				self.recover_identity(epoch, credential.has_refresh_token()).await;
			},
		}

		self.phase()
	}

	async fn recover_identity(&self, epoch: u64, has_refresh_token: bool) {
		if !has_refresh_token {
			self.clear_session(epoch);

			return;
		}

		match self.renew().await {
			RenewOutcome::Renewed(_) | RenewOutcome::Failed(_) => {},
			// A renewal just finished elsewhere; whatever it installed stands.
			RenewOutcome::TooSoon { .. } =>
				if !self.store.view(|c| c.has_access_token()) {
					self.clear_session(epoch);
				},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{Credential, TokenSecret},
		clock::Clock,
	};

	fn seeded(
		access: Option<&str>,
		refresh: Option<&str>,
	) -> (TestCoordinator, Arc<ScriptedAuthApi>, Arc<ManualClock>) {
		let api = Arc::new(ScriptedAuthApi::default());
		let clock = Arc::new(ManualClock::default());
		let coordinator = Coordinator::builder(api.clone())
			.clock(clock.clone())
			.seed(Credential {
				access_token: access.map(TokenSecret::new),
				refresh_token: refresh.map(TokenSecret::new),
				issued_at: access.map(|_| clock.now()),
				user: None,
			})
			.build();

		(coordinator, api, clock)
	}

	#[tokio::test]
	async fn valid_access_token_resolves_identity() {
		let (coordinator, api, _clock) = seeded(Some("a-0"), Some("r-0"));

		assert_eq!(coordinator.initialize().await, Phase::Authenticated);
		assert_eq!(coordinator.current_user(), Some(demo_user()));
		assert_eq!(api.refresh_calls(), 0);
		assert!(coordinator.state().has_bootstrapped);
	}

	#[tokio::test]
	async fn rejected_profile_with_refresh_token_renews_once() {
		let (coordinator, api, _clock) = seeded(Some("a-0"), Some("r-0"));

		api.fail_next_profile(Scripted::Unauthorized);

		assert_eq!(coordinator.initialize().await, Phase::Authenticated);
		assert_eq!(api.refresh_calls(), 1);
		assert_eq!(api.profile_calls(), 2);
		assert_eq!(
			coordinator.credential().access_token.as_ref().map(TokenSecret::expose),
			Some("access-refresh-1")
		);
	}

	#[tokio::test]
	async fn rejected_profile_and_refresh_ends_signed_out() {
		let (coordinator, api, _clock) = seeded(Some("a-0"), Some("r-0"));

		api.fail_next_profile(Scripted::Unauthorized);
		api.fail_next_refresh(Scripted::Unauthorized);

		assert_eq!(coordinator.initialize().await, Phase::Unauthenticated);
		assert_eq!(coordinator.credential(), Credential::default());
	}

	#[tokio::test]
	async fn no_refresh_token_skips_renewal() {
		let (coordinator, api, _clock) = seeded(None, None);

		assert_eq!(coordinator.initialize().await, Phase::Unauthenticated);
		assert_eq!(api.refresh_calls(), 0);
		assert_eq!(api.profile_calls(), 1);
		assert!(coordinator.state().has_bootstrapped);
	}

	#[tokio::test]
	async fn transient_profile_failure_keeps_held_session() {
		let (coordinator, api, _clock) = seeded(Some("a-0"), Some("r-0"));

		api.fail_next_profile(Scripted::ServerError);

		assert_eq!(coordinator.initialize().await, Phase::Authenticated);
		assert_eq!(api.refresh_calls(), 0);
		assert!(coordinator.credential().has_access_token());
	}

	#[tokio::test]
	async fn refresh_token_alone_bootstraps_through_renewal() {
		let (coordinator, api, _clock) = seeded(None, Some("r-0"));

		assert_eq!(coordinator.initialize().await, Phase::Authenticated);
		assert_eq!(api.refresh_calls(), 1);
		assert_eq!(coordinator.current_user(), Some(demo_user()));
	}

	#[tokio::test]
	async fn bootstrap_runs_once_for_concurrent_callers() {
		let (coordinator, api, _clock) = seeded(Some("a-0"), None);
		let (a, b, c) =
			tokio::join!(coordinator.initialize(), coordinator.initialize(), coordinator.initialize());

		assert_eq!([a, b, c], [Phase::Authenticated; 3]);
		assert_eq!(api.profile_calls(), 1);
		assert_eq!(coordinator.initialize().await, Phase::Authenticated);
		assert_eq!(api.profile_calls(), 1);
	}
}
