//! Login, logout, cross-reload login hints, and role checks.

// self
use crate::{
	_prelude::*,
	api::{AuthApi, LoginRequest},
	auth::{Role, UserSnapshot},
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{Coordinator, Phase},
	store::{CredentialPatch, LoginHint},
};

impl<A> Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	/// Signs in with an identifier/secret pair.
	///
	/// Once the auth service accepts the credentials, any renewal in flight for the previous
	/// session is detached and the debounce window is reset. A rejected login surfaces
	/// [`Error::InvalidCredentials`] and leaves the current session, renewals included,
	/// untouched. On success the login hint is marked so other parts of the application
	/// can pick the new session up through [`Coordinator::sync_login_hint`].
	pub async fn login(
		&self,
		identifier: impl Into<String>,
		secret: impl Into<String>,
	) -> Result<UserSnapshot> {
		const KIND: OpKind = OpKind::Login;

		let span = OpSpan::new(KIND, "login");
		let request = LoginRequest::new(identifier, secret);

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.login_with(&request)).await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	async fn login_with(&self, request: &LoginRequest) -> Result<UserSnapshot> {
		let epoch = self.epoch();
		let grant = self.api.login(request).await?;
		let now = self.now();
		let user = grant.user.clone();
		let patch = CredentialPatch::issued(grant.access_token, now)
			.with_refresh_token(Some(grant.refresh_token))
			.with_user(grant.user);

		// A logout or another login that finished first wins.
		if self.replace_session(Some(epoch), patch, Phase::Authenticated).is_none() {
			return Err(Error::AuthenticationRequired);
		}

		let hint = LoginHint { completed_at: now, user_id: Some(user.id.clone()) };

		if let Err(e) = self.hints.mark_login_completed(hint).await {
			obs::trace_warning(&format!("Failed to record login hint: {e}."));
		}

		Ok(user)
	}

	/// Ends the session.
	///
	/// Local state is cleared first and unconditionally, so a renewal still in flight can never
	/// resurrect the session. The auth service is then told to retire the refresh token and the
	/// login hint is removed; failures of either are reported but do not undo the local logout.
	pub async fn logout(&self) -> Result<()> {
		const KIND: OpKind = OpKind::Logout;

		let span = OpSpan::new(KIND, "logout");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let previous = self
			.replace_session(None, CredentialPatch::clear_all(), Phase::Unauthenticated)
			.unwrap_or_default();
		let result = span
			.instrument(async {
				let remote = self.api.logout(previous.refresh_token.as_ref()).await;
				let hint = self.hints.clear().await.map_err(Error::from);

				remote.and(hint)
			})
			.await;

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Consumes a pending login hint and re-resolves identity.
	///
	/// Returns `Ok(None)` when no hint was pending or the session could not be confirmed.
	pub async fn sync_login_hint(&self) -> Result<Option<UserSnapshot>> {
		const KIND: OpKind = OpKind::SyncHint;

		if self.hints.take_login_completed().await?.is_none() {
			return Ok(None);
		}

		let span = OpSpan::new(KIND, "sync_login_hint");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let phase = span.instrument(self.resolve_identity(self.epoch())).await;

		if phase.is_authenticated() {
			obs::record_op_outcome(KIND, OpOutcome::Success);

			Ok(self.current_user())
		} else {
			obs::record_op_outcome(KIND, OpOutcome::Failure);

			Ok(None)
		}
	}

	/// Returns the signed-in user if their role is one of `allowed` (any role when empty).
	pub fn require_role(&self, allowed: &[Role]) -> Result<UserSnapshot> {
		let user = self
			.current_user()
			.filter(|_| self.is_authenticated())
			.ok_or(Error::AuthenticationRequired)?;

		if allowed.is_empty() || user.has_any_role(allowed) {
			Ok(user)
		} else {
			Err(Error::Forbidden { role: user.role.to_string() })
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::*,
		auth::{Credential, TokenSecret, UserId},
		clock::Clock,
		session::RenewOutcome,
		store::{HintStore, MemoryHintStore},
	};

	fn with_hints() -> (Arc<TestCoordinator>, Arc<ScriptedAuthApi>, Arc<MemoryHintStore>) {
		let hints = Arc::new(MemoryHintStore::default());
		let (coordinator, api, _clock) =
			build_test_coordinator_with(Default::default(), hints.clone());

		(coordinator, api, hints)
	}

	#[tokio::test]
	async fn login_installs_tokens_and_marks_hint() {
		let (coordinator, api, hints) = with_hints();
		let user = coordinator
			.login("buyer@example.com", "hunter2")
			.await
			.expect("Scripted login should succeed.");
		let credential = coordinator.credential();

		assert_eq!(user, demo_user());
		assert_eq!(api.login_calls(), 1);
		assert_eq!(coordinator.phase(), Phase::Authenticated);
		assert_eq!(credential.access_token.as_ref().map(TokenSecret::expose), Some("access-login-1"));
		assert_eq!(
			credential.refresh_token.as_ref().map(TokenSecret::expose),
			Some("refresh-login-1")
		);
		assert!(credential.issued_at.is_some());
		assert_eq!(hints.peek().and_then(|h| h.user_id), Some(demo_user().id));
	}

	#[tokio::test]
	async fn rejected_login_stays_signed_out() {
		let (coordinator, api, hints) = with_hints();

		api.fail_next_login(Scripted::BadSecret);

		let err = coordinator
			.login("buyer@example.com", "wrong")
			.await
			.expect_err("Scripted login rejection should surface.");

		assert!(matches!(err, Error::InvalidCredentials { .. }));
		assert_eq!(coordinator.phase(), Phase::Unauthenticated);
		assert_eq!(coordinator.credential(), Credential::default());
		assert!(hints.peek().is_none());
	}

	#[tokio::test]
	async fn logout_clears_everything() {
		let (coordinator, api, hints) = with_hints();

		coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");
		coordinator.logout().await.expect("Logout should succeed.");

		assert_eq!(api.logout_calls(), 1);
		assert_eq!(coordinator.phase(), Phase::Unauthenticated);
		assert_eq!(coordinator.credential(), Credential::default());
		assert!(hints.peek().is_none());
	}

	#[tokio::test]
	async fn logout_wins_over_inflight_renewal() {
		let (coordinator, api, _hints) = with_hints();

		coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");

		let hold = api.hold_refresh().await;
		let logout = async {
			let result = coordinator.logout().await;

			drop(hold);

			result
		};
		let (outcome, logged_out) = tokio::join!(coordinator.renew(), logout);

		logged_out.expect("Logout should succeed.");

		assert_eq!(api.refresh_calls(), 1);
		assert!(matches!(outcome, RenewOutcome::Failed(_)));
		assert_eq!(coordinator.phase(), Phase::Unauthenticated);
		assert_eq!(coordinator.credential(), Credential::default());
	}

	#[tokio::test]
	async fn renewal_started_during_login_cannot_mix_sessions() {
		let api = Arc::new(ScriptedAuthApi::default());
		let clock = Arc::new(ManualClock::default());
		let previous_user = UserSnapshot {
			id: UserId::new("user-0").expect("User id fixture should be valid."),
			name: "Previous Buyer".into(),
			email: "previous@example.com".into(),
			role: Role::Buyer,
		};
		let coordinator = Coordinator::builder(api.clone())
			.clock(clock.clone())
			.seed(Credential {
				access_token: Some(TokenSecret::new("access-old")),
				refresh_token: Some(TokenSecret::new("refresh-old")),
				issued_at: Some(clock.now() - Duration::minutes(16)),
				user: Some(previous_user),
			})
			.build();
		let login_hold = api.hold_login().await;
		let refresh_hold = api.hold_refresh().await;
		let release = async {
			drop(login_hold);

			for _ in 0..8 {
				tokio::task::yield_now().await;
			}

			drop(refresh_hold);
		};
		let (user, token, ()) = tokio::join!(
			coordinator.login("buyer@example.com", "hunter2"),
			coordinator.ensure_fresh(),
			release,
		);
		let credential = coordinator.credential();

		assert_eq!(user.expect("Login should succeed."), demo_user());
		assert_eq!(
			token.expect("Renewal overtaken by the login should yield the new token.").expose(),
			"access-login-1"
		);
		assert_eq!(api.refresh_calls(), 1);
		assert_eq!(api.profile_calls(), 0);
		assert_eq!(credential.access_token.as_ref().map(TokenSecret::expose), Some("access-login-1"));
		assert_eq!(
			credential.refresh_token.as_ref().map(TokenSecret::expose),
			Some("refresh-login-1")
		);
		assert_eq!(credential.user, Some(demo_user()));
		assert_eq!(coordinator.phase(), Phase::Authenticated);
	}

	#[tokio::test]
	async fn rejected_login_leaves_inflight_renewal_alone() {
		let (coordinator, api, clock) = build_test_coordinator();

		coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");
		clock.advance(Duration::minutes(15));
		api.fail_next_login(Scripted::BadSecret);

		let hold = api.hold_refresh().await;
		let release = async {
			for _ in 0..8 {
				tokio::task::yield_now().await;
			}

			drop(hold);
		};
		let (token, rejected, ()) = tokio::join!(
			coordinator.ensure_fresh(),
			coordinator.login("buyer@example.com", "wrong"),
			release,
		);

		assert!(matches!(rejected, Err(Error::InvalidCredentials { .. })));
		assert_eq!(
			token.expect("Renewal should survive a rejected login.").expose(),
			"access-refresh-1"
		);
		assert_eq!(coordinator.phase(), Phase::Authenticated);
		assert_eq!(
			coordinator.credential().access_token.as_ref().map(TokenSecret::expose),
			Some("access-refresh-1")
		);
	}

	#[tokio::test]
	async fn login_resets_the_debounce_window() {
		let (coordinator, api, _hints) = with_hints();

		coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");

		assert!(matches!(coordinator.renew().await, RenewOutcome::Renewed(_)));

		coordinator.login("buyer@example.com", "hunter2").await.expect("Login should succeed.");

		assert!(matches!(coordinator.renew().await, RenewOutcome::Renewed(_)));
		assert_eq!(api.refresh_calls(), 2);
	}

	#[tokio::test]
	async fn login_hint_resolves_identity_once() {
		let hints = Arc::new(MemoryHintStore::default());
		let api = Arc::new(ScriptedAuthApi::default());
		let clock = Arc::new(ManualClock::default());
		let coordinator = Coordinator::builder(api.clone())
			.clock(clock.clone())
			.hint_store(hints.clone())
			.seed(Credential {
				access_token: Some(TokenSecret::new("a-0")),
				refresh_token: Some(TokenSecret::new("r-0")),
				issued_at: Some(clock.now()),
				user: None,
			})
			.build();

		assert_eq!(coordinator.sync_login_hint().await.expect("Empty hint store is fine."), None);
		assert_eq!(api.profile_calls(), 0);

		hints
			.mark_login_completed(LoginHint {
				completed_at: clock.now(),
				user_id: Some(UserId::new("user-1").expect("User id fixture should be valid.")),
			})
			.await
			.expect("Memory hint store should accept the hint.");

		let user = coordinator.sync_login_hint().await.expect("Hint sync should succeed.");

		assert_eq!(user, Some(demo_user()));
		assert_eq!(api.profile_calls(), 1);
		assert!(hints.peek().is_none());
	}

	#[tokio::test]
	async fn role_guard_distinguishes_signed_out_and_forbidden() {
		let (coordinator, api, _hints) = with_hints();

		assert!(matches!(
			coordinator.require_role(&[Role::Buyer]),
			Err(Error::AuthenticationRequired)
		));

		api.set_user(UserSnapshot { role: Role::Seller, ..demo_user() });
		coordinator.login("seller@example.com", "hunter2").await.expect("Login should succeed.");

		assert!(coordinator.require_role(&[Role::Seller, Role::Admin]).is_ok());
		assert!(coordinator.require_role(&[]).is_ok());
		assert!(matches!(
			coordinator.require_role(&[Role::Buyer]),
			Err(Error::Forbidden { role }) if role == "seller"
		));
	}
}
