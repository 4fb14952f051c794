//! Proactive and explicit renewal through the single-flight gate.

// self
use crate::{
	_prelude::*,
	api::AuthApi,
	auth::{CredentialStatus, TokenSecret},
	gate::Flight,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{Coordinator, Phase, RenewOutcome, RenewalFailure},
	store::CredentialPatch,
};

impl<A> Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	/// Returns an access token that is fresh enough to attach to a request.
	///
	/// Stale tokens are renewed through the gate when a refresh token is held; without one the
	/// stale token is returned as is and the server gets the final word. A debounced renewal,
	/// or one overtaken by a login, returns whatever token is current.
	pub async fn ensure_fresh(&self) -> Result<TokenSecret> {
		const KIND: OpKind = OpKind::EnsureFresh;

		let credential = self.store.read();
		let Some(access) = credential.access_token.clone() else {
			return Err(Error::AuthenticationRequired);
		};

		match credential.status_at(&self.policy, self.now()) {
			CredentialStatus::Fresh => return Ok(access),
			_ if !credential.has_refresh_token() => return Ok(access),
			_ => {},
		}

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = match self.renew().await {
			RenewOutcome::Renewed(token) => Ok(token),
			RenewOutcome::TooSoon { .. } | RenewOutcome::Failed(RenewalFailure::Superseded) =>
				self.store.view(|c| c.access_token.clone()).ok_or(Error::AuthenticationRequired),
			RenewOutcome::Failed(_) => Err(Error::AuthenticationRequired),
		};

		match &result {
			Ok(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			Err(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		result
	}

	/// Exchanges the refresh token for a new access token.
	///
	/// Concurrent callers share one exchange; a call made right after an exchange finished is
	/// answered with [`RenewOutcome::TooSoon`]. A failed exchange, network failures included,
	/// clears the session. Renewals are never retried automatically.
	pub async fn renew(&self) -> RenewOutcome {
		const KIND: OpKind = OpKind::Renew;

		let span = OpSpan::new(KIND, "renew");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let flight = span.instrument(self.gate.run(|| self.exchange_refresh_token())).await;
		let outcome = match flight {
			Flight::Led(outcome) => outcome,
			Flight::Joined(outcome) => {
				self.metrics.record_joined();

				outcome
			},
			Flight::TooSoon { retry_in } => {
				self.metrics.record_debounced();
				obs::record_op_outcome(KIND, OpOutcome::Debounced);

				return RenewOutcome::TooSoon { retry_in };
			},
		};

		match &outcome {
			RenewOutcome::Renewed(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			_ => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		outcome
	}

	async fn exchange_refresh_token(&self) -> RenewOutcome {
		self.metrics.record_attempt();

		let started = {
			let mut state = self.state.lock();

			state.last_refresh_attempt_at = Some(self.now());

			match self.store.view(|c| c.refresh_token.clone()) {
				Some(refresh) => {
					if state.phase.is_authenticated() {
						super::set_phase(&mut state, Phase::Refreshing);
					}

					Some((state.epoch, refresh))
				},
				None => None,
			}
		};
		let Some((epoch, refresh)) = started else {
			self.metrics.record_failure();

			return RenewOutcome::Failed(RenewalFailure::MissingRefreshToken);
		};
		let grant = match self.api.refresh_token(&refresh).await {
			Ok(grant) => grant,
			Err(e) => {
				obs::trace_warning(&format!(
					"Token refresh failed for refresh token {}: {e}.",
					refresh.fingerprint()
				));
				self.clear_session(epoch);
				self.metrics.record_failure();

				return RenewOutcome::Failed(RenewalFailure::from_error(&e));
			},
		};
		let access = grant.access_token.clone();
		let patch = CredentialPatch::issued(grant.access_token, self.now())
			.with_refresh_token(grant.refresh_token);

		if !self.transition(epoch, Some(patch), Phase::Refreshing) {
			self.metrics.record_failure();

			return RenewOutcome::Failed(RenewalFailure::Superseded);
		}

		// Re-resolve identity under the new token before declaring the session healthy.
		match self.api.get_profile(Some(&access)).await {
			Ok(user) => {
				self.transition(
					epoch,
					Some(CredentialPatch::default().with_user(user)),
					Phase::Authenticated,
				);
			},
			Err(e) if e.is_session_clearing() => {
				self.clear_session(epoch);
				self.metrics.record_failure();

				return RenewOutcome::Failed(RenewalFailure::from_error(&e));
			},
			Err(e) => {
				obs::trace_warning(&format!(
					"Profile check after refresh failed for access token {}: {e}.",
					access.fingerprint()
				));
				self.transition(epoch, None, Phase::Authenticated);
			},
		}

		if self.epoch() != epoch {
			self.metrics.record_failure();

			return RenewOutcome::Failed(RenewalFailure::Superseded);
		}

		self.metrics.record_success();

		RenewOutcome::Renewed(access)
	}
}
