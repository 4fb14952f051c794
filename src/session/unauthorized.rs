//! Reactive recovery after a request was rejected with `401 Unauthorized`.

// self
use crate::{
	_prelude::*,
	api::AuthApi,
	dispatch::RequestDescriptor,
	obs::{self, OpKind, OpOutcome, OpSpan},
	session::{Coordinator, RenewOutcome, RenewalFailure, UnauthorizedOutcome},
};

impl<A> Coordinator<A>
where
	A: ?Sized + AuthApi,
{
	/// Decides what to do with a request the server rejected as unauthorized.
	///
	/// A first-time rejection renews through the gate and hands back the request marked as a
	/// replay with the new bearer token. A request that already is a replay never gets a
	/// second chance: the session is cleared and [`Error::AuthenticationRequired`] returned.
	/// When the renewal is debounced, or a login replaced the session while it ran, the request
	/// is replayed only if a newer token than the one it was sent with is installed.
	pub async fn on_unauthorized(&self, request: RequestDescriptor) -> UnauthorizedOutcome {
		const KIND: OpKind = OpKind::Unauthorized;

		let span = OpSpan::new(KIND, "on_unauthorized");

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let outcome = span.instrument(self.recover_request(request)).await;

		match &outcome {
			UnauthorizedOutcome::Retry(_) => obs::record_op_outcome(KIND, OpOutcome::Success),
			UnauthorizedOutcome::Fail(_) => obs::record_op_outcome(KIND, OpOutcome::Failure),
		}

		outcome
	}

	async fn recover_request(&self, request: RequestDescriptor) -> UnauthorizedOutcome {
		let epoch = self.epoch();

		if request.is_replay() {
			obs::trace_warning("Replayed request was rejected again; ending the session.");

			return self.give_up(epoch);
		}
		if !self.store.view(|c| c.has_refresh_token()) {
			return self.give_up(epoch);
		}

		match self.renew().await {
			RenewOutcome::Renewed(token) => UnauthorizedOutcome::Retry(request.into_replay(token)),
			RenewOutcome::TooSoon { .. } | RenewOutcome::Failed(RenewalFailure::Superseded) => {
				let current = self.store.view(|c| c.access_token.clone());

				match current {
					Some(current) if request.bearer() != Some(&current) =>
						UnauthorizedOutcome::Retry(request.into_replay(current)),
					_ => self.give_up(epoch),
				}
			},
			RenewOutcome::Failed(_) => UnauthorizedOutcome::Fail(Error::AuthenticationRequired),
		}
	}

	fn give_up(&self, epoch: u64) -> UnauthorizedOutcome {
		self.clear_session(epoch);

		UnauthorizedOutcome::Fail(Error::AuthenticationRequired)
	}
}
