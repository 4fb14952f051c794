//! Client-side session credential coordinator: single-flight token renewal, proactive freshness
//! checks, and replay-once recovery from `401 Unauthorized` responses.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod http;
pub mod obs;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		api::{ApiFuture, AuthApi, LoginGrant, LoginRequest, RefreshGrant},
		auth::{Role, TokenSecret, UserId, UserSnapshot},
		clock::Clock,
		config::SessionPolicy,
		session::Coordinator,
		store::{HintStore, MemoryHintStore},
	};

	/// Test clock that only moves when told to.
	#[derive(Debug)]
	pub struct ManualClock(Mutex<OffsetDateTime>);
	impl ManualClock {
		/// Creates a clock frozen at `start`.
		pub fn new(start: OffsetDateTime) -> Self {
			Self(Mutex::new(start))
		}

		/// Moves the clock forward.
		pub fn advance(&self, by: Duration) {
			*self.0.lock() += by;
		}

		/// Moves the clock forward by whole milliseconds.
		pub fn advance_ms(&self, ms: i64) {
			self.advance(Duration::milliseconds(ms));
		}
	}
	impl Default for ManualClock {
		fn default() -> Self {
			Self::new(time::macros::datetime!(2025-01-01 00:00 UTC))
		}
	}
	impl Clock for ManualClock {
		fn now(&self) -> OffsetDateTime {
			*self.0.lock()
		}
	}

	/// Scripted failure a [`ScriptedAuthApi`] call can be told to return.
	#[derive(Clone, Copy, Debug, PartialEq, Eq)]
	pub enum Scripted {
		/// `401`-class rejection.
		Unauthorized,
		/// `5xx`-class upstream failure.
		ServerError,
		/// Network failure before any response.
		Network,
		/// Login rejected the supplied secret.
		BadSecret,
	}
	impl Scripted {
		fn into_error(self) -> Error {
			match self {
				Self::Unauthorized => Error::Unauthorized { reason: "scripted 401".into() },
				Self::ServerError => crate::error::TransientError::Upstream {
					message: "scripted 503".into(),
					status: Some(503),
					retry_after: None,
				}
				.into(),
				Self::Network => crate::error::TransportError::network(std::io::Error::new(
					std::io::ErrorKind::ConnectionReset,
					"scripted reset",
				))
				.into(),
				Self::BadSecret => Error::InvalidCredentials { reason: "scripted bad secret".into() },
			}
		}
	}

	/// In-process [`AuthApi`] with call counters, scripted failures, and hold switches that
	/// park login or refresh calls until released.
	#[derive(Debug, Default)]
	pub struct ScriptedAuthApi {
		login_calls: AtomicUsize,
		refresh_calls: AtomicUsize,
		logout_calls: AtomicUsize,
		profile_calls: AtomicUsize,
		refresh_failures: Mutex<VecDeque<Scripted>>,
		profile_failures: Mutex<VecDeque<Scripted>>,
		login_failures: Mutex<VecDeque<Scripted>>,
		rotate_refresh: parking_lot::RwLock<bool>,
		refresh_hold: AsyncRwLock<()>,
		login_hold: AsyncRwLock<()>,
		user: Mutex<Option<UserSnapshot>>,
	}
	impl ScriptedAuthApi {
		/// Queues a failure for the next refresh call.
		pub fn fail_next_refresh(&self, failure: Scripted) {
			self.refresh_failures.lock().push_back(failure);
		}

		/// Queues a failure for the next profile call.
		pub fn fail_next_profile(&self, failure: Scripted) {
			self.profile_failures.lock().push_back(failure);
		}

		/// Queues a failure for the next login call.
		pub fn fail_next_login(&self, failure: Scripted) {
			self.login_failures.lock().push_back(failure);
		}

		/// Makes refresh responses carry a rotated refresh token.
		pub fn rotate_refresh_tokens(&self, rotate: bool) {
			*self.rotate_refresh.write() = rotate;
		}

		/// Overrides the identity returned by profile and login calls.
		pub fn set_user(&self, user: UserSnapshot) {
			*self.user.lock() = Some(user);
		}

		/// Parks every refresh call until the returned guard is dropped.
		pub async fn hold_refresh(&self) -> async_lock::RwLockWriteGuard<'_, ()> {
			self.refresh_hold.write().await
		}

		/// Parks every login call until the returned guard is dropped.
		pub async fn hold_login(&self) -> async_lock::RwLockWriteGuard<'_, ()> {
			self.login_hold.write().await
		}

		/// Number of login calls observed.
		pub fn login_calls(&self) -> usize {
			self.login_calls.load(Ordering::SeqCst)
		}

		/// Number of refresh calls observed.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.load(Ordering::SeqCst)
		}

		/// Number of logout calls observed.
		pub fn logout_calls(&self) -> usize {
			self.logout_calls.load(Ordering::SeqCst)
		}

		/// Number of profile calls observed.
		pub fn profile_calls(&self) -> usize {
			self.profile_calls.load(Ordering::SeqCst)
		}

		fn current_user(&self) -> UserSnapshot {
			self.user.lock().clone().unwrap_or_else(demo_user)
		}
	}
	impl AuthApi for ScriptedAuthApi {
		fn login<'a>(&'a self, _request: &'a LoginRequest) -> ApiFuture<'a, LoginGrant> {
			Box::pin(async move {
				let n = self.login_calls.fetch_add(1, Ordering::SeqCst) + 1;
				let _held = self.login_hold.read().await;

				if let Some(failure) = self.login_failures.lock().pop_front() {
					return Err(failure.into_error());
				}

				Ok(LoginGrant {
					access_token: TokenSecret::new(format!("access-login-{n}")),
					refresh_token: TokenSecret::new(format!("refresh-login-{n}")),
					user: self.current_user(),
				})
			})
		}

		fn refresh_token<'a>(&'a self, refresh: &'a TokenSecret) -> ApiFuture<'a, RefreshGrant> {
			Box::pin(async move {
				let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
				let _held = self.refresh_hold.read().await;

				if let Some(failure) = self.refresh_failures.lock().pop_front() {
					return Err(failure.into_error());
				}

				let rotated = (*self.rotate_refresh.read())
					.then(|| TokenSecret::new(format!("{}-r{n}", refresh.expose())));

				Ok(RefreshGrant {
					access_token: TokenSecret::new(format!("access-refresh-{n}")),
					refresh_token: rotated,
				})
			})
		}

		fn logout<'a>(&'a self, _refresh: Option<&'a TokenSecret>) -> ApiFuture<'a, ()> {
			Box::pin(async move {
				self.logout_calls.fetch_add(1, Ordering::SeqCst);

				Ok(())
			})
		}

		fn get_profile<'a>(
			&'a self,
			access: Option<&'a TokenSecret>,
		) -> ApiFuture<'a, UserSnapshot> {
			Box::pin(async move {
				self.profile_calls.fetch_add(1, Ordering::SeqCst);

				if let Some(failure) = self.profile_failures.lock().pop_front() {
					return Err(failure.into_error());
				}
				if access.is_none() {
					return Err(Error::Unauthorized { reason: "no bearer token".into() });
				}

				Ok(self.current_user())
			})
		}
	}

	/// Buyer identity used by scripted fixtures.
	pub fn demo_user() -> UserSnapshot {
		UserSnapshot {
			id: UserId::new("user-1").expect("Demo user identifier should be valid."),
			name: "Demo Buyer".into(),
			email: "buyer@example.com".into(),
			role: Role::Buyer,
		}
	}

	/// Test coordinator type backed by the scripted API.
	pub type TestCoordinator = Coordinator<ScriptedAuthApi>;

	/// Builds a coordinator with default policy, a manual clock, and an in-memory hint store.
	pub fn build_test_coordinator() -> (Arc<TestCoordinator>, Arc<ScriptedAuthApi>, Arc<ManualClock>)
	{
		build_test_coordinator_with(SessionPolicy::default(), Arc::new(MemoryHintStore::default()))
	}

	/// Same as [`build_test_coordinator`] with a caller-provided policy and hint store.
	pub fn build_test_coordinator_with(
		policy: SessionPolicy,
		hints: Arc<dyn HintStore>,
	) -> (Arc<TestCoordinator>, Arc<ScriptedAuthApi>, Arc<ManualClock>) {
		let api = Arc::new(ScriptedAuthApi::default());
		let clock = Arc::new(ManualClock::default());
		let coordinator = Coordinator::builder(api.clone())
			.policy(policy)
			.clock(clock.clone())
			.hint_store(hints)
			.build();

		(Arc::new(coordinator), api, clock)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::{OnceCell, RwLock as AsyncRwLock};
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
