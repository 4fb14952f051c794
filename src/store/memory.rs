//! In-memory [`HintStore`] for single-process hosts and tests.

// self
use crate::{
	_prelude::*,
	store::{HintFuture, HintStore, LoginHint},
};

/// Keeps the login hint in process memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryHintStore(Arc<Mutex<Option<LoginHint>>>);
impl MemoryHintStore {
	/// Returns the marker without consuming it.
	pub fn peek(&self) -> Option<LoginHint> {
		self.0.lock().clone()
	}
}
impl HintStore for MemoryHintStore {
	fn mark_login_completed(&self, hint: LoginHint) -> HintFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			*slot.lock() = Some(hint);

			Ok(())
		})
	}

	fn take_login_completed(&self) -> HintFuture<'_, Option<LoginHint>> {
		let slot = self.0.clone();

		Box::pin(async move { Ok(slot.lock().take()) })
	}

	fn clear(&self) -> HintFuture<'_, ()> {
		let slot = self.0.clone();

		Box::pin(async move {
			slot.lock().take();

			Ok(())
		})
	}
}
