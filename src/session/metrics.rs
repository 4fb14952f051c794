// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for renewal requests.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	attempts: AtomicU64,
	joined: AtomicU64,
	debounced: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of refresh exchanges actually sent.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of callers that attached to an exchange already in flight.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Returns the number of renewal requests rejected by the debounce window.
	pub fn debounced(&self) -> u64 {
		self.debounced.load(Ordering::Relaxed)
	}

	/// Returns the number of successful refresh exchanges.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed refresh exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_debounced(&self) {
		self.debounced.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}
}
