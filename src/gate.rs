//! Single-flight gate with a post-completion debounce window.
//!
//! [`SingleFlightGate::run`] collapses concurrent callers into one underlying operation and
//! fans its result out to everyone attached. Once an operation finishes, further calls are
//! rejected with [`Flight::TooSoon`] until the debounce window has elapsed. The two guards are
//! independent: single-flight stops duplicate concurrent work, debounce stops rapid sequential
//! work such as a second `401` arriving 200 ms after the first renewal already finished.
//!
//! Each flight is an [`OnceCell`] shared by every attached caller. The caller whose initializer
//! runs is the leader; if the leader is dropped mid-operation the cell stays empty and the next
//! waiting caller runs its own operation instead, so waiters never hang.

// self
use crate::{_prelude::*, clock::SharedClock};

/// How a call through the gate was resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flight<T> {
	/// This caller ran the operation.
	Led(T),
	/// This caller attached to an operation already in flight and received its outcome.
	Joined(T),
	/// The previous operation finished less than the debounce window ago; nothing was issued.
	TooSoon {
		/// Time left in the debounce window.
		retry_in: Duration,
	},
}

type FlightCell<T> = Arc<OnceCell<T>>;

struct GateState<T> {
	flight: Option<FlightCell<T>>,
	completed_at: Option<OffsetDateTime>,
}

/// Collapses concurrent calls into one operation and debounces sequential ones.
pub struct SingleFlightGate<T> {
	debounce: Duration,
	clock: SharedClock,
	state: Mutex<GateState<T>>,
}
impl<T> SingleFlightGate<T>
where
	T: Clone + Send + Sync,
{
	/// Creates a gate with the given debounce window; zero disables debouncing.
	pub fn new(debounce: Duration, clock: SharedClock) -> Self {
		Self {
			debounce: debounce.max(Duration::ZERO),
			clock,
			state: Mutex::new(GateState { flight: None, completed_at: None }),
		}
	}

	/// Runs `op` unless an operation is already in flight (join it) or the previous one
	/// finished inside the debounce window (reject).
	///
	/// `op` is only invoked when this caller ends up leading the flight.
	pub async fn run<F, Fut>(&self, op: F) -> Flight<T>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		let cell = {
			let mut state = self.state.lock();

			match &state.flight {
				Some(cell) => cell.clone(),
				None => {
					if let Some(retry_in) = self.debounce_remaining(&state) {
						return Flight::TooSoon { retry_in };
					}

					let cell = <FlightCell<T>>::default();

					state.flight = Some(cell.clone());

					cell
				},
			}
		};
		let mut led = false;
		let value = cell
			.get_or_init(|| {
				led = true;

				let finished = cell.clone();

				async move {
					let value = op().await;

					self.finish(&finished);

					value
				}
			})
			.await
			.clone();

		if led { Flight::Led(value) } else { Flight::Joined(value) }
	}

	/// Clears the debounce stamp and detaches any in-flight operation.
	///
	/// Callers already attached to the detached flight still receive its outcome, but it no
	/// longer stamps the debounce window when it completes.
	pub fn reset(&self) {
		let mut state = self.state.lock();

		state.flight = None;
		state.completed_at = None;
	}

	/// Returns `true` while an operation is in flight.
	pub fn is_in_flight(&self) -> bool {
		self.state.lock().flight.is_some()
	}

	/// Instant the last attached operation completed.
	pub fn completed_at(&self) -> Option<OffsetDateTime> {
		self.state.lock().completed_at
	}

	fn finish(&self, cell: &FlightCell<T>) {
		let mut state = self.state.lock();

		if state.flight.as_ref().is_some_and(|current| Arc::ptr_eq(current, cell)) {
			state.flight = None;
			state.completed_at = Some(self.clock.now());
		}
	}

	fn debounce_remaining(&self, state: &GateState<T>) -> Option<Duration> {
		let completed_at = state.completed_at?;
		let remaining = completed_at + self.debounce - self.clock.now();

		remaining.is_positive().then_some(remaining)
	}
}
impl<T> Debug for SingleFlightGate<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("SingleFlightGate")
			.field("debounce", &self.debounce)
			.field("in_flight", &state.flight.is_some())
			.field("completed_at", &state.completed_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::_preludet::ManualClock;

	fn gate(debounce_ms: i64) -> (SingleFlightGate<u32>, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::default());

		(SingleFlightGate::new(Duration::milliseconds(debounce_ms), clock.clone()), clock)
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_operation() {
		let (gate, _clock) = gate(1_000);
		let calls = AtomicUsize::new(0);
		let hold = AsyncRwLock::new(());
		let guard = hold.write().await;
		let (calls_ref, hold_ref) = (&calls, &hold);
		let op = move || async move {
			calls_ref.fetch_add(1, Ordering::SeqCst);

			let _held = hold_ref.read().await;

			7
		};
		let release = async {
			for _ in 0..8 {
				tokio::task::yield_now().await;
			}

			drop(guard);
		};
		let (a, b, c, d, ()) =
			tokio::join!(gate.run(op), gate.run(op), gate.run(op), gate.run(op), release);

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(a, Flight::Led(7));

		for joined in [b, c, d] {
			assert_eq!(joined, Flight::Joined(7));
		}

		assert!(!gate.is_in_flight());
	}

	#[tokio::test]
	async fn sequential_calls_inside_window_are_rejected() {
		let (gate, clock) = gate(1_000);

		assert_eq!(gate.run(|| async { 1 }).await, Flight::Led(1));

		clock.advance_ms(200);

		assert_eq!(
			gate.run(|| async { 2 }).await,
			Flight::TooSoon { retry_in: Duration::milliseconds(800) }
		);

		clock.advance_ms(800);

		assert_eq!(gate.run(|| async { 3 }).await, Flight::Led(3));
	}

	#[tokio::test]
	async fn reset_clears_debounce() {
		let (gate, _clock) = gate(1_000);

		gate.run(|| async { 1 }).await;

		assert!(matches!(gate.run(|| async { 2 }).await, Flight::TooSoon { .. }));

		gate.reset();

		assert_eq!(gate.run(|| async { 3 }).await, Flight::Led(3));
	}

	#[tokio::test]
	async fn zero_debounce_only_guards_concurrency() {
		let (gate, _clock) = gate(0);

		assert_eq!(gate.run(|| async { 1 }).await, Flight::Led(1));
		assert_eq!(gate.run(|| async { 2 }).await, Flight::Led(2));
	}

	#[tokio::test]
	async fn detached_flight_does_not_stamp_debounce() {
		let (gate, _clock) = gate(1_000);
		let hold = AsyncRwLock::new(());
		let guard = hold.write().await;
		let hold_ref = &hold;
		let op = move || async move {
			let _held = hold_ref.read().await;

			1
		};
		let reset_then_release = async {
			tokio::task::yield_now().await;
			gate.reset();
			drop(guard);
		};
		let (first, ()) = tokio::join!(gate.run(op), reset_then_release);

		assert_eq!(first, Flight::Led(1));
		assert_eq!(gate.completed_at(), None);
		assert_eq!(gate.run(|| async { 2 }).await, Flight::Led(2));
	}

	#[tokio::test]
	async fn dropped_leader_hands_over_to_waiter() {
		let (gate, _clock) = gate(0);
		let hold = AsyncRwLock::new(());
		let guard = hold.write().await;
		let hold_ref = &hold;
		let stalled = move || async move {
			let _held = hold_ref.read().await;

			1
		};

		{
			let leader = gate.run(stalled);
			let mut leader = std::pin::pin!(leader);

			assert!(poll_briefly(leader.as_mut()).await.is_none());
		}

		drop(guard);

		assert_eq!(gate.run(|| async { 2 }).await, Flight::Led(2));
	}

	async fn poll_briefly<F>(fut: Pin<&mut F>) -> Option<F::Output>
	where
		F: Future,
	{
		tokio::time::timeout(std::time::Duration::from_millis(10), fut).await.ok()
	}
}
