//! Injectable wall clock used for freshness checks and debounce windows.

// self
use crate::_prelude::*;

/// Source of "now" for the coordinator and its gate.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// [`Clock`] backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Shared clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Returns the default system clock handle.
pub fn system() -> SharedClock {
	Arc::new(SystemClock)
}
