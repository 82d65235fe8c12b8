use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// One-shot completion latch shared between a worker job and its owner.
///
/// The job releases it exactly when it stops touching owner state; the owner
/// may block on it synchronously (no runtime required).
#[derive(Debug, Clone, Default)]
pub struct DoneLatch {
	inner: Arc<(Mutex<bool>, Condvar)>,
}

impl DoneLatch {
	pub fn new() -> Self {
		Self::default()
	}

	/// Marks the latch released and wakes every waiter.
	pub fn release(&self) {
		let (done, cvar) = &*self.inner;
		*done.lock() = true;
		cvar.notify_all();
	}

	pub fn is_released(&self) -> bool {
		*self.inner.0.lock()
	}

	/// Blocks until released or `deadline` passes. Returns whether it was released.
	pub fn wait_until(&self, deadline: Instant) -> bool {
		let (done, cvar) = &*self.inner;
		let mut guard = done.lock();
		while !*guard {
			if cvar.wait_until(&mut guard, deadline).timed_out() {
				return *guard;
			}
		}
		true
	}

	/// Blocks until released or `timeout` elapses.
	pub fn wait_timeout(&self, timeout: Duration) -> bool {
		self.wait_until(Instant::now() + timeout)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wait_returns_after_release_from_other_thread() {
		let latch = DoneLatch::new();
		let remote = latch.clone();
		let t = std::thread::spawn(move || {
			std::thread::sleep(Duration::from_millis(20));
			remote.release();
		});
		assert!(latch.wait_timeout(Duration::from_secs(5)));
		assert!(latch.is_released());
		t.join().unwrap();
	}

	#[test]
	fn wait_times_out_when_never_released() {
		let latch = DoneLatch::new();
		assert!(!latch.wait_timeout(Duration::from_millis(10)));
	}
}
