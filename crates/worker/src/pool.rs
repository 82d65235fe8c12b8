use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::{GenerationToken, TaskClass, spawn};

/// Bounded pool shared by every generator run in the process.
///
/// Submissions are spawned immediately but only start once a permit is free,
/// so a burst of stale sources queues up behind `capacity` concurrent runs.
#[derive(Debug, Clone)]
pub struct WorkerPool {
	class: TaskClass,
	capacity: usize,
	permits: Arc<Semaphore>,
}

impl WorkerPool {
	/// Creates a pool admitting at most `capacity` concurrent jobs (minimum 1).
	pub fn new(class: TaskClass, capacity: usize) -> Self {
		let capacity = capacity.max(1);
		Self {
			class,
			capacity,
			permits: Arc::new(Semaphore::new(capacity)),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Returns the number of idle slots.
	pub fn available(&self) -> usize {
		self.permits.available_permits()
	}

	/// Queues `fut` behind a pool permit.
	///
	/// If `token` is cancelled while the job is still queued, `fut` is dropped
	/// without being polled and the handle resolves to `None`.
	pub fn submit<F>(&self, token: GenerationToken, fut: F) -> JoinHandle<Option<F::Output>>
	where
		F: Future + Send + 'static,
		F::Output: Send + 'static,
	{
		let permits = Arc::clone(&self.permits);
		tracing::trace!(
			worker_class = self.class.as_str(),
			generation = token.generation(),
			available = permits.available_permits(),
			"worker.pool.submit"
		);
		spawn(self.class, async move {
			let permit = tokio::select! {
				biased;
				_ = token.cancelled() => return None,
				permit = permits.acquire_owned() => permit.ok()?,
			};
			let _permit = permit;
			Some(fut.await)
		})
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use super::*;
	use crate::{GenerationClock, runtime_handle};

	#[test]
	fn capacity_bounds_concurrent_jobs() {
		let pool = WorkerPool::new(TaskClass::Generator, 2);
		let clock = GenerationClock::new();
		let running = Arc::new(AtomicUsize::new(0));
		let peak = Arc::new(AtomicUsize::new(0));

		let handles: Vec<_> = (0..6)
			.map(|_| {
				let running = Arc::clone(&running);
				let peak = Arc::clone(&peak);
				pool.submit(clock.issue(), async move {
					let now = running.fetch_add(1, Ordering::SeqCst) + 1;
					peak.fetch_max(now, Ordering::SeqCst);
					tokio::time::sleep(Duration::from_millis(20)).await;
					running.fetch_sub(1, Ordering::SeqCst);
				})
			})
			.collect();

		for handle in handles {
			assert_eq!(runtime_handle().block_on(handle).unwrap(), Some(()));
		}
		assert!(peak.load(Ordering::SeqCst) <= 2);
		assert_eq!(pool.available(), 2);
	}

	#[test]
	fn cancelled_while_queued_never_runs() {
		let pool = WorkerPool::new(TaskClass::Generator, 1);
		let clock = GenerationClock::new();
		let gate = Arc::new(tokio::sync::Notify::new());

		let blocker = {
			let gate = Arc::clone(&gate);
			pool.submit(clock.issue(), async move { gate.notified().await })
		};
		while pool.available() > 0 {
			std::thread::sleep(Duration::from_millis(1));
		}

		let ran = Arc::new(AtomicUsize::new(0));
		let queued_token = clock.issue();
		let queued = {
			let ran = Arc::clone(&ran);
			pool.submit(queued_token.clone(), async move {
				ran.fetch_add(1, Ordering::SeqCst);
			})
		};

		queued_token.cancel();
		assert_eq!(runtime_handle().block_on(queued).unwrap(), None);
		gate.notify_one();
		assert_eq!(runtime_handle().block_on(blocker).unwrap(), Some(()));
		assert_eq!(ran.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn zero_capacity_is_clamped() {
		assert_eq!(WorkerPool::new(TaskClass::Generator, 0).capacity(), 1);
	}
}
