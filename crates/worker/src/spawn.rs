use std::future::Future;
use std::sync::OnceLock;

use tokio::task::JoinHandle;

use crate::TaskClass;

/// Returns the handle of the shared worker runtime.
///
/// Work never lands on the caller's runtime. The control thread blocks on
/// [`crate::DoneLatch`] during teardown, which would stall a current-thread
/// runtime that also had to drive the job being waited on.
pub fn runtime_handle() -> tokio::runtime::Handle {
	static GLOBAL_RT: OnceLock<tokio::runtime::Runtime> = OnceLock::new();
	let runtime = GLOBAL_RT.get_or_init(|| {
		tokio::runtime::Builder::new_multi_thread()
			.enable_all()
			.worker_threads(2)
			.thread_name("kiln-worker")
			.build()
			.expect("failed to build kiln-worker tokio runtime")
	});
	runtime.handle().clone()
}

/// Spawns an async task with shared worker classification metadata.
pub fn spawn<F>(class: TaskClass, fut: F) -> JoinHandle<F::Output>
where
	F: Future + Send + 'static,
	F::Output: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn");
	runtime_handle().spawn(fut)
}

/// Spawns blocking work with shared worker classification metadata.
pub fn spawn_blocking<F, R>(class: TaskClass, f: F) -> JoinHandle<R>
where
	F: FnOnce() -> R + Send + 'static,
	R: Send + 'static,
{
	tracing::trace!(worker_class = class.as_str(), "worker.spawn_blocking");
	runtime_handle().spawn_blocking(f)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spawn_runs_on_worker_runtime_from_plain_thread() {
		let handle = spawn(TaskClass::Io, async { 21 * 2 });
		assert_eq!(runtime_handle().block_on(handle).unwrap(), 42);
	}

	#[test]
	fn spawn_blocking_returns_value() {
		let handle = spawn_blocking(TaskClass::CpuBlocking, || "done");
		assert_eq!(runtime_handle().block_on(handle).unwrap(), "done");
	}
}
