use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;

/// Issues run tokens with strictly increasing generation numbers.
///
/// A completion carrying anything but the newest generation is stale.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
	last: Arc<AtomicU64>,
}

impl GenerationClock {
	pub fn new() -> Self {
		Self::default()
	}

	/// Most recently issued generation, 0 before the first [`Self::issue`].
	pub fn current(&self) -> u64 {
		self.last.load(Ordering::Acquire)
	}

	/// Starts a new generation and returns its live token.
	pub fn issue(&self) -> GenerationToken {
		let generation = self.last.fetch_add(1, Ordering::AcqRel) + 1;
		GenerationToken {
			generation,
			cancel: CancellationToken::new(),
		}
	}
}

/// Cancellation handle for one run, stamped with its generation.
///
/// Clones share the cancellation state: the owner keeps one to cancel on
/// supersede or teardown, the worker polls another.
#[derive(Debug, Clone)]
pub struct GenerationToken {
	generation: u64,
	cancel: CancellationToken,
}

impl GenerationToken {
	pub const fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	/// Resolves once [`Self::cancel`] has been called on any clone.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
