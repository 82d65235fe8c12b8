//! The unit of work: "given source content, produce target contents".

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use kiln_worker::{DoneLatch, GenerationToken, TaskClass, WorkerPool};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{Environment, Issue};

/// Generated bytes keyed by target path.
pub type ContentMap = IndexMap<PathBuf, Vec<u8>>;

/// Deferred source bytes, evaluated on the worker when the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentProvider {
	/// A live buffer snapshot.
	Bytes(Vec<u8>),
	/// A file read at execution time.
	File(PathBuf),
}

impl ContentProvider {
	/// Yields the source bytes, or `None` if the file cannot be read.
	pub async fn load(self) -> Option<Vec<u8>> {
		match self {
			Self::Bytes(bytes) => Some(bytes),
			Self::File(path) => match tokio::fs::read(&path).await {
				Ok(bytes) => Some(bytes),
				Err(error) => {
					tracing::debug!(path = %path.display(), %error, "extra_compiler.provider.unreadable");
					None
				}
			},
		}
	}
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
	/// New target contents; empty means the generation failed.
	pub contents: ContentMap,
	/// Diagnostics, installed whether or not generation succeeded.
	pub issues: Vec<Issue>,
}

impl RunOutput {
	pub fn new(contents: ContentMap) -> Self {
		Self {
			contents,
			issues: Vec::new(),
		}
	}

	pub fn with_issues(mut self, issues: Vec<Issue>) -> Self {
		self.issues = issues;
		self
	}
}

/// Why a run ended without output. Logged, never surfaced as an issue.
#[derive(Debug, Error)]
pub enum RunAbort {
	#[error("no generator command configured")]
	MissingCommand,
	#[error("generator command is not executable: {}", .0.display())]
	NotExecutable(PathBuf),
	#[error("source content unavailable")]
	NoContent,
	#[error("source content rejected by generator")]
	Rejected,
	#[error("failed to start {}: {error}", command.display())]
	Spawn {
		command: PathBuf,
		#[source]
		error: io::Error,
	},
	#[error("failed waiting for generator: {0}")]
	Wait(#[source] io::Error),
	#[error("in-process transform panicked")]
	Panicked,
	#[error("run cancelled")]
	Cancelled,
}

/// Delivered to the owning compiler when a run ends.
#[derive(Debug)]
pub(crate) struct RunCompletion {
	pub(crate) generation: u64,
	pub(crate) outcome: Result<RunOutput, RunAbort>,
}

/// Completion handle carried by a run.
///
/// Exactly one completion reaches the owner: either the one passed to
/// [`RunReply::finish`] or, if the reply is dropped unfinished, a
/// [`RunAbort::Cancelled`]. The owner's teardown latch is released at the
/// same moment.
#[derive(Debug)]
pub struct RunReply {
	generation: u64,
	tx: Option<mpsc::UnboundedSender<RunCompletion>>,
	latch: DoneLatch,
}

impl RunReply {
	pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<RunCompletion>, latch: DoneLatch) -> Self {
		Self {
			generation,
			tx: Some(tx),
			latch,
		}
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn finish(mut self, outcome: Result<RunOutput, RunAbort>) {
		self.send(outcome);
	}

	fn send(&mut self, outcome: Result<RunOutput, RunAbort>) {
		let Some(tx) = self.tx.take() else {
			return;
		};
		let _ = tx.send(RunCompletion {
			generation: self.generation,
			outcome,
		});
		self.latch.release();
	}
}

impl Drop for RunReply {
	fn drop(&mut self) {
		self.send(Err(RunAbort::Cancelled));
	}
}

/// One requested run, handed to a [`Runner`].
#[derive(Debug)]
pub struct RunRequest {
	pub source: PathBuf,
	pub provider: ContentProvider,
	pub environment: Environment,
	/// Cancelled when the run is superseded or its compiler is torn down.
	pub token: GenerationToken,
	pub reply: RunReply,
}

/// Produces target contents from source contents.
///
/// `start` is called on the control thread and must not block: real work
/// belongs on a worker, reporting back through [`RunRequest::reply`].
pub trait Runner: Send + Sync + 'static {
	fn start(&self, request: RunRequest);
}

/// Runner backed by an in-process transform.
///
/// The transform runs on the blocking pool once a [`WorkerPool`] permit is
/// free, so it shares the same concurrency cap as external generators.
pub struct FnRunner<F> {
	pool: WorkerPool,
	transform: Arc<F>,
}

impl<F> FnRunner<F>
where
	F: Fn(&Path, &[u8]) -> RunOutput + Send + Sync + 'static,
{
	pub fn new(pool: WorkerPool, transform: F) -> Self {
		Self {
			pool,
			transform: Arc::new(transform),
		}
	}
}

impl<F> Runner for FnRunner<F>
where
	F: Fn(&Path, &[u8]) -> RunOutput + Send + Sync + 'static,
{
	fn start(&self, request: RunRequest) {
		let RunRequest {
			source,
			provider,
			token,
			reply,
			..
		} = request;
		let transform = Arc::clone(&self.transform);
		let job_token = token.clone();

		self.pool.submit(token, async move {
			let Some(bytes) = provider.load().await else {
				return reply.finish(Err(RunAbort::NoContent));
			};
			if job_token.is_cancelled() {
				return reply.finish(Err(RunAbort::Cancelled));
			}
			let outcome = kiln_worker::spawn_blocking(TaskClass::CpuBlocking, move || transform(&source, &bytes))
				.await
				.map_err(|_| RunAbort::Panicked);
			reply.finish(outcome);
		});
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use kiln_worker::GenerationClock;

	use super::*;

	fn request(provider: ContentProvider) -> (RunRequest, mpsc::UnboundedReceiver<RunCompletion>, DoneLatch) {
		let (tx, rx) = mpsc::unbounded_channel();
		let latch = DoneLatch::new();
		let token = GenerationClock::new().issue();
		let reply = RunReply::new(token.generation(), tx, latch.clone());
		let request = RunRequest {
			source: PathBuf::from("in.txt"),
			provider,
			environment: Environment::new(),
			token,
			reply,
		};
		(request, rx, latch)
	}

	#[test]
	fn dropped_reply_reports_cancelled_and_releases_latch() {
		let (request, mut rx, latch) = request(ContentProvider::Bytes(Vec::new()));
		drop(request);
		let completion = rx.try_recv().unwrap();
		assert!(matches!(completion.outcome, Err(RunAbort::Cancelled)));
		assert!(latch.is_released());
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn finish_sends_exactly_one_completion() {
		let (request, mut rx, _latch) = request(ContentProvider::Bytes(Vec::new()));
		request.reply.finish(Ok(RunOutput::default()));
		assert!(rx.try_recv().unwrap().outcome.is_ok());
		assert!(rx.try_recv().is_err());
	}

	#[test]
	fn fn_runner_transforms_on_worker() {
		let pool = WorkerPool::new(TaskClass::Generator, 1);
		let runner = FnRunner::new(pool, |source: &Path, bytes: &[u8]| {
			RunOutput::new(ContentMap::from([(source.with_extension("out"), bytes.to_ascii_uppercase())]))
		});
		let (request, mut rx, latch) = request(ContentProvider::Bytes(b"abc".to_vec()));
		runner.start(request);

		assert!(latch.wait_timeout(Duration::from_secs(5)));
		let output = rx.try_recv().unwrap().outcome.unwrap();
		assert_eq!(output.contents[&PathBuf::from("in.out")], b"ABC".to_vec());
	}

	#[test]
	fn unreadable_file_yields_no_content() {
		let dir = tempfile::tempdir().unwrap();
		let pool = WorkerPool::new(TaskClass::Generator, 1);
		let runner = FnRunner::new(pool, |_: &Path, _: &[u8]| RunOutput::default());
		let (request, mut rx, latch) = request(ContentProvider::File(dir.path().join("missing.txt")));
		runner.start(request);

		assert!(latch.wait_timeout(Duration::from_secs(5)));
		assert!(matches!(rx.try_recv().unwrap().outcome, Err(RunAbort::NoContent)));
	}
}
