//! Runner that shells out to an external generator.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use kiln_worker::{GenerationToken, TaskClass, WorkerPool};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::runner::{ContentMap, RunAbort, RunOutput, RunRequest, Runner};
use crate::{Environment, Issue};

/// Captured result of a generator process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
	pub status: ExitStatus,
	pub stdout: Vec<u8>,
	pub stderr: Vec<u8>,
}

/// Describes how to invoke one external generator and read its results.
///
/// Invocation details (`command`, `working_directory`, `arguments`) are
/// resolved on the control thread when a run is requested; every other hook
/// runs on a worker.
pub trait ProcessGenerator: Send + Sync + 'static {
	/// Executable to run. `None` or a non-executable path disables runs.
	fn command(&self) -> Option<PathBuf>;

	fn working_directory(&self) -> Option<PathBuf> {
		None
	}

	fn arguments(&self) -> Vec<OsString> {
		Vec::new()
	}

	/// Validates (and may stage) the source before spawning; `false` aborts the run.
	fn prepare_to_run(&self, _source: &[u8]) -> bool {
		true
	}

	/// Bytes to stream to the child's stdin once it started; stdin is closed afterwards.
	fn started_input(&self, _source: &[u8]) -> Option<Vec<u8>> {
		None
	}

	fn handle_start_failure(&self, _error: &io::Error) {}

	/// Maps process output to target contents; empty means the generation failed.
	fn parse_result(&self, output: &ProcessOutput) -> ContentMap;

	fn parse_issues(&self, _stderr: &[u8]) -> Vec<Issue> {
		Vec::new()
	}
}

/// [`Runner`] executing a [`ProcessGenerator`] on the shared pool.
pub struct ProcessRunner<G> {
	generator: Arc<G>,
	pool: WorkerPool,
	poll_interval: Duration,
}

impl<G: ProcessGenerator> ProcessRunner<G> {
	pub fn new(generator: G, pool: WorkerPool, poll_interval: Duration) -> Self {
		Self {
			generator: Arc::new(generator),
			pool,
			poll_interval,
		}
	}

	pub fn generator(&self) -> &G {
		&self.generator
	}
}

struct Invocation {
	command: Option<PathBuf>,
	working_directory: Option<PathBuf>,
	arguments: Vec<OsString>,
	environment: Environment,
}

impl<G: ProcessGenerator> Runner for ProcessRunner<G> {
	fn start(&self, request: RunRequest) {
		let RunRequest {
			source,
			provider,
			environment,
			token,
			reply,
		} = request;
		let invocation = Invocation {
			command: self.generator.command(),
			working_directory: self.generator.working_directory(),
			arguments: self.generator.arguments(),
			environment,
		};
		let generator = Arc::clone(&self.generator);
		let poll_interval = self.poll_interval;
		let job_token = token.clone();

		self.pool.submit(token, async move {
			let generation = job_token.generation();
			let outcome = run_process(&*generator, invocation, provider.load(), &job_token, poll_interval).await;
			match &outcome {
				Ok(output) => tracing::debug!(
					source = %source.display(),
					generation,
					targets = output.contents.len(),
					issues = output.issues.len(),
					"extra_compiler.process.finished"
				),
				Err(abort @ (RunAbort::MissingCommand | RunAbort::NotExecutable(_))) => {
					tracing::info!(source = %source.display(), generation, %abort, "extra_compiler.process.misconfigured")
				}
				Err(abort @ RunAbort::Spawn { .. }) => tracing::warn!(source = %source.display(), generation, %abort, "extra_compiler.process.spawn_failed"),
				Err(abort) => tracing::debug!(source = %source.display(), generation, %abort, "extra_compiler.process.aborted"),
			}
			reply.finish(outcome);
		});
	}
}

async fn run_process<G: ProcessGenerator>(
	generator: &G,
	invocation: Invocation,
	source: impl Future<Output = Option<Vec<u8>>>,
	token: &GenerationToken,
	poll_interval: Duration,
) -> Result<RunOutput, RunAbort> {
	let command = invocation
		.command
		.filter(|command| !command.as_os_str().is_empty())
		.ok_or(RunAbort::MissingCommand)?;
	if !is_executable(&command).await {
		return Err(RunAbort::NotExecutable(command));
	}

	let source = source.await.ok_or(RunAbort::NoContent)?;
	if !generator.prepare_to_run(&source) {
		return Err(RunAbort::Rejected);
	}

	let mut cmd = Command::new(&command);
	cmd.args(&invocation.arguments)
		.env_clear()
		.envs(invocation.environment.iter())
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.kill_on_drop(true);
	if let Some(dir) = &invocation.working_directory {
		cmd.current_dir(dir);
	}

	let mut child = match cmd.spawn() {
		Ok(child) => child,
		Err(error) => {
			generator.handle_start_failure(&error);
			return Err(RunAbort::Spawn { command, error });
		}
	};

	let mut drains = Drains {
		stdout: child.stdout.take().map(drain),
		stderr: child.stderr.take().map(drain),
	};
	let stdin = child.stdin.take();

	if token.is_cancelled() {
		return Err(terminate(&mut child).await);
	}

	if let (Some(mut pipe), Some(input)) = (stdin, generator.started_input(&source)) {
		kiln_worker::spawn(TaskClass::Io, async move {
			let _ = pipe.write_all(&input).await;
			let _ = pipe.shutdown().await;
		});
	}

	let status = loop {
		match tokio::time::timeout(poll_interval, child.wait()).await {
			Ok(Ok(status)) => break status,
			Ok(Err(error)) => {
				terminate(&mut child).await;
				return Err(RunAbort::Wait(error));
			}
			Err(_elapsed) if token.is_cancelled() => return Err(terminate(&mut child).await),
			Err(_elapsed) => {}
		}
	};
	if token.is_cancelled() {
		return Err(RunAbort::Cancelled);
	}

	// Descendants of the child may still hold the pipes open after it exited.
	let (stdout, stderr) = tokio::select! {
		biased;
		_ = token.cancelled() => return Err(RunAbort::Cancelled),
		output = drains.collect() => output,
	};
	let output = ProcessOutput { status, stdout, stderr };
	let issues = generator.parse_issues(&output.stderr);
	Ok(RunOutput::new(generator.parse_result(&output)).with_issues(issues))
}

fn drain<R>(mut pipe: R) -> JoinHandle<Vec<u8>>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	kiln_worker::spawn(TaskClass::Io, async move {
		let mut buf = Vec::new();
		let _ = pipe.read_to_end(&mut buf).await;
		buf
	})
}

/// Readers for the child's output pipes; dropping aborts whatever is still reading.
struct Drains {
	stdout: Option<JoinHandle<Vec<u8>>>,
	stderr: Option<JoinHandle<Vec<u8>>>,
}

impl Drains {
	async fn collect(&mut self) -> (Vec<u8>, Vec<u8>) {
		(join(&mut self.stdout).await, join(&mut self.stderr).await)
	}
}

impl Drop for Drains {
	fn drop(&mut self) {
		for handle in self.stdout.iter().chain(self.stderr.iter()) {
			handle.abort();
		}
	}
}

async fn join(pipe: &mut Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
	let Some(handle) = pipe.as_mut() else {
		return Vec::new();
	};
	let bytes = handle.await.unwrap_or_default();
	*pipe = None;
	bytes
}

/// Kills and reaps `child`.
async fn terminate(child: &mut Child) -> RunAbort {
	if let Err(error) = child.kill().await {
		tracing::debug!(%error, "extra_compiler.process.kill_failed");
	}
	RunAbort::Cancelled
}

#[cfg(unix)]
async fn is_executable(path: &Path) -> bool {
	use std::os::unix::fs::PermissionsExt;

	tokio::fs::metadata(path)
		.await
		.is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
async fn is_executable(path: &Path) -> bool {
	tokio::fs::metadata(path).await.is_ok_and(|meta| meta.is_file())
}
