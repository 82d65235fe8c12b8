use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use kiln_worker::{DoneLatch, GenerationClock, GenerationToken, WorkerPool};
use tokio::sync::mpsc;

use crate::content::ContentStore;
use crate::editor::{Editor, EditorBridge, EditorId};
use crate::runner::{ContentProvider, RunAbort, RunCompletion, RunOutput, RunReply, RunRequest, Runner};
use crate::staleness::{self, Watermark};
use crate::{Environment, ExtraCompilerConfig, Issue, Project, ProjectId};

/// Shared collaborators handed to every extra compiler a factory creates.
#[derive(Clone)]
pub struct CompilerContext {
	pub project: Arc<dyn Project>,
	pub config: ExtraCompilerConfig,
	/// Process-wide pool shared by all generator runs.
	pub pool: WorkerPool,
}

impl CompilerContext {
	pub fn new(project: Arc<dyn Project>, config: ExtraCompilerConfig, pool: WorkerPool) -> Self {
		Self { project, config, pool }
	}
}

/// A run that may still be executing on a worker.
struct TrackedRun {
	token: GenerationToken,
	latch: DoneLatch,
}

/// Keeps the targets derived from one source file up to date.
///
/// Owned by the control thread. Runs are handed to a [`Runner`]; at most one
/// is tracked as active, and requesting another cancels the previous one and
/// discards its result should it still arrive.
pub struct ExtraCompiler {
	project: Arc<dyn Project>,
	source: PathBuf,
	contents: ContentStore,
	issues: Vec<Issue>,
	compile_time: Watermark,
	editor: EditorBridge,
	initial_run_pending: bool,
	runner: Box<dyn Runner>,
	clock: GenerationClock,
	active: Option<TrackedRun>,
	superseded: Vec<TrackedRun>,
	completion_tx: mpsc::UnboundedSender<RunCompletion>,
	completion_rx: mpsc::UnboundedReceiver<RunCompletion>,
	teardown_timeout: Duration,
}

impl ExtraCompiler {
	/// Creates an instance and inspects existing targets on disk.
	///
	/// Present targets are loaded into the cache. If any target is missing or
	/// older than the source, a run against the source file is deferred to
	/// the next [`Self::tick`].
	pub fn new(ctx: CompilerContext, source: impl Into<PathBuf>, targets: impl IntoIterator<Item = PathBuf>, runner: impl Runner) -> Self {
		let source = source.into();
		let mut contents = ContentStore::new(targets);
		let scan = staleness::scan_targets(&source, contents.targets());
		for (target, bytes) in scan.loaded {
			contents.load(&target, bytes);
		}

		tracing::debug!(
			source = %source.display(),
			targets = contents.len(),
			dirty = scan.dirty,
			"extra_compiler.created"
		);

		let (completion_tx, completion_rx) = mpsc::unbounded_channel();
		Self {
			project: ctx.project,
			editor: EditorBridge::new(source.clone(), ctx.config.debounce()),
			source,
			contents,
			issues: Vec::new(),
			compile_time: scan.watermark,
			initial_run_pending: scan.dirty,
			runner: Box::new(runner),
			clock: GenerationClock::new(),
			active: None,
			superseded: Vec::new(),
			completion_tx,
			completion_rx,
			teardown_timeout: ctx.config.teardown_timeout(),
		}
	}

	pub fn project(&self) -> &Arc<dyn Project> {
		&self.project
	}

	pub fn project_id(&self) -> ProjectId {
		self.project.id()
	}

	pub fn source(&self) -> &Path {
		&self.source
	}

	/// Cached bytes for `target`; empty if never produced or undeclared.
	pub fn content(&self, target: &Path) -> &[u8] {
		self.contents.get(target)
	}

	pub fn targets(&self) -> impl Iterator<Item = &Path> {
		self.contents.targets()
	}

	pub fn for_each_target(&self, f: impl FnMut(&Path)) {
		self.contents.for_each_target(f);
	}

	pub fn has_target(&self, target: &Path) -> bool {
		self.contents.contains(target)
	}

	/// The generation watermark.
	pub fn compile_time(&self) -> Option<SystemTime> {
		self.compile_time.get()
	}

	/// Overwrites the watermark; an earlier `time` moves it backwards.
	pub fn set_compile_time(&mut self, time: SystemTime) {
		self.compile_time.set(time);
	}

	pub fn issues(&self) -> &[Issue] {
		&self.issues
	}

	/// Whether a run is tracked as active.
	pub fn is_running(&self) -> bool {
		self.active.is_some()
	}

	/// Whether the construction scan's deferred run has yet to start.
	pub fn has_initial_run_pending(&self) -> bool {
		self.initial_run_pending
	}

	pub fn bound_editor(&self) -> Option<&Arc<dyn Editor>> {
		self.editor.bound()
	}

	/// Earliest instant at which [`Self::tick`] has time-based work.
	pub fn next_wakeup(&self) -> Option<Instant> {
		self.editor.next_deadline()
	}

	/// Replaces the bytes for `target` if they differ; returns whether they did.
	pub fn set_content(&mut self, target: &Path, bytes: Vec<u8>) -> bool {
		self.contents.set(target, bytes)
	}

	/// Drains content-changed notifications.
	pub fn take_changed(&mut self) -> Vec<PathBuf> {
		self.contents.take_changed()
	}

	/// Replaces the diagnostics and pushes them to the bound editor.
	pub fn set_compile_issues(&mut self, issues: Vec<Issue>) {
		self.issues = issues;
		self.editor.push_issues(&self.issues);
	}

	/// The environment generator processes run with.
	pub fn build_environment(&self) -> Environment {
		self.project.build_environment().resolve()
	}

	/// Advances control-thread work: completions, the deferred initial run,
	/// then the edit debounce.
	pub fn tick(&mut self, now: Instant) {
		self.poll_completions();
		if std::mem::take(&mut self.initial_run_pending) {
			self.run_file(self.source.clone());
		}
		if let Some(buffer) = self.editor.tick(now) {
			self.run_contents(buffer);
		}
	}

	/// Compiles the given bytes.
	pub fn run_contents(&mut self, contents: Vec<u8>) {
		self.run_impl(ContentProvider::Bytes(contents));
	}

	/// Compiles the file at `path`, read when the run starts.
	pub fn run_file(&mut self, path: impl Into<PathBuf>) {
		self.run_impl(ContentProvider::File(path.into()));
	}

	fn run_impl(&mut self, provider: ContentProvider) {
		let token = self.clock.issue();
		if let Some(previous) = self.active.take() {
			tracing::debug!(
				source = %self.source.display(),
				superseded = previous.token.generation(),
				generation = token.generation(),
				"extra_compiler.run.superseded"
			);
			previous.token.cancel();
			self.superseded.push(previous);
		}

		let latch = DoneLatch::new();
		let reply = RunReply::new(token.generation(), self.completion_tx.clone(), latch.clone());
		self.active = Some(TrackedRun {
			token: token.clone(),
			latch,
		});

		tracing::debug!(source = %self.source.display(), generation = token.generation(), "extra_compiler.run.start");
		self.runner.start(RunRequest {
			source: self.source.clone(),
			provider,
			environment: self.build_environment(),
			token,
			reply,
		});
	}

	/// Adopts delivered results. Returns how many runs were adopted.
	pub fn poll_completions(&mut self) -> usize {
		let mut adopted = 0;
		while let Ok(completion) = self.completion_rx.try_recv() {
			let is_active = self.active.as_ref().is_some_and(|run| run.token.generation() == completion.generation);
			if !is_active {
				self.superseded.retain(|run| run.token.generation() != completion.generation);
				tracing::debug!(
					source = %self.source.display(),
					generation = completion.generation,
					"extra_compiler.run.stale_dropped"
				);
				continue;
			}
			self.active = None;
			if self.finish_run(completion.outcome) {
				adopted += 1;
			}
		}
		adopted
	}

	fn finish_run(&mut self, outcome: Result<RunOutput, RunAbort>) -> bool {
		let output = match outcome {
			Ok(output) => output,
			Err(abort) => {
				tracing::debug!(source = %self.source.display(), %abort, "extra_compiler.run.no_result");
				return false;
			}
		};

		self.set_compile_issues(output.issues);
		if output.contents.is_empty() {
			tracing::debug!(source = %self.source.display(), "extra_compiler.run.empty_result");
			return false;
		}
		for (target, bytes) in output.contents {
			self.set_content(&target, bytes);
		}
		self.compile_time.set(SystemTime::now());
		true
	}

	/// Handles the host's "current editor changed" notification.
	pub fn on_editor_changed(&mut self, editor: Option<Arc<dyn Editor>>) {
		if let Some(buffer) = self.editor.editor_changed(editor, &self.issues) {
			self.run_contents(buffer);
		}
	}

	pub fn on_editor_about_to_close(&mut self, editor: EditorId) {
		if let Some(buffer) = self.editor.editor_about_to_close(editor) {
			self.run_contents(buffer);
		}
	}

	/// Handles a buffer edit; returns whether `editor` is the bound one.
	pub fn on_contents_changed(&mut self, editor: EditorId, now: Instant) -> bool {
		self.editor.contents_changed(editor, now)
	}

	/// Adopts targets produced by an external build of `project`.
	///
	/// Ignored for other projects and while the build is still running.
	pub fn on_targets_built(&mut self, project: ProjectId) {
		if project != self.project.id() || self.project.is_building() {
			return;
		}
		let adopted = staleness::reconcile(&self.source, &mut self.compile_time, self.contents.targets());
		for (target, bytes) in adopted {
			self.set_content(&target, bytes);
		}
	}
}

impl Drop for ExtraCompiler {
	fn drop(&mut self) {
		let runs: Vec<TrackedRun> = self.active.take().into_iter().chain(self.superseded.drain(..)).collect();
		if runs.is_empty() {
			return;
		}
		for run in &runs {
			run.token.cancel();
		}
		let deadline = Instant::now() + self.teardown_timeout;
		for run in runs {
			if !run.latch.wait_until(deadline) {
				tracing::warn!(
					source = %self.source.display(),
					generation = run.token.generation(),
					"extra_compiler.teardown.timeout"
				);
			}
		}
	}
}
