//! Control-thread façade routing host events to extra compilers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use kiln_worker::{TaskClass, WorkerPool};

use crate::editor::{Editor, EditorId};
use crate::{CompilerContext, ExtraCompiler, ExtraCompilerConfig, ExtraCompilerRegistry, Project, ProjectId};

/// A target whose cached content changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChange {
	pub source: PathBuf,
	pub target: PathBuf,
}

/// Owns every extra compiler of the open projects.
///
/// The host forwards project, build and editor notifications here and calls
/// [`Self::tick`] from its event loop.
pub struct CompilerSession {
	registry: ExtraCompilerRegistry,
	config: ExtraCompilerConfig,
	pool: WorkerPool,
	compilers: Vec<ExtraCompiler>,
}

impl CompilerSession {
	/// Creates a session with a fresh pool sized by `config.max_concurrent_runs`.
	pub fn new(registry: ExtraCompilerRegistry, config: ExtraCompilerConfig) -> Self {
		let pool = WorkerPool::new(TaskClass::Generator, config.max_concurrent_runs);
		Self::with_pool(registry, config, pool)
	}

	pub fn with_pool(registry: ExtraCompilerRegistry, config: ExtraCompilerConfig, pool: WorkerPool) -> Self {
		Self {
			registry,
			config,
			pool,
			compilers: Vec::new(),
		}
	}

	pub fn registry(&self) -> &ExtraCompilerRegistry {
		&self.registry
	}

	pub fn pool(&self) -> &WorkerPool {
		&self.pool
	}

	/// Scans `files` of a newly loaded project; returns how many compilers were created.
	pub fn project_added(&mut self, project: Arc<dyn Project>, files: impl IntoIterator<Item = PathBuf>) -> usize {
		let ctx = CompilerContext::new(project, self.config.clone(), self.pool.clone());
		let before = self.compilers.len();
		for file in files {
			let created = self.registry.instantiate(&ctx, &file);
			self.compilers.extend(created);
		}
		let created = self.compilers.len() - before;
		tracing::debug!(project = ctx.project.id().0, created, "extra_compiler.session.project_added");
		created
	}

	/// Tears down every compiler owned by `project`.
	pub fn project_removed(&mut self, project: ProjectId) -> usize {
		let before = self.compilers.len();
		self.compilers.retain(|compiler| compiler.project_id() != project);
		before - self.compilers.len()
	}

	pub fn current_editor_changed(&mut self, editor: Option<Arc<dyn Editor>>) {
		for compiler in &mut self.compilers {
			compiler.on_editor_changed(editor.clone());
		}
	}

	pub fn editor_about_to_close(&mut self, editor: EditorId) {
		for compiler in &mut self.compilers {
			compiler.on_editor_about_to_close(editor);
		}
	}

	pub fn document_contents_changed(&mut self, editor: EditorId, now: Instant) {
		for compiler in &mut self.compilers {
			compiler.on_contents_changed(editor, now);
		}
	}

	/// Build state of `project` changed; compilers reconcile once it is idle.
	pub fn build_state_changed(&mut self, project: ProjectId) {
		for compiler in &mut self.compilers {
			compiler.on_targets_built(project);
		}
	}

	pub fn tick(&mut self, now: Instant) {
		for compiler in &mut self.compilers {
			compiler.tick(now);
		}
	}

	/// Earliest debounce deadline across all compilers.
	pub fn next_wakeup(&self) -> Option<Instant> {
		self.compilers.iter().filter_map(ExtraCompiler::next_wakeup).min()
	}

	/// Drains content-changed notifications from every compiler.
	pub fn take_changed(&mut self) -> Vec<ContentChange> {
		let mut changes = Vec::new();
		for compiler in &mut self.compilers {
			let source = compiler.source().to_path_buf();
			changes.extend(compiler.take_changed().into_iter().map(|target| ContentChange {
				source: source.clone(),
				target,
			}));
		}
		changes
	}

	pub fn compilers(&self) -> &[ExtraCompiler] {
		&self.compilers
	}

	pub fn compiler_for_target(&self, target: &Path) -> Option<&ExtraCompiler> {
		self.compilers.iter().find(|compiler| compiler.has_target(target))
	}

	/// Whether any compiler still has a run in flight or queued.
	pub fn is_busy(&self) -> bool {
		self.compilers.iter().any(|compiler| compiler.is_running() || compiler.has_initial_run_pending())
	}
}
