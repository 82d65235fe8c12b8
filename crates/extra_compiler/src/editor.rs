//! Binding between an extra compiler and the editor showing its source.
//!
//! While the source file is the current editor, its live buffer (not the
//! file on disk) feeds compilation. Edits are coalesced by a [`Debounce`]
//! driven from [`EditorBridge::tick`]; switching away from or closing the
//! editor flushes a pending edit immediately so nothing is lost to timing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::issues::{Issue, LineAnnotation, annotations_for};

/// Identity of an open editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EditorId(pub u64);

/// The editor layer as seen by extra compilers.
pub trait Editor: Send + Sync {
	fn id(&self) -> EditorId;

	/// Path of the document shown in this editor.
	fn path(&self) -> PathBuf;

	/// Snapshot of the current (possibly unsaved) buffer.
	fn contents(&self) -> Vec<u8>;

	/// Replaces the generator issue highlights shown in this editor.
	fn set_issue_annotations(&self, annotations: &[LineAnnotation]);
}

/// Delay-and-coalesce state for buffer edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Debounce {
	#[default]
	Idle,
	Pending {
		deadline: Instant,
	},
}

impl Debounce {
	/// (Re)starts the quiet period at `now`.
	pub fn restart(&mut self, now: Instant, quantum: Duration) {
		*self = Self::Pending { deadline: now + quantum };
	}

	pub fn cancel(&mut self) {
		*self = Self::Idle;
	}

	/// Returns `true` once when the quiet period has elapsed.
	pub fn fire(&mut self, now: Instant) -> bool {
		match *self {
			Self::Pending { deadline } if now >= deadline => {
				*self = Self::Idle;
				true
			}
			_ => false,
		}
	}

	pub fn deadline(&self) -> Option<Instant> {
		match *self {
			Self::Pending { deadline } => Some(deadline),
			Self::Idle => None,
		}
	}
}

/// Bound/unbound state machine for one source file.
///
/// Methods that may require a run return the buffer snapshot to compile;
/// the owner decides how to run it.
pub struct EditorBridge {
	source: PathBuf,
	bound: Option<Arc<dyn Editor>>,
	dirty: bool,
	debounce: Debounce,
	quantum: Duration,
}

impl EditorBridge {
	pub fn new(source: PathBuf, quantum: Duration) -> Self {
		Self {
			source,
			bound: None,
			dirty: false,
			debounce: Debounce::Idle,
			quantum,
		}
	}

	pub fn bound(&self) -> Option<&Arc<dyn Editor>> {
		self.bound.as_ref()
	}

	pub fn is_bound(&self) -> bool {
		self.bound.is_some()
	}

	/// Whether an edit is waiting for the debounce to expire.
	pub fn has_pending_edit(&self) -> bool {
		self.dirty
	}

	pub fn next_deadline(&self) -> Option<Instant> {
		self.debounce.deadline()
	}

	/// Handles the host's "current editor changed" notification.
	///
	/// Detaches from the previous editor (flushing a pending edit), then binds
	/// `editor` if it shows this source and pushes `issues` into it.
	pub fn editor_changed(&mut self, editor: Option<Arc<dyn Editor>>, issues: &[Issue]) -> Option<Vec<u8>> {
		let flushed = self.detach();
		if let Some(editor) = editor.filter(|editor| editor.path() == self.source) {
			tracing::debug!(source = %self.source.display(), editor = editor.id().0, "extra_compiler.editor.bound");
			editor.set_issue_annotations(&annotations_for(issues));
			self.bound = Some(editor);
		}
		flushed
	}

	/// Handles "editor about to close"; ignored unless `id` is the bound editor.
	pub fn editor_about_to_close(&mut self, id: EditorId) -> Option<Vec<u8>> {
		if self.bound.as_ref().is_none_or(|editor| editor.id() != id) {
			return None;
		}
		self.detach()
	}

	/// Handles a contents-changed notification from editor `id`.
	///
	/// Returns whether the edit was accepted (i.e. `id` is the bound editor).
	pub fn contents_changed(&mut self, id: EditorId, now: Instant) -> bool {
		if self.bound.as_ref().is_none_or(|editor| editor.id() != id) {
			return false;
		}
		self.dirty = true;
		self.debounce.restart(now, self.quantum);
		true
	}

	/// Fires the debounce; yields the live buffer if an edit is still pending.
	pub fn tick(&mut self, now: Instant) -> Option<Vec<u8>> {
		if !self.debounce.fire(now) || !self.dirty {
			return None;
		}
		let editor = self.bound.as_ref()?;
		self.dirty = false;
		Some(editor.contents())
	}

	/// Pushes `issues` to the bound editor, if any.
	pub fn push_issues(&self, issues: &[Issue]) {
		if let Some(editor) = &self.bound {
			editor.set_issue_annotations(&annotations_for(issues));
		}
	}

	/// Leaves the bound state, snapshotting the buffer first if an edit is pending.
	fn detach(&mut self) -> Option<Vec<u8>> {
		let editor = self.bound.as_ref()?;
		self.debounce.cancel();
		let snapshot = std::mem::take(&mut self.dirty).then(|| editor.contents());
		tracing::debug!(source = %self.source.display(), flushed = snapshot.is_some(), "extra_compiler.editor.unbound");
		self.bound = None;
		snapshot
	}
}
