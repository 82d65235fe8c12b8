use std::path::{Path, PathBuf};

use indexmap::IndexMap;

/// Cached generated bytes for a fixed set of targets.
///
/// The set is fixed at construction and every declared target always has an
/// entry, empty until content is produced. Writes that would not change the
/// bytes are dropped, which is what keeps byte-identical regenerations from
/// invalidating downstream consumers.
#[derive(Debug, Default, Clone)]
pub struct ContentStore {
	contents: IndexMap<PathBuf, Vec<u8>>,
	changed: Vec<PathBuf>,
}

impl ContentStore {
	pub fn new(targets: impl IntoIterator<Item = PathBuf>) -> Self {
		Self {
			contents: targets.into_iter().map(|target| (target, Vec::new())).collect(),
			changed: Vec::new(),
		}
	}

	/// Returns cached bytes for `target`; empty if undeclared or never produced.
	pub fn get(&self, target: &Path) -> &[u8] {
		self.contents.get(target).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn contains(&self, target: &Path) -> bool {
		self.contents.contains_key(target)
	}

	/// Declared targets, in declaration order.
	pub fn targets(&self) -> impl Iterator<Item = &Path> {
		self.contents.keys().map(PathBuf::as_path)
	}

	pub fn for_each_target(&self, mut f: impl FnMut(&Path)) {
		for target in self.contents.keys() {
			f(target);
		}
	}

	pub fn len(&self) -> usize {
		self.contents.len()
	}

	pub fn is_empty(&self) -> bool {
		self.contents.is_empty()
	}

	/// Replaces the bytes for a declared target if they differ.
	///
	/// Returns `true` and queues a change notification when the cache changed.
	pub fn set(&mut self, target: &Path, bytes: Vec<u8>) -> bool {
		let Some(slot) = self.contents.get_mut(target) else {
			tracing::debug!(target = %target.display(), "extra_compiler.content.undeclared_target");
			return false;
		};
		if *slot == bytes {
			return false;
		}
		*slot = bytes;
		self.changed.push(target.to_path_buf());
		true
	}

	/// Seeds cached bytes without queuing a notification.
	pub(crate) fn load(&mut self, target: &Path, bytes: Vec<u8>) {
		if let Some(slot) = self.contents.get_mut(target) {
			*slot = bytes;
		}
	}

	/// Drains pending change notifications in emission order.
	pub fn take_changed(&mut self) -> Vec<PathBuf> {
		std::mem::take(&mut self.changed)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn store() -> ContentStore {
		ContentStore::new([PathBuf::from("ui_a.h"), PathBuf::from("ui_b.h")])
	}

	#[test]
	fn every_declared_target_starts_empty() {
		let store = store();
		assert_eq!(store.len(), 2);
		assert!(store.get(Path::new("ui_a.h")).is_empty());
		assert_eq!(store.targets().collect::<Vec<_>>(), vec![Path::new("ui_a.h"), Path::new("ui_b.h")]);
	}

	#[test]
	fn identical_bytes_notify_once() {
		let mut store = store();
		assert!(store.set(Path::new("ui_a.h"), b"X".to_vec()));
		assert!(!store.set(Path::new("ui_a.h"), b"X".to_vec()));
		assert_eq!(store.take_changed(), vec![PathBuf::from("ui_a.h")]);
		assert!(store.take_changed().is_empty());
	}

	#[test]
	fn undeclared_target_is_ignored() {
		let mut store = store();
		assert!(!store.set(Path::new("other.h"), b"X".to_vec()));
		assert!(!store.contains(Path::new("other.h")));
		assert!(store.get(Path::new("other.h")).is_empty());
		assert_eq!(store.len(), 2);
	}

	#[test]
	fn load_does_not_notify() {
		let mut store = store();
		store.load(Path::new("ui_b.h"), b"seed".to_vec());
		assert_eq!(store.get(Path::new("ui_b.h")), b"seed");
		assert!(store.take_changed().is_empty());
	}

	#[test]
	fn changes_are_reported_in_order() {
		let mut store = store();
		store.set(Path::new("ui_b.h"), b"1".to_vec());
		store.set(Path::new("ui_a.h"), b"2".to_vec());
		store.set(Path::new("ui_b.h"), b"3".to_vec());
		assert_eq!(
			store.take_changed(),
			vec![PathBuf::from("ui_b.h"), PathBuf::from("ui_a.h"), PathBuf::from("ui_b.h")]
		);
	}
}
