//! Timestamp rules deciding when generated targets are out of date.
//!
//! On-disk modification times are the only persisted staleness record: a
//! target older than its source is stale, and a target newer than both the
//! source and the last adopted generation was produced by someone else (the
//! external build) and can be adopted as-is.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The "as-of" time of the last adopted generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(Option<SystemTime>);

impl Watermark {
	pub const fn unset() -> Self {
		Self(None)
	}

	pub const fn at(time: SystemTime) -> Self {
		Self(Some(time))
	}

	pub const fn get(self) -> Option<SystemTime> {
		self.0
	}

	/// Lowers the watermark to `time` if it is earlier (or unset).
	pub fn absorb(&mut self, time: SystemTime) {
		if self.0.is_none_or(|current| time < current) {
			self.0 = Some(time);
		}
	}

	/// Overwrites the watermark with `time`, even when `time` is earlier.
	pub fn set(&mut self, time: SystemTime) {
		self.0 = Some(time);
	}

	/// Whether the last adopted generation already covers `source_mtime`.
	///
	/// A missing source (`None`) is covered by any set watermark.
	pub fn is_current_for(self, source_mtime: Option<SystemTime>) -> bool {
		match (self.0, source_mtime) {
			(Some(watermark), Some(source)) => watermark >= source,
			(Some(_), None) => true,
			(None, _) => false,
		}
	}

	/// Whether a target modified at `mtime` is newer than this watermark.
	pub fn is_superseded_by(self, mtime: SystemTime) -> bool {
		self.0.is_none_or(|watermark| watermark < mtime)
	}
}

/// Outcome of inspecting existing targets when an instance is created.
#[derive(Debug, Default)]
pub struct InitialScan {
	/// A target is missing or older than the source.
	pub dirty: bool,
	/// Earliest modification time among present targets.
	pub watermark: Watermark,
	/// Bytes of every present, readable target.
	pub loaded: Vec<(PathBuf, Vec<u8>)>,
}

/// Returns the modification time of `path`, if it exists.
pub fn modified(path: &Path) -> Option<SystemTime> {
	std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Inspects `targets` on disk against `source`.
pub fn scan_targets<'a>(source: &Path, targets: impl IntoIterator<Item = &'a Path>) -> InitialScan {
	let source_mtime = modified(source);
	let mut scan = InitialScan::default();

	for target in targets {
		let Some(target_mtime) = modified(target) else {
			tracing::debug!(target = %target.display(), "extra_compiler.staleness.missing_target");
			scan.dirty = true;
			continue;
		};

		if source_mtime.is_some_and(|source| target_mtime < source) {
			tracing::debug!(target = %target.display(), "extra_compiler.staleness.older_than_source");
			scan.dirty = true;
		}

		scan.watermark.absorb(target_mtime);

		match std::fs::read(target) {
			Ok(bytes) => scan.loaded.push((target.to_path_buf(), bytes)),
			Err(error) => tracing::debug!(target = %target.display(), %error, "extra_compiler.staleness.unreadable_target"),
		}
	}

	scan
}

/// Picks up targets an external build produced after the last adopted generation.
///
/// Does nothing while `watermark` already covers the source. Otherwise each
/// target newer than the source and newer than the running watermark is read
/// and returned, and the watermark advances to that target's mtime. Targets
/// are judged one at a time, so a later target is compared against the
/// watermark advanced by an earlier one.
pub fn reconcile<'a>(source: &Path, watermark: &mut Watermark, targets: impl IntoIterator<Item = &'a Path>) -> Vec<(PathBuf, Vec<u8>)> {
	let source_mtime = modified(source);
	if watermark.is_current_for(source_mtime) {
		return Vec::new();
	}

	let mut adopted = Vec::new();
	for target in targets {
		let Some(generated) = modified(target) else {
			continue;
		};
		if source_mtime.is_some_and(|source| generated <= source) || !watermark.is_superseded_by(generated) {
			continue;
		}
		match std::fs::read(target) {
			Ok(bytes) => {
				tracing::debug!(target = %target.display(), "extra_compiler.staleness.adopt_external");
				watermark.set(generated);
				adopted.push((target.to_path_buf(), bytes));
			}
			Err(error) => tracing::debug!(target = %target.display(), %error, "extra_compiler.staleness.unreadable_target"),
		}
	}
	adopted
}

#[cfg(test)]
mod tests;
