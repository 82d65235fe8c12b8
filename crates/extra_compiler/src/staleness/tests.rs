use std::fs::File;
use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;

fn base() -> SystemTime {
	SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn write_at(path: &Path, bytes: &[u8], mtime: SystemTime) {
	let mut file = File::create(path).unwrap();
	file.write_all(bytes).unwrap();
	file.set_modified(mtime).unwrap();
}

#[test]
fn fresh_targets_are_not_dirty() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let a = dir.path().join("ui_form.h");
	let b = dir.path().join("ui_form.cpp");
	write_at(&source, b"<ui/>", base());
	write_at(&a, b"A", base());
	write_at(&b, b"B", base() + Duration::from_secs(5));

	let scan = scan_targets(&source, [a.as_path(), b.as_path()]);
	assert!(!scan.dirty);
	assert_eq!(scan.watermark, Watermark::at(base()));
	assert_eq!(scan.loaded, vec![(a, b"A".to_vec()), (b, b"B".to_vec())]);
}

#[test]
fn missing_target_is_dirty() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let present = dir.path().join("ui_form.h");
	let missing = dir.path().join("ui_form.cpp");
	write_at(&source, b"<ui/>", base());
	write_at(&present, b"A", base() + Duration::from_secs(1));

	let scan = scan_targets(&source, [present.as_path(), missing.as_path()]);
	assert!(scan.dirty);
	assert_eq!(scan.watermark, Watermark::at(base() + Duration::from_secs(1)));
	assert_eq!(scan.loaded.len(), 1);
}

#[test]
fn older_target_is_dirty_but_still_loaded() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let target = dir.path().join("ui_form.h");
	write_at(&source, b"<ui/>", base());
	write_at(&target, b"old", base() - Duration::from_secs(1));

	let scan = scan_targets(&source, [target.as_path()]);
	assert!(scan.dirty);
	assert_eq!(scan.loaded, vec![(target, b"old".to_vec())]);
}

#[test]
fn no_targets_is_clean_with_unset_watermark() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	write_at(&source, b"<ui/>", base());

	let scan = scan_targets(&source, std::iter::empty());
	assert!(!scan.dirty);
	assert_eq!(scan.watermark, Watermark::unset());
}

#[test]
fn absorb_keeps_earliest() {
	let mut watermark = Watermark::unset();
	watermark.absorb(base() + Duration::from_secs(3));
	watermark.absorb(base());
	watermark.absorb(base() + Duration::from_secs(9));
	assert_eq!(watermark.get(), Some(base()));
}

#[test]
fn set_overwrites_even_backwards() {
	let mut watermark = Watermark::at(base() + Duration::from_secs(5));
	watermark.set(base());
	assert_eq!(watermark.get(), Some(base()));
	assert!(!watermark.is_current_for(Some(base() + Duration::from_secs(1))));
}

#[test]
fn reconcile_adopts_externally_built_target() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let target = dir.path().join("ui_form.h");
	write_at(&source, b"<ui/>", base());
	write_at(&target, b"built", base() + Duration::from_secs(10));

	let mut watermark = Watermark::at(base() - Duration::from_secs(5));
	let adopted = reconcile(&source, &mut watermark, [target.as_path()]);
	assert_eq!(adopted, vec![(target, b"built".to_vec())]);
	assert_eq!(watermark, Watermark::at(base() + Duration::from_secs(10)));
}

#[test]
fn reconcile_skips_when_watermark_covers_source() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let target = dir.path().join("ui_form.h");
	write_at(&source, b"<ui/>", base());
	write_at(&target, b"built", base() + Duration::from_secs(10));

	let mut watermark = Watermark::at(base());
	assert!(reconcile(&source, &mut watermark, [target.as_path()]).is_empty());
	assert_eq!(watermark, Watermark::at(base()));
}

#[test]
fn reconcile_leaves_targets_not_newer_than_source_or_watermark() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let stale = dir.path().join("stale.h");
	let fresh = dir.path().join("fresh.h");
	write_at(&source, b"<ui/>", base());
	write_at(&stale, b"stale", base() - Duration::from_secs(1));
	write_at(&fresh, b"fresh", base() + Duration::from_secs(2));

	let mut watermark = Watermark::unset();
	let adopted = reconcile(&source, &mut watermark, [stale.as_path(), fresh.as_path()]);
	assert_eq!(adopted, vec![(fresh, b"fresh".to_vec())]);
	assert_eq!(watermark, Watermark::at(base() + Duration::from_secs(2)));
}

#[test]
fn reconcile_compares_against_running_watermark() {
	let dir = tempfile::tempdir().unwrap();
	let source = dir.path().join("form.ui");
	let later = dir.path().join("later.h");
	let earlier = dir.path().join("earlier.h");
	write_at(&source, b"<ui/>", base());
	write_at(&later, b"later", base() + Duration::from_secs(20));
	write_at(&earlier, b"earlier", base() + Duration::from_secs(10));

	let mut watermark = Watermark::unset();
	let adopted = reconcile(&source, &mut watermark, [later.as_path(), earlier.as_path()]);
	assert_eq!(adopted, vec![(later, b"later".to_vec())]);
	assert_eq!(watermark, Watermark::at(base() + Duration::from_secs(20)));
}
