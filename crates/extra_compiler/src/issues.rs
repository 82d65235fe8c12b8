//! Generator diagnostics and their mapping onto editor line annotations.

/// Severity of a generator diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
	Warning,
	Error,
}

/// A diagnostic reported by a generator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
	/// 1-based source line.
	pub line: u32,
	pub severity: Severity,
	pub message: String,
}

impl Issue {
	pub fn new(line: u32, severity: Severity, message: impl Into<String>) -> Self {
		Self {
			line,
			severity,
			message: message.into(),
		}
	}

	pub fn warning(line: u32, message: impl Into<String>) -> Self {
		Self::new(line, Severity::Warning, message)
	}

	pub fn error(line: u32, message: impl Into<String>) -> Self {
		Self::new(line, Severity::Error, message)
	}
}

/// A whole-line highlight pushed to an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineAnnotation {
	/// 0-based line index.
	pub line: u32,
	pub severity: Severity,
	pub tooltip: String,
}

/// Maps issues onto whole-line annotations, one per issue.
pub fn annotations_for(issues: &[Issue]) -> Vec<LineAnnotation> {
	issues
		.iter()
		.map(|issue| LineAnnotation {
			line: issue.line.saturating_sub(1),
			severity: issue.severity,
			tooltip: issue.message.clone(),
		})
		.collect()
}

/// Parses `path:line[:column]: error|warning: message` diagnostics.
///
/// Lines in any other shape are skipped.
pub fn parse_gcc_style(stderr: &[u8]) -> Vec<Issue> {
	String::from_utf8_lossy(stderr).lines().filter_map(parse_gcc_line).collect()
}

fn parse_gcc_line(line: &str) -> Option<Issue> {
	let (location, severity, message) = [(": error: ", Severity::Error), (": warning: ", Severity::Warning)]
		.into_iter()
		.find_map(|(marker, severity)| line.split_once(marker).map(|(location, message)| (location, severity, message)))?;

	let mut parts = location.rsplitn(3, ':');
	let last = parts.next()?;
	let before_last = parts.next()?;
	let line_no = match (before_last.parse::<u32>(), last.parse::<u32>()) {
		(Ok(line_no), Ok(_column)) => line_no,
		(_, Ok(line_no)) => line_no,
		_ => return None,
	};
	Some(Issue::new(line_no, severity, message.trim()))
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn parses_line_and_column_forms() {
		let stderr = b"form.ui:12:5: error: unknown widget\nform.ui:3: warning: deprecated property\n";
		assert_eq!(
			parse_gcc_style(stderr),
			vec![Issue::error(12, "unknown widget"), Issue::warning(3, "deprecated property")]
		);
	}

	#[test]
	fn skips_unrecognized_lines() {
		let stderr = b"uic 6.5\nnote: something\nform.ui:x: error: no line\n";
		assert!(parse_gcc_style(stderr).is_empty());
	}

	#[test]
	fn drive_letter_paths_keep_the_line_number() {
		let issues = parse_gcc_style(br"C:\src\form.ui:7: error: bad");
		assert_eq!(issues, vec![Issue::error(7, "bad")]);
	}

	#[test]
	fn annotations_are_zero_based_and_clamped() {
		let annotations = annotations_for(&[Issue::warning(1, "first"), Issue::error(0, "none")]);
		assert_eq!(annotations[0].line, 0);
		assert_eq!(annotations[0].tooltip, "first");
		assert_eq!(annotations[1].line, 0);
		assert_eq!(annotations[1].severity, Severity::Error);
	}
}
