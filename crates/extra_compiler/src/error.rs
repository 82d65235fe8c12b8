//! Error types for extra compiler configuration.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers of this crate.
///
/// Generator runs never produce these; see [`crate::RunAbort`] for the run
/// abort taxonomy, which is logged instead of returned.
#[derive(Debug, Error)]
pub enum Error {
	/// Error reading a configuration file.
	#[error("I/O error reading {}: {error}", path.display())]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// Configuration text is not valid TOML or does not match the schema.
	#[error("invalid extra compiler config: {0}")]
	Toml(#[from] toml::de::Error),
}

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
