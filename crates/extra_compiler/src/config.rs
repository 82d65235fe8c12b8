use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Default quiet period after the last edit before the live buffer is compiled.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Default interval between cancellation checks while a generator runs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default upper bound for waiting on outstanding runs during teardown.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Tunables for extra compiler instances and the shared generator pool.
///
/// ```toml
/// debounce-ms = 1000
/// poll-interval-ms = 200
/// max-concurrent-runs = 4
/// teardown-timeout-ms = 30000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExtraCompilerConfig {
	pub debounce_ms: u64,
	pub poll_interval_ms: u64,
	pub max_concurrent_runs: usize,
	pub teardown_timeout_ms: u64,
}

impl Default for ExtraCompilerConfig {
	fn default() -> Self {
		Self {
			debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
			poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
			max_concurrent_runs: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
			teardown_timeout_ms: DEFAULT_TEARDOWN_TIMEOUT.as_millis() as u64,
		}
	}
}

impl ExtraCompilerConfig {
	/// Parses a config from TOML text; missing keys keep their defaults.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		Ok(toml::from_str(text)?)
	}

	/// Reads and parses a TOML config file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| Error::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&text)
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	/// Poll slice for generator processes; never zero.
	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms.max(1))
	}

	pub fn teardown_timeout(&self) -> Duration {
		Duration::from_millis(self.teardown_timeout_ms)
	}
}
