/// Shared execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// One generator run, queued behind a pool permit.
	Generator,
	/// Pipe pumping for a running child process.
	Io,
	/// CPU-bound in-process transforms executed on the blocking pool.
	CpuBlocking,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Generator => "generator",
			Self::Io => "io",
			Self::CpuBlocking => "cpu_blocking",
		}
	}
}
