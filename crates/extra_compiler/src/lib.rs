//! Extra compiler orchestration.
//!
//! An [`ExtraCompiler`] derives one or more target files from a single source
//! file by way of a [`Runner`], usually an external generator executed by
//! [`ProcessRunner`]. The engine keeps the derived bytes fresh:
//!
//! - On construction, target timestamps decide whether the cached artifacts are
//!   stale ([`staleness`]).
//! - While the source is open in an editor, edits are debounced and the live
//!   buffer, not the file on disk, feeds the next run ([`editor`]).
//! - After an external build, generated files newer than the last adopted run
//!   are picked up without running the generator again.
//! - A failed or empty run never replaces the last good artifact.
//!
//! All instance state lives on one control thread. Only generator execution
//! happens on the shared [`kiln_worker::WorkerPool`]; results come back through
//! a channel drained by [`ExtraCompiler::tick`]. [`CompilerSession`] routes host
//! (project, build and editor) events to the instances it owns.

mod compiler;
mod config;
mod content;
pub mod editor;
mod environment;
mod error;
pub mod issues;
mod process;
mod project;
mod registry;
mod runner;
mod session;
pub mod staleness;

pub use compiler::{CompilerContext, ExtraCompiler};
pub use config::ExtraCompilerConfig;
pub use content::ContentStore;
pub use editor::{Editor, EditorId};
pub use environment::{Environment, EnvironmentItem};
pub use error::{Error, Result};
pub use issues::{Issue, LineAnnotation, Severity};
pub use process::{ProcessGenerator, ProcessOutput, ProcessRunner};
pub use project::{BuildEnvironment, Project, ProjectId};
pub use registry::{ExtraCompilerFactory, ExtraCompilerObserver, ExtraCompilerRegistry, FactoryRegistration, ObserverRegistration};
pub use runner::{ContentMap, ContentProvider, FnRunner, RunAbort, RunOutput, RunReply, RunRequest, Runner};
pub use session::{CompilerSession, ContentChange};
