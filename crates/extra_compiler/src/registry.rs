//! Process-wide registry of extra compiler factories and creation observers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::{CompilerContext, ExtraCompiler, ProjectId};

/// Matches source files to extra compilers and constructs them.
pub trait ExtraCompilerFactory: Send + Sync {
	/// Name used in logs.
	fn name(&self) -> &str;

	/// File-name suffixes this factory claims, e.g. `".ui"`.
	fn source_suffixes(&self) -> &[&str];

	fn matches(&self, source: &Path) -> bool {
		let Some(name) = source.file_name().and_then(|name| name.to_str()) else {
			return false;
		};
		self.source_suffixes().iter().any(|suffix| name.ends_with(suffix))
	}

	/// Targets generated from `source`.
	fn target_paths(&self, source: &Path) -> Vec<PathBuf>;

	fn create(&self, ctx: CompilerContext, source: PathBuf, targets: Vec<PathBuf>) -> ExtraCompiler;
}

/// Notified synchronously whenever an extra compiler is created.
pub trait ExtraCompilerObserver: Send + Sync {
	fn new_extra_compiler(&self, project: ProjectId, source: &Path, targets: &[PathBuf]);
}

#[derive(Default)]
struct Inner {
	next_id: u64,
	factories: Vec<(u64, Arc<dyn ExtraCompilerFactory>)>,
	observers: Vec<(u64, Arc<dyn ExtraCompilerObserver>)>,
}

impl Inner {
	fn next_id(&mut self) -> u64 {
		self.next_id = self.next_id.wrapping_add(1);
		self.next_id
	}
}

/// Factory and observer lists shared by everything that scans project files.
///
/// Cloning yields another handle to the same lists. Registrations are RAII
/// guards; dropping one removes the entry.
#[derive(Clone, Default)]
pub struct ExtraCompilerRegistry {
	inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for ExtraCompilerRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.inner.read();
		f.debug_struct("ExtraCompilerRegistry")
			.field("factories", &inner.factories.iter().map(|(_, factory)| factory.name().to_owned()).collect::<Vec<_>>())
			.field("observers", &inner.observers.len())
			.finish()
	}
}

/// Keeps a factory registered until dropped.
#[must_use = "dropping the registration unregisters the factory"]
pub struct FactoryRegistration {
	id: u64,
	registry: Weak<RwLock<Inner>>,
}

impl Drop for FactoryRegistration {
	fn drop(&mut self) {
		if let Some(inner) = self.registry.upgrade() {
			inner.write().factories.retain(|(id, _)| *id != self.id);
		}
	}
}

/// Keeps an observer registered until dropped.
#[must_use = "dropping the registration unregisters the observer"]
pub struct ObserverRegistration {
	id: u64,
	registry: Weak<RwLock<Inner>>,
}

impl Drop for ObserverRegistration {
	fn drop(&mut self) {
		if let Some(inner) = self.registry.upgrade() {
			inner.write().observers.retain(|(id, _)| *id != self.id);
		}
	}
}

impl ExtraCompilerRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register_factory(&self, factory: Arc<dyn ExtraCompilerFactory>) -> FactoryRegistration {
		let mut inner = self.inner.write();
		let id = inner.next_id();
		tracing::debug!(factory = factory.name(), "extra_compiler.registry.factory_registered");
		inner.factories.push((id, factory));
		FactoryRegistration {
			id,
			registry: Arc::downgrade(&self.inner),
		}
	}

	pub fn register_observer(&self, observer: Arc<dyn ExtraCompilerObserver>) -> ObserverRegistration {
		let mut inner = self.inner.write();
		let id = inner.next_id();
		inner.observers.push((id, observer));
		ObserverRegistration {
			id,
			registry: Arc::downgrade(&self.inner),
		}
	}

	/// Registered factories, in registration order.
	pub fn factories(&self) -> Vec<Arc<dyn ExtraCompilerFactory>> {
		self.inner.read().factories.iter().map(|(_, factory)| Arc::clone(factory)).collect()
	}

	/// Factories claiming `source`.
	pub fn factories_for(&self, source: &Path) -> Vec<Arc<dyn ExtraCompilerFactory>> {
		self.inner
			.read()
			.factories
			.iter()
			.filter(|(_, factory)| factory.matches(source))
			.map(|(_, factory)| Arc::clone(factory))
			.collect()
	}

	/// Notifies every registered observer of a new extra compiler.
	///
	/// Observers registered afterwards never see this event.
	pub fn announce_creation(&self, project: ProjectId, source: &Path, targets: &[PathBuf]) {
		let observers: Vec<_> = self.inner.read().observers.iter().map(|(_, observer)| Arc::clone(observer)).collect();
		for observer in observers {
			observer.new_extra_compiler(project, source, targets);
		}
	}

	/// Creates one extra compiler per factory claiming `source`, announcing each.
	pub fn instantiate(&self, ctx: &CompilerContext, source: &Path) -> Vec<ExtraCompiler> {
		let project = ctx.project.id();
		self.factories_for(source)
			.into_iter()
			.map(|factory| {
				let targets = factory.target_paths(source);
				tracing::debug!(
					factory = factory.name(),
					source = %source.display(),
					targets = targets.len(),
					"extra_compiler.registry.instantiate"
				);
				let compiler = factory.create(ctx.clone(), source.to_path_buf(), targets.clone());
				self.announce_creation(project, source, &targets);
				compiler
			})
			.collect()
	}

	/// Drops every factory and observer. Outstanding registrations become no-ops.
	pub fn clear(&self) {
		let mut inner = self.inner.write();
		inner.factories.clear();
		inner.observers.clear();
	}
}
