use crate::{Environment, EnvironmentItem};

/// Identity of a project loaded in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u64);

/// Where a project's generator environment comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEnvironment {
	/// The active build configuration's full environment.
	Configuration(Environment),
	/// No active build configuration; the kit's deltas over the inherited environment.
	Kit(Vec<EnvironmentItem>),
	/// No active target at all.
	Unconfigured,
}

impl BuildEnvironment {
	pub fn resolve(self) -> Environment {
		match self {
			Self::Configuration(env) => env,
			Self::Kit(changes) => {
				let mut env = Environment::inherited();
				env.modify(&changes);
				env
			}
			Self::Unconfigured => Environment::inherited(),
		}
	}
}

/// The build/project layer as seen by extra compilers.
///
/// Only consulted for identity, build state and environment; the project
/// model itself lives with the host.
pub trait Project: Send + Sync {
	fn id(&self) -> ProjectId;

	/// Whether a build of this project is currently running.
	fn is_building(&self) -> bool;

	fn build_environment(&self) -> BuildEnvironment;
}

#[cfg(test)]
mod tests {
	use std::ffi::OsStr;

	use super::*;

	#[test]
	fn configuration_environment_is_used_verbatim() {
		let mut env = Environment::new();
		env.set("ONLY", "this");
		assert_eq!(BuildEnvironment::Configuration(env.clone()).resolve(), env);
	}

	#[test]
	fn kit_changes_apply_over_inherited() {
		let env = BuildEnvironment::Kit(vec![EnvironmentItem::set("KILN_KIT_MARKER", "1")]).resolve();
		assert_eq!(env.get("KILN_KIT_MARKER"), Some(OsStr::new("1")));
		assert!(env.len() >= Environment::inherited().len());
	}

	#[test]
	fn unconfigured_falls_back_to_inherited() {
		assert_eq!(BuildEnvironment::Unconfigured.resolve(), Environment::inherited());
	}
}
