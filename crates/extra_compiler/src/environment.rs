use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};

#[cfg(windows)]
const PATH_LIST_SEPARATOR: &str = ";";
#[cfg(not(windows))]
const PATH_LIST_SEPARATOR: &str = ":";

/// Process environment handed to generator runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
	vars: BTreeMap<OsString, OsString>,
}

/// One delta applied on top of an [`Environment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentItem {
	Set { name: OsString, value: OsString },
	Unset { name: OsString },
	/// Appends to a path-list variable, creating it if absent.
	Append { name: OsString, value: OsString },
	/// Prepends to a path-list variable, creating it if absent.
	Prepend { name: OsString, value: OsString },
}

impl EnvironmentItem {
	pub fn set(name: impl Into<OsString>, value: impl Into<OsString>) -> Self {
		Self::Set {
			name: name.into(),
			value: value.into(),
		}
	}

	pub fn unset(name: impl Into<OsString>) -> Self {
		Self::Unset { name: name.into() }
	}

	pub fn append(name: impl Into<OsString>, value: impl Into<OsString>) -> Self {
		Self::Append {
			name: name.into(),
			value: value.into(),
		}
	}

	pub fn prepend(name: impl Into<OsString>, value: impl Into<OsString>) -> Self {
		Self::Prepend {
			name: name.into(),
			value: value.into(),
		}
	}
}

impl Environment {
	/// Creates an empty environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of the environment this process inherited.
	pub fn inherited() -> Self {
		Self {
			vars: std::env::vars_os().collect(),
		}
	}

	pub fn get(&self, name: impl AsRef<OsStr>) -> Option<&OsStr> {
		self.vars.get(name.as_ref()).map(OsString::as_os_str)
	}

	pub fn set(&mut self, name: impl Into<OsString>, value: impl Into<OsString>) {
		self.vars.insert(name.into(), value.into());
	}

	pub fn unset(&mut self, name: impl AsRef<OsStr>) {
		self.vars.remove(name.as_ref());
	}

	/// Applies `items` in order.
	pub fn modify(&mut self, items: &[EnvironmentItem]) {
		for item in items {
			match item {
				EnvironmentItem::Set { name, value } => self.set(name.clone(), value.clone()),
				EnvironmentItem::Unset { name } => self.unset(name),
				EnvironmentItem::Append { name, value } => {
					let joined = match self.get(name).filter(|current| !current.is_empty()) {
						Some(current) => join_path_list(current, value),
						None => value.clone(),
					};
					self.set(name.clone(), joined);
				}
				EnvironmentItem::Prepend { name, value } => {
					let joined = match self.get(name).filter(|current| !current.is_empty()) {
						Some(current) => join_path_list(value, current),
						None => value.clone(),
					};
					self.set(name.clone(), joined);
				}
			}
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
		self.vars.iter().map(|(name, value)| (name.as_os_str(), value.as_os_str()))
	}

	pub fn len(&self) -> usize {
		self.vars.len()
	}

	pub fn is_empty(&self) -> bool {
		self.vars.is_empty()
	}
}

fn join_path_list(head: &OsStr, tail: &OsStr) -> OsString {
	let mut joined = head.to_os_string();
	joined.push(PATH_LIST_SEPARATOR);
	joined.push(tail);
	joined
}
