use std::collections::HashMap;
use std::fmt;

use anyhow::{Result, anyhow};

macro_rules! document_id {
	($name:ident) => {
		#[derive(Debug, Clone, PartialEq, Eq, Hash)]
		pub struct $name(String);

		impl $name {
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}

		impl From<String> for $name {
			fn from(raw: String) -> Self {
				Self(raw)
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str(&self.0)
			}
		}
	};
}

document_id!(CategoryId);
document_id!(CustomizationId);
document_id!(MenuItemId);

/// Name to generated id, built while a run creates records.
#[derive(Debug, Clone)]
pub struct Lookup<Id> {
	kind: &'static str,
	entries: HashMap<String, Id>,
}

impl<Id> Lookup<Id> {
	pub fn new(kind: &'static str) -> Self {
		Self {
			kind,
			entries: HashMap::new(),
		}
	}

	pub fn insert(&mut self, name: &str, id: Id) {
		self.entries.insert(name.to_string(), id);
	}

	pub fn resolve(&self, name: &str) -> Result<&Id> {
		self.entries
			.get(name)
			.ok_or_else(|| anyhow!("{} \"{}\" not found", self.kind, name))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolve_names_the_missing_entry() {
		let mut lookup: Lookup<CategoryId> = Lookup::new("Category");
		lookup.insert("Burgers", CategoryId::from("c1".to_string()));

		assert_eq!(lookup.resolve("Burgers").unwrap().as_str(), "c1");
		assert_eq!(
			lookup.resolve("Tacos").unwrap_err().to_string(),
			"Category \"Tacos\" not found"
		);
	}
}
