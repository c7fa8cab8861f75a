use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::core::display;

pub const DEFAULT_FIXTURES_PATH: &str = "seed/menu.toml";
pub const DEFAULT_FIXTURES: &str = include_str!("../seed/menu.toml");

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Category {
	pub name: String,
	pub description: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Customization {
	pub name: String,
	pub price: f64,
	#[serde(rename = "type")]
	pub kind: CustomizationKind,
}

/// Known customization types; anything else is kept as written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum CustomizationKind {
	Topping,
	Side,
	Size,
	Crust,
	Other(String),
}

impl From<String> for CustomizationKind {
	fn from(raw: String) -> Self {
		match raw.as_str() {
			"topping" => Self::Topping,
			"side" => Self::Side,
			"size" => Self::Size,
			"crust" => Self::Crust,
			_ => Self::Other(raw),
		}
	}
}

impl From<CustomizationKind> for String {
	fn from(kind: CustomizationKind) -> Self {
		kind.as_str().to_string()
	}
}

impl CustomizationKind {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Topping => "topping",
			Self::Side => "side",
			Self::Size => "size",
			Self::Crust => "crust",
			Self::Other(raw) => raw,
		}
	}
}

impl fmt::Display for CustomizationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MenuItem {
	pub name: String,
	pub description: String,
	pub image_url: String,
	pub price: f64,
	pub rating: f64,
	pub calories: u32,
	pub protein: u32,
	pub category_name: String,
	#[serde(default)]
	pub customizations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Fixtures {
	#[serde(default)]
	pub categories: Vec<Category>,
	#[serde(default)]
	pub customizations: Vec<Customization>,
	#[serde(default)]
	pub menu: Vec<MenuItem>,
}

impl Fixtures {
	pub fn embedded() -> Result<Self> {
		Self::parse(DEFAULT_FIXTURES).context("parsing embedded fixtures")
	}

	pub fn parse(raw: &str) -> Result<Self> {
		Ok(toml::from_str(raw)?)
	}

	pub fn from_file(path: &Path) -> Result<Self> {
		let raw = fs::read_to_string(path).with_context(|| format!("reading {}", display(path)))?;
		Self::parse(&raw).with_context(|| format!("parsing {}", display(path)))
	}

	/// Explicit path, else `seed/menu.toml` when present, else the embedded set.
	pub fn resolve(path: Option<&Path>) -> Result<(Self, String)> {
		if let Some(path) = path {
			return Ok((Self::from_file(path)?, display(path)));
		}

		let default_path = Path::new(DEFAULT_FIXTURES_PATH);
		if default_path.exists() {
			return Ok((Self::from_file(default_path)?, display(default_path)));
		}

		Ok((Self::embedded()?, "embedded fixtures".to_string()))
	}

	pub fn join_record_count(&self) -> usize {
		self.menu.iter().map(|item| item.customizations.len()).sum()
	}

	/// Checks names and cross-references, reporting every problem at once.
	pub fn validate(&self) -> Result<()> {
		let mut problems = Vec::new();

		let categories = unique_names(
			"category",
			self.categories.iter().map(|c| c.name.as_str()),
			&mut problems,
		);
		let customizations = unique_names(
			"customization",
			self.customizations.iter().map(|c| c.name.as_str()),
			&mut problems,
		);
		unique_names(
			"menu item",
			self.menu.iter().map(|m| m.name.as_str()),
			&mut problems,
		);

		for item in &self.menu {
			if !categories.contains(item.category_name.as_str()) {
				problems.push(format!(
					"menu item \"{}\" references unknown category \"{}\"",
					item.name, item.category_name
				));
			}
			for name in &item.customizations {
				if !customizations.contains(name.as_str()) {
					problems.push(format!(
						"menu item \"{}\" references unknown customization \"{}\"",
						item.name, name
					));
				}
			}
		}

		if !problems.is_empty() {
			bail!("invalid fixtures:\n  - {}", problems.join("\n  - "));
		}
		Ok(())
	}
}

fn unique_names<'a>(
	kind: &str,
	names: impl Iterator<Item = &'a str>,
	problems: &mut Vec<String>,
) -> HashSet<&'a str> {
	let mut seen = HashSet::new();
	for name in names {
		if name.trim().is_empty() {
			problems.push(format!("{kind} with empty name"));
			continue;
		}
		if !seen.insert(name) {
			problems.push(format!("duplicate {kind} \"{name}\""));
		}
	}
	seen
}
