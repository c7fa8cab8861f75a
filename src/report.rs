use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
	/// Abort the run on the first failure.
	#[default]
	FailFast,
	/// Record the failure and move on to the next record.
	Continue,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FailureRecord {
	pub phase: String,
	pub message: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct SeedReport {
	pub started_at: String,
	pub finished_at: String,
	pub duration_ms: u128,
	pub policy: FailurePolicy,
	pub documents_deleted: usize,
	pub files_deleted: usize,
	pub categories_created: usize,
	pub customizations_created: usize,
	pub menu_items_created: usize,
	pub menu_customizations_created: usize,
	pub images_uploaded: usize,
	pub images_missing: usize,
	pub images_skipped: usize,
	pub failures: Vec<FailureRecord>,
}

impl SeedReport {
	pub fn succeeded(&self) -> bool {
		self.failures.is_empty()
	}
}

pub fn print_human_report(report: &SeedReport) {
	println!("Seed summary:");
	println!(
		"  cleared: {} documents, {} files",
		report.documents_deleted, report.files_deleted
	);
	println!(
		"  created: {} categories, {} customizations, {} menu items, {} menu customizations",
		report.categories_created,
		report.customizations_created,
		report.menu_items_created,
		report.menu_customizations_created
	);
	println!(
		"  images: {} uploaded, {} missing, {} skipped",
		report.images_uploaded, report.images_missing, report.images_skipped
	);
	println!("  duration_ms: {}", report.duration_ms);

	for failure in &report.failures {
		println!("  FAIL ({}) {}", failure.phase, failure.message);
	}
}

pub fn write_json_report(path: &Path, report: &SeedReport) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.with_context(|| format!("creating report directory {}", parent.display()))?;
	}
	let raw = serde_json::to_string_pretty(report).context("serializing report json")?;
	fs::write(path, format!("{raw}\n"))
		.with_context(|| format!("writing report file {}", path.display()))?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn json_report_is_serializable() {
		let report = SeedReport {
			policy: FailurePolicy::Continue,
			menu_items_created: 3,
			failures: vec![FailureRecord {
				phase: "create menu item Fries".into(),
				message: "status 500".into(),
			}],
			..SeedReport::default()
		};
		let encoded = serde_json::to_string(&report).expect("serialization should work");
		assert!(encoded.contains("\"menu_items_created\":3"));
		assert!(encoded.contains("\"policy\":\"continue\""));
		assert!(!report.succeeded());
	}
}
