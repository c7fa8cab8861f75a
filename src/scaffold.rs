use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::fixtures::{DEFAULT_FIXTURES, DEFAULT_FIXTURES_PATH};

pub fn scaffold() -> Result<()> {
	scaffold_in(Path::new("."))?;
	println!("Scaffolded ./{DEFAULT_FIXTURES_PATH} and ./.env.example");
	Ok(())
}

/// Writes the fixture file and env template under `root`, keeping existing files.
pub fn scaffold_in(root: &Path) -> Result<()> {
	let fixtures_path = root.join(DEFAULT_FIXTURES_PATH);
	if let Some(parent) = fixtures_path.parent() {
		fs::create_dir_all(parent).context("creating fixtures directory")?;
	}
	if !fixtures_path.exists() {
		fs::write(&fixtures_path, DEFAULT_FIXTURES)
			.with_context(|| format!("writing {}", fixtures_path.display()))?;
	}

	let env_path = root.join(".env.example");
	if !env_path.exists() {
		fs::write(&env_path, ENV_TEMPLATE)
			.with_context(|| format!("writing {}", env_path.display()))?;
	}

	Ok(())
}

pub const ENV_TEMPLATE: &str = r#"# Copy to .env and fill in.
APPWRITE_ENDPOINT=https://cloud.appwrite.io/v1
APPWRITE_PROJECT_ID=
APPWRITE_API_KEY=
APPWRITE_DATABASE_ID=
APPWRITE_BUCKET_ID=

# Optional overrides
# APPWRITE_CATEGORIES_COLLECTION_ID=categories
# APPWRITE_CUSTOMIZATIONS_COLLECTION_ID=customizations
# APPWRITE_MENU_COLLECTION_ID=menu
# APPWRITE_MENU_CUSTOMIZATIONS_COLLECTION_ID=menu_customizations
# APPWRITE_TIMEOUT_MS=30000
"#;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn scaffold_keeps_existing_files() {
		let root = std::env::temp_dir().join(format!("menuseed-scaffold-{}", std::process::id()));
		let _ = fs::remove_dir_all(&root);
		fs::create_dir_all(&root).expect("temp dir");
		fs::write(root.join(".env.example"), "KEEP=1\n").expect("write env");

		scaffold_in(&root).expect("scaffold should succeed");

		let env = fs::read_to_string(root.join(".env.example")).expect("read env");
		assert_eq!(env, "KEEP=1\n");
		let fixtures = fs::read_to_string(root.join(DEFAULT_FIXTURES_PATH)).expect("read fixtures");
		assert_eq!(fixtures, DEFAULT_FIXTURES);

		let _ = fs::remove_dir_all(&root);
	}
}
