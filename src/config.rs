use anyhow::{Context, Result, anyhow};

pub const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Collection ids of the four seeded collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collections {
	pub categories: String,
	pub customizations: String,
	pub menu: String,
	pub menu_customizations: String,
}

impl Default for Collections {
	fn default() -> Self {
		Self {
			categories: "categories".to_string(),
			customizations: "customizations".to_string(),
			menu: "menu".to_string(),
			menu_customizations: "menu_customizations".to_string(),
		}
	}
}

#[derive(Debug, Clone)]
pub struct AppwriteCfg {
	endpoint: String,
	project: String,
	api_key: String,
	database_id: String,
	bucket_id: String,
	collections: Collections,
	timeout_ms: u64,
}

impl AppwriteCfg {
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
		let required = |key: &str| get(key).ok_or_else(|| anyhow!("missing required env var {key}"));

		let endpoint = get("APPWRITE_ENDPOINT").unwrap_or(String::from(DEFAULT_ENDPOINT));
		let project = required("APPWRITE_PROJECT_ID")?;
		let api_key = required("APPWRITE_API_KEY")?;
		let database_id = required("APPWRITE_DATABASE_ID")?;
		let bucket_id = required("APPWRITE_BUCKET_ID")?;

		let defaults = Collections::default();
		let collections = Collections {
			categories: get("APPWRITE_CATEGORIES_COLLECTION_ID").unwrap_or(defaults.categories),
			customizations: get("APPWRITE_CUSTOMIZATIONS_COLLECTION_ID")
				.unwrap_or(defaults.customizations),
			menu: get("APPWRITE_MENU_COLLECTION_ID").unwrap_or(defaults.menu),
			menu_customizations: get("APPWRITE_MENU_CUSTOMIZATIONS_COLLECTION_ID")
				.unwrap_or(defaults.menu_customizations),
		};

		let timeout_ms = match get("APPWRITE_TIMEOUT_MS") {
			Some(raw) => raw
				.trim()
				.parse::<u64>()
				.with_context(|| format!("APPWRITE_TIMEOUT_MS is not a number: {raw}"))?,
			None => DEFAULT_TIMEOUT_MS,
		};

		Ok(Self {
			endpoint: endpoint.trim_end_matches('/').to_string(),
			project,
			api_key,
			database_id,
			bucket_id,
			collections,
			timeout_ms,
		})
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn project(&self) -> &str {
		&self.project
	}

	pub fn api_key(&self) -> &str {
		&self.api_key
	}

	pub fn database_id(&self) -> &str {
		&self.database_id
	}

	pub fn bucket_id(&self) -> &str {
		&self.bucket_id
	}

	pub fn collections(&self) -> &Collections {
		&self.collections
	}

	pub fn timeout_ms(&self) -> u64 {
		self.timeout_ms
	}
}
