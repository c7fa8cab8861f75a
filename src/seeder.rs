//! Reseeding by destruction: wipe the target collections and bucket, then
//! recreate categories, customizations, menu items and their join records.
//!
//! Only the clear phase and the join records of a single menu item fan out;
//! everything else runs in order so each lookup table is complete before
//! its dependents are created.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::appwrite::{BlobStore, Document, DocumentStore};
use crate::config::{AppwriteCfg, Collections};
use crate::core::{timestamp, unique_id};
use crate::fixtures::{Fixtures, MenuItem};
use crate::images::{ImageFetcher, ImageUploader};
use crate::logger::{chain_message, log_failure};
use crate::lookup::{CategoryId, CustomizationId, Lookup, MenuItemId};
use crate::report::{FailurePolicy, FailureRecord, SeedReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
	Initialization,
	ClearData,
	CreateCategories,
	CreateCustomizations,
	UploadImage(String),
	CreateMenuItem(String),
	CreateMenuCustomizations(String),
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Initialization => f.write_str("initialization"),
			Self::ClearData => f.write_str("clear data"),
			Self::CreateCategories => f.write_str("create categories"),
			Self::CreateCustomizations => f.write_str("create customizations"),
			Self::UploadImage(item) => write!(f, "upload image for {item}"),
			Self::CreateMenuItem(item) => write!(f, "create menu item {item}"),
			Self::CreateMenuCustomizations(item) => write!(f, "create customizations for {item}"),
		}
	}
}

#[derive(Debug, Error)]
#[error("seed failed during {phase}: {error:#}")]
pub struct SeedError {
	pub phase: Phase,
	pub error: anyhow::Error,
}

impl SeedError {
	fn new(phase: Phase, error: anyhow::Error) -> Self {
		Self { phase, error }
	}

	/// Tags and logs a failure that happened before the run started.
	pub fn initialization(error: anyhow::Error) -> Self {
		let phase = Phase::Initialization;
		log_failure(&phase.to_string(), &error);
		Self::new(phase, error)
	}
}

/// Work that can stop partway: how much completed, and the first error.
#[derive(Debug)]
struct Partial {
	done: usize,
	error: Option<anyhow::Error>,
}

/// Where the run writes.
#[derive(Debug, Clone)]
pub struct SeedTarget {
	pub database: String,
	pub bucket: String,
	pub collections: Collections,
}

impl SeedTarget {
	pub fn from_cfg(cfg: &AppwriteCfg) -> Self {
		Self {
			database: cfg.database_id().to_string(),
			bucket: cfg.bucket_id().to_string(),
			collections: cfg.collections().clone(),
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct SeedOpts {
	pub policy: FailurePolicy,
	pub upload_images: bool,
}

impl Default for SeedOpts {
	fn default() -> Self {
		Self {
			policy: FailurePolicy::FailFast,
			upload_images: true,
		}
	}
}

pub struct Seeder {
	docs: Arc<dyn DocumentStore>,
	blobs: Arc<dyn BlobStore>,
	images: ImageUploader,
	target: SeedTarget,
	opts: SeedOpts,
}

impl Seeder {
	pub fn new(
		docs: Arc<dyn DocumentStore>,
		blobs: Arc<dyn BlobStore>,
		fetcher: Arc<dyn ImageFetcher>,
		target: SeedTarget,
		opts: SeedOpts,
	) -> Self {
		let images = ImageUploader::new(fetcher, blobs.clone(), &target.bucket);
		Self {
			docs,
			blobs,
			images,
			target,
			opts,
		}
	}

	pub async fn run(&self, fixtures: &Fixtures) -> Result<SeedReport, SeedError> {
		let run_start = Instant::now();
		let mut report = self.new_report();

		println!("Seed starting...");
		println!("Clearing existing data...");
		self.clear_into(&mut report).await?;

		println!("Creating categories...");
		let categories = self.create_categories(fixtures, &mut report).await?;

		println!("Creating customizations...");
		let customizations = self.create_customizations(fixtures, &mut report).await?;

		println!("Creating menu items...");
		self.create_menu_items(fixtures, &categories, &customizations, &mut report)
			.await?;

		report.finished_at = timestamp();
		report.duration_ms = run_start.elapsed().as_millis();
		println!(
			"Seeding finished in {:.2}s",
			run_start.elapsed().as_secs_f64()
		);
		Ok(report)
	}

	/// Runs only the clear phase.
	pub async fn clear(&self) -> Result<SeedReport, SeedError> {
		let run_start = Instant::now();
		let mut report = self.new_report();
		self.clear_into(&mut report).await?;
		report.finished_at = timestamp();
		report.duration_ms = run_start.elapsed().as_millis();
		Ok(report)
	}

	fn new_report(&self) -> SeedReport {
		SeedReport {
			started_at: timestamp(),
			policy: self.opts.policy,
			..SeedReport::default()
		}
	}

	/// Logs the failure, then aborts or records it depending on the policy.
	fn fail(
		&self,
		report: &mut SeedReport,
		phase: Phase,
		error: anyhow::Error,
	) -> Result<(), SeedError> {
		log_failure(&phase.to_string(), &error);
		match self.opts.policy {
			FailurePolicy::FailFast => Err(SeedError::new(phase, error)),
			FailurePolicy::Continue => {
				report.failures.push(FailureRecord {
					phase: phase.to_string(),
					message: chain_message(&error),
				});
				Ok(())
			}
		}
	}

	async fn clear_into(&self, report: &mut SeedReport) -> Result<(), SeedError> {
		let c = &self.target.collections;
		let (categories, customizations, menu, menu_customizations, storage) = tokio::join!(
			self.clear_collection(&c.categories),
			self.clear_collection(&c.customizations),
			self.clear_collection(&c.menu),
			self.clear_collection(&c.menu_customizations),
			self.clear_storage(),
		);

		let collections = [
			("categories", categories),
			("customizations", customizations),
			("menu", menu),
			("menu customizations", menu_customizations),
		];
		for (label, outcome) in collections {
			report.documents_deleted += outcome.done;
			if let Some(err) = outcome.error {
				self.fail(
					report,
					Phase::ClearData,
					err.context(format!("Failed to clear {label}")),
				)?;
			}
		}

		report.files_deleted += storage.done;
		if let Some(err) = storage.error {
			self.fail(
				report,
				Phase::ClearData,
				err.context("Failed to clear storage"),
			)?;
		}

		tracing::debug!(
			documents = report.documents_deleted,
			files = report.files_deleted,
			"cleared existing data"
		);
		Ok(())
	}

	async fn clear_collection(&self, collection: &str) -> Partial {
		let mut deleted = HashSet::new();
		let error = self.drain_collection(collection, &mut deleted).await.err();
		Partial {
			done: deleted.len(),
			error,
		}
	}

	/// Deletes page after page until the listing comes back empty.
	async fn drain_collection(&self, collection: &str, deleted: &mut HashSet<String>) -> Result<()> {
		loop {
			let page = self
				.docs
				.list_documents(&self.target.database, collection)
				.await?;
			if page.is_empty() {
				return Ok(());
			}
			ensure_progress(deleted, page.iter().map(|d| d.id.as_str()))?;

			let mut tasks = JoinSet::new();
			for doc in page {
				let docs = self.docs.clone();
				let database = self.target.database.clone();
				let collection = collection.to_string();
				tasks.spawn(async move {
					let id = doc.id;
					docs.delete_document(&database, &collection, &id).await?;
					Ok::<_, anyhow::Error>(id)
				});
			}
			let (ids, error) = join_all(tasks).await;
			deleted.extend(ids);
			if let Some(err) = error {
				return Err(err);
			}
		}
	}

	async fn clear_storage(&self) -> Partial {
		let mut deleted = HashSet::new();
		let error = self.drain_storage(&mut deleted).await.err();
		Partial {
			done: deleted.len(),
			error,
		}
	}

	async fn drain_storage(&self, deleted: &mut HashSet<String>) -> Result<()> {
		loop {
			let page = self.blobs.list_files(&self.target.bucket).await?;
			if page.is_empty() {
				return Ok(());
			}
			ensure_progress(deleted, page.iter().map(|f| f.id.as_str()))?;

			let mut tasks = JoinSet::new();
			for file in page {
				let blobs = self.blobs.clone();
				let bucket = self.target.bucket.clone();
				tasks.spawn(async move {
					let id = file.id;
					blobs.delete_file(&bucket, &id).await?;
					Ok::<_, anyhow::Error>(id)
				});
			}
			let (ids, error) = join_all(tasks).await;
			deleted.extend(ids);
			if let Some(err) = error {
				return Err(err);
			}
		}
	}

	async fn create(&self, collection: &str, data: Value) -> Result<Document> {
		let doc = self
			.docs
			.create_document(&self.target.database, collection, &unique_id(), data)
			.await?;
		tracing::debug!(collection, id = %doc.id, fields = doc.data.len(), "document created");
		Ok(doc)
	}

	async fn create_categories(
		&self,
		fixtures: &Fixtures,
		report: &mut SeedReport,
	) -> Result<Lookup<CategoryId>, SeedError> {
		let mut lookup = Lookup::new("Category");
		let total = fixtures.categories.len();

		for (index, category) in fixtures.categories.iter().enumerate() {
			let data = json!({
				"name": category.name,
				"description": category.description,
			});
			match self.create(&self.target.collections.categories, data).await {
				Ok(doc) => {
					lookup.insert(&category.name, CategoryId::from(doc.id));
					report.categories_created += 1;
					println!("Created category {}/{}: {}", index + 1, total, category.name);
				}
				Err(err) => self.fail(
					report,
					Phase::CreateCategories,
					err.context(format!("Failed to create category \"{}\"", category.name)),
				)?,
			}
		}

		Ok(lookup)
	}

	async fn create_customizations(
		&self,
		fixtures: &Fixtures,
		report: &mut SeedReport,
	) -> Result<Lookup<CustomizationId>, SeedError> {
		let mut lookup = Lookup::new("Customization");
		let total = fixtures.customizations.len();

		for (index, customization) in fixtures.customizations.iter().enumerate() {
			let data = json!({
				"name": customization.name,
				"price": customization.price,
				"type": customization.kind.as_str(),
			});
			match self
				.create(&self.target.collections.customizations, data)
				.await
			{
				Ok(doc) => {
					lookup.insert(&customization.name, CustomizationId::from(doc.id));
					report.customizations_created += 1;
					println!(
						"Created customization {}/{}: {}",
						index + 1,
						total,
						customization.name
					);
				}
				Err(err) => self.fail(
					report,
					Phase::CreateCustomizations,
					err.context(format!(
						"Failed to create customization \"{}\"",
						customization.name
					)),
				)?,
			}
		}

		Ok(lookup)
	}

	async fn create_menu_items(
		&self,
		fixtures: &Fixtures,
		categories: &Lookup<CategoryId>,
		customizations: &Lookup<CustomizationId>,
		report: &mut SeedReport,
	) -> Result<(), SeedError> {
		let total = fixtures.menu.len();

		for (index, item) in fixtures.menu.iter().enumerate() {
			match self
				.create_menu_item(item, categories, customizations, report)
				.await
			{
				Ok(links) => {
					println!("Created menu item {}/{}: {}", index + 1, total, item.name);
					if links > 0 {
						println!("   -> added {links} customizations");
					}
				}
				Err(SeedError { phase, error }) => self.fail(
					report,
					phase,
					error.context(format!("Failed to process menu item \"{}\"", item.name)),
				)?,
			}
		}

		Ok(())
	}

	/// Uploads the image, creates the menu document and links its
	/// customizations. Returns the number of join records created.
	async fn create_menu_item(
		&self,
		item: &MenuItem,
		categories: &Lookup<CategoryId>,
		customizations: &Lookup<CustomizationId>,
		report: &mut SeedReport,
	) -> Result<usize, SeedError> {
		let category = categories
			.resolve(&item.category_name)
			.map_err(|err| SeedError::new(Phase::CreateMenuItem(item.name.clone()), err))?;

		let image_url = if self.opts.upload_images {
			let uploaded = self.images.upload(&item.image_url).await;
			match uploaded {
				Some(_) => report.images_uploaded += 1,
				None => {
					report.images_missing += 1;
					let operation = Phase::UploadImage(item.name.clone()).to_string();
					tracing::warn!(operation = %operation, "continuing without image");
				}
			}
			uploaded
		} else {
			report.images_skipped += 1;
			None
		};

		let data = json!({
			"name": item.name,
			"description": item.description,
			"image_url": image_url,
			"price": item.price,
			"rating": item.rating,
			"calories": item.calories,
			"protein": item.protein,
			"categories": category.as_str(),
		});
		let doc = self
			.create(&self.target.collections.menu, data)
			.await
			.map_err(|err| SeedError::new(Phase::CreateMenuItem(item.name.clone()), err))?;
		let menu_id = MenuItemId::from(doc.id);
		report.menu_items_created += 1;

		let links = self
			.link_customizations(item, &menu_id, customizations)
			.await;
		report.menu_customizations_created += links.done;
		match links.error {
			Some(err) => Err(SeedError::new(
				Phase::CreateMenuCustomizations(item.name.clone()),
				err,
			)),
			None => Ok(links.done),
		}
	}

	async fn link_customizations(
		&self,
		item: &MenuItem,
		menu_id: &MenuItemId,
		customizations: &Lookup<CustomizationId>,
	) -> Partial {
		let resolved = item
			.customizations
			.iter()
			.map(|name| {
				customizations
					.resolve(name)
					.cloned()
					.map_err(|err| anyhow!("{err} for menu item \"{}\"", item.name))
			})
			.collect::<Result<Vec<_>>>();
		let ids = match resolved {
			Ok(ids) => ids,
			Err(err) => {
				return Partial {
					done: 0,
					error: Some(err),
				};
			}
		};

		let mut tasks = JoinSet::new();
		for customization in ids {
			let docs = self.docs.clone();
			let database = self.target.database.clone();
			let collection = self.target.collections.menu_customizations.clone();
			let data = json!({
				"menu": menu_id.as_str(),
				"customizations": customization.as_str(),
			});
			tasks.spawn(async move {
				docs.create_document(&database, &collection, &unique_id(), data)
					.await
					.with_context(|| format!("linking customization {customization}"))
			});
		}

		let (created, error) = join_all(tasks).await;
		Partial {
			done: created.len(),
			error,
		}
	}
}

/// A listing that repeats an id we already deleted would loop forever.
fn ensure_progress<'a>(
	deleted: &HashSet<String>,
	mut ids: impl Iterator<Item = &'a str>,
) -> Result<()> {
	if let Some(id) = ids.find(|id| deleted.contains(*id)) {
		bail!("{id} is still listed after deletion");
	}
	Ok(())
}

/// Waits for every task, even after one fails, so the successes are known
/// exactly. Returns them with the first error seen.
async fn join_all<T: Send + 'static>(
	mut tasks: JoinSet<Result<T>>,
) -> (Vec<T>, Option<anyhow::Error>) {
	let mut out = Vec::with_capacity(tasks.len());
	let mut first_error = None;
	while let Some(joined) = tasks.join_next().await {
		let failure = match joined {
			Ok(Ok(value)) => {
				out.push(value);
				continue;
			}
			Ok(Err(err)) => err,
			Err(join_err) => anyhow!("task failed: {join_err}"),
		};
		first_error.get_or_insert(failure);
	}
	(out, first_error)
}
