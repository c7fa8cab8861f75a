//! In-memory stand-ins for the remote backend and image hosts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde_json::Value;

use crate::appwrite::{BlobStore, Document, DocumentStore, FileUpload, StoredFile};
use crate::images::{FetchedImage, ImageFetcher};

/// Listing returns at most this many records, like the remote default page.
pub const PAGE_SIZE: usize = 25;

#[derive(Default)]
pub struct MemoryBackend {
	documents: Mutex<BTreeMap<(String, String), Vec<Document>>>,
	files: Mutex<BTreeMap<String, Vec<StoredFile>>>,
	failing_names: Mutex<HashSet<String>>,
	failing_uploads: AtomicBool,
	failing_file_listing: AtomicBool,
}

impl MemoryBackend {
	pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
		self.documents
			.lock()
			.unwrap()
			.get(&(database.to_string(), collection.to_string()))
			.cloned()
			.unwrap_or_default()
	}

	pub fn files(&self, bucket: &str) -> Vec<StoredFile> {
		self.files.lock().unwrap().get(bucket).cloned().unwrap_or_default()
	}

	pub fn insert_document(&self, database: &str, collection: &str, id: &str, data: Value) {
		let doc = to_document(id, data);
		self.documents
			.lock()
			.unwrap()
			.entry((database.to_string(), collection.to_string()))
			.or_default()
			.push(doc);
	}

	pub fn insert_file(&self, bucket: &str, id: &str) {
		self.files
			.lock()
			.unwrap()
			.entry(bucket.to_string())
			.or_default()
			.push(StoredFile {
				id: id.to_string(),
				name: format!("{id}.png"),
				mime_type: "image/png".to_string(),
				size: 3,
			});
	}

	/// Creating a document whose `name` field equals `name` fails.
	pub fn fail_name(&self, name: &str) {
		self.failing_names.lock().unwrap().insert(name.to_string());
	}

	pub fn fail_uploads(&self) {
		self.failing_uploads.store(true, Ordering::SeqCst);
	}

	pub fn fail_file_listing(&self) {
		self.failing_file_listing.store(true, Ordering::SeqCst);
	}
}

fn to_document(id: &str, data: Value) -> Document {
	let data = match data {
		Value::Object(map) => map,
		_ => serde_json::Map::new(),
	};
	Document {
		id: id.to_string(),
		data,
	}
}

#[async_trait]
impl DocumentStore for MemoryBackend {
	async fn list_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
		let mut docs = self.documents(database, collection);
		docs.truncate(PAGE_SIZE);
		Ok(docs)
	}

	async fn create_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
		data: Value,
	) -> Result<Document> {
		if let Some(name) = data.get("name").and_then(Value::as_str) {
			if self.failing_names.lock().unwrap().contains(name) {
				bail!("status 400: invalid document \"{name}\"");
			}
		}

		let mut documents = self.documents.lock().unwrap();
		let docs = documents
			.entry((database.to_string(), collection.to_string()))
			.or_default();
		if docs.iter().any(|d| d.id == document_id) {
			bail!("status 409: document {document_id} already exists");
		}
		let doc = to_document(document_id, data);
		docs.push(doc.clone());
		Ok(doc)
	}

	async fn delete_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
	) -> Result<()> {
		let mut documents = self.documents.lock().unwrap();
		let docs = documents
			.get_mut(&(database.to_string(), collection.to_string()))
			.ok_or_else(|| anyhow!("status 404: collection {collection} not found"))?;
		let before = docs.len();
		docs.retain(|d| d.id != document_id);
		if docs.len() == before {
			bail!("status 404: document {document_id} not found");
		}
		Ok(())
	}
}

#[async_trait]
impl BlobStore for MemoryBackend {
	async fn list_files(&self, bucket: &str) -> Result<Vec<StoredFile>> {
		if self.failing_file_listing.load(Ordering::SeqCst) {
			bail!("status 503: storage unavailable");
		}
		let mut files = self.files(bucket);
		files.truncate(PAGE_SIZE);
		Ok(files)
	}

	async fn create_file(
		&self,
		bucket: &str,
		file_id: &str,
		upload: FileUpload,
	) -> Result<StoredFile> {
		if self.failing_uploads.load(Ordering::SeqCst) {
			bail!("status 500: storage full");
		}
		let file = StoredFile {
			id: file_id.to_string(),
			name: upload.name,
			mime_type: upload.mime_type,
			size: upload.bytes.len() as u64,
		};
		self.files
			.lock()
			.unwrap()
			.entry(bucket.to_string())
			.or_default()
			.push(file.clone());
		Ok(file)
	}

	async fn delete_file(&self, bucket: &str, file_id: &str) -> Result<()> {
		let mut files = self.files.lock().unwrap();
		let list = files
			.get_mut(bucket)
			.ok_or_else(|| anyhow!("status 404: bucket {bucket} not found"))?;
		let before = list.len();
		list.retain(|f| f.id != file_id);
		if list.len() == before {
			bail!("status 404: file {file_id} not found");
		}
		Ok(())
	}

	fn file_view_url(&self, bucket: &str, file_id: &str) -> String {
		format!("memory://{bucket}/{file_id}")
	}
}

/// Wraps a backend and fails chosen document writes after the fact.
pub struct FlakyDocuments {
	inner: Arc<MemoryBackend>,
	failing_create: Option<(String, usize)>,
	creates: AtomicUsize,
	failing_delete: Option<String>,
}

impl FlakyDocuments {
	pub fn new(inner: Arc<MemoryBackend>) -> Self {
		Self {
			inner,
			failing_create: None,
			creates: AtomicUsize::new(0),
			failing_delete: None,
		}
	}

	/// The `nth` create (1-based) in `collection` fails.
	pub fn fail_create(mut self, collection: &str, nth: usize) -> Self {
		self.failing_create = Some((collection.to_string(), nth));
		self
	}

	pub fn fail_delete(mut self, document_id: &str) -> Self {
		self.failing_delete = Some(document_id.to_string());
		self
	}
}

#[async_trait]
impl DocumentStore for FlakyDocuments {
	async fn list_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
		self.inner.list_documents(database, collection).await
	}

	async fn create_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
		data: Value,
	) -> Result<Document> {
		if let Some((failing, nth)) = &self.failing_create {
			if failing == collection && self.creates.fetch_add(1, Ordering::SeqCst) + 1 == *nth {
				bail!("status 503: write to {collection} timed out");
			}
		}
		self.inner
			.create_document(database, collection, document_id, data)
			.await
	}

	async fn delete_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
	) -> Result<()> {
		if self.failing_delete.as_deref() == Some(document_id) {
			bail!("status 500: could not delete {document_id}");
		}
		self.inner
			.delete_document(database, collection, document_id)
			.await
	}
}

/// Serves canned responses by URL; unknown URLs fail like a DNS error.
#[derive(Default)]
pub struct StaticFetcher {
	responses: HashMap<String, FetchedImage>,
}

impl StaticFetcher {
	pub fn with_image(mut self, url: &str, bytes: &[u8], content_type: Option<&str>) -> Self {
		self.responses.insert(
			url.to_string(),
			FetchedImage {
				status: 200,
				content_type: content_type.map(str::to_string),
				bytes: bytes.to_vec(),
			},
		);
		self
	}

	pub fn with_status(mut self, url: &str, status: u16) -> Self {
		self.responses.insert(
			url.to_string(),
			FetchedImage {
				status,
				content_type: Some("text/html".to_string()),
				bytes: b"<html>error</html>".to_vec(),
			},
		);
		self
	}
}

#[async_trait]
impl ImageFetcher for StaticFetcher {
	async fn fetch(&self, url: &str) -> Result<FetchedImage> {
		self.responses
			.get(url)
			.cloned()
			.ok_or_else(|| anyhow!("request to {url} failed: host not found"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn deleting_a_missing_file_is_not_found() {
		let backend = MemoryBackend::default();
		backend.insert_file("assets", "f1");

		backend.delete_file("assets", "f1").await.expect("file exists");
		let err = backend.delete_file("assets", "f1").await.unwrap_err();
		assert_eq!(err.to_string(), "status 404: file f1 not found");
		assert!(backend.delete_file("other", "f1").await.is_err());
	}
}
