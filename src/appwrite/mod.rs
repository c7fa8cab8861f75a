//! Seams to the remote backend: a document store and a blob store.
//!
//! [`AppwriteClient`] implements both over the REST API. The seeder only
//! sees the traits.

mod client;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

pub use client::AppwriteClient;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Document {
	#[serde(rename = "$id")]
	pub id: String,
	#[serde(flatten)]
	pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoredFile {
	#[serde(rename = "$id")]
	pub id: String,
	#[serde(default)]
	pub name: String,
	#[serde(default, rename = "mimeType")]
	pub mime_type: String,
	#[serde(default, rename = "sizeOriginal")]
	pub size: u64,
}

#[derive(Debug, Clone)]
pub struct FileUpload {
	pub name: String,
	pub mime_type: String,
	pub bytes: Vec<u8>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
	/// One page of documents; callers drain until empty.
	async fn list_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>>;

	async fn create_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
		data: Value,
	) -> Result<Document>;

	async fn delete_document(&self, database: &str, collection: &str, document_id: &str)
	-> Result<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
	/// One page of files; callers drain until empty.
	async fn list_files(&self, bucket: &str) -> Result<Vec<StoredFile>>;

	async fn create_file(&self, bucket: &str, file_id: &str, upload: FileUpload)
	-> Result<StoredFile>;

	async fn delete_file(&self, bucket: &str, file_id: &str) -> Result<()>;

	fn file_view_url(&self, bucket: &str, file_id: &str) -> String;
}
