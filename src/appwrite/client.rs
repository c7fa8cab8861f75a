use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::AppwriteCfg;

use super::{BlobStore, Document, DocumentStore, FileUpload, StoredFile};

#[derive(Debug, Deserialize)]
struct DocumentList {
	documents: Vec<Document>,
}

#[derive(Debug, Deserialize)]
struct FileList {
	files: Vec<StoredFile>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
	message: String,
}

#[derive(Debug, Clone)]
pub struct AppwriteClient {
	http: reqwest::Client,
	endpoint: String,
	project: String,
}

impl AppwriteClient {
	pub fn new(cfg: &AppwriteCfg) -> Result<Self> {
		let mut headers = HeaderMap::new();
		headers.insert(
			"x-appwrite-project",
			HeaderValue::from_str(cfg.project()).context("invalid project id header")?,
		);
		let mut key = HeaderValue::from_str(cfg.api_key()).context("invalid api key header")?;
		key.set_sensitive(true);
		headers.insert("x-appwrite-key", key);

		let http = reqwest::Client::builder()
			.default_headers(headers)
			.timeout(Duration::from_millis(cfg.timeout_ms()))
			.build()
			.context("building Appwrite client")?;

		Ok(Self {
			http,
			endpoint: cfg.endpoint().trim_end_matches('/').to_string(),
			project: cfg.project().to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.endpoint, path)
	}

	fn documents_path(database: &str, collection: &str) -> String {
		format!("/databases/{database}/collections/{collection}/documents")
	}

	fn files_path(bucket: &str) -> String {
		format!("/storage/buckets/{bucket}/files")
	}
}

/// Turns a non-2xx response into an error carrying the server's message.
async fn check(resp: Response, what: &str) -> Result<Response> {
	let status = resp.status();
	if status.is_success() {
		return Ok(resp);
	}

	let body = resp.text().await.unwrap_or_default();
	bail!("{what} failed: {}", describe_failure(status, &body))
}

fn describe_failure(status: StatusCode, body: &str) -> String {
	let message = serde_json::from_str::<ErrorBody>(body)
		.map(|e| e.message)
		.unwrap_or_else(|_| body.trim().to_string());
	if message.is_empty() {
		format!("status {}", status.as_u16())
	} else {
		format!("status {}: {}", status.as_u16(), message)
	}
}

#[async_trait]
impl DocumentStore for AppwriteClient {
	async fn list_documents(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
		let url = self.url(&Self::documents_path(database, collection));
		let resp = self
			.http
			.get(&url)
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;
		let list: DocumentList = check(resp, "listing documents")
			.await?
			.json()
			.await
			.context("decoding document list")?;
		Ok(list.documents)
	}

	async fn create_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
		data: Value,
	) -> Result<Document> {
		let url = self.url(&Self::documents_path(database, collection));
		let resp = self
			.http
			.post(&url)
			.json(&json!({ "documentId": document_id, "data": data }))
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;
		check(resp, "creating document")
			.await?
			.json()
			.await
			.context("decoding created document")
	}

	async fn delete_document(
		&self,
		database: &str,
		collection: &str,
		document_id: &str,
	) -> Result<()> {
		let url = self.url(&format!(
			"{}/{document_id}",
			Self::documents_path(database, collection)
		));
		let resp = self
			.http
			.delete(&url)
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;
		check(resp, "deleting document").await?;
		Ok(())
	}
}

#[async_trait]
impl BlobStore for AppwriteClient {
	async fn list_files(&self, bucket: &str) -> Result<Vec<StoredFile>> {
		let url = self.url(&Self::files_path(bucket));
		let resp = self
			.http
			.get(&url)
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;
		let list: FileList = check(resp, "listing files")
			.await?
			.json()
			.await
			.context("decoding file list")?;
		Ok(list.files)
	}

	async fn create_file(
		&self,
		bucket: &str,
		file_id: &str,
		upload: FileUpload,
	) -> Result<StoredFile> {
		let url = self.url(&Self::files_path(bucket));
		let part = Part::bytes(upload.bytes)
			.file_name(upload.name)
			.mime_str(&upload.mime_type)
			.with_context(|| format!("invalid mime type '{}'", upload.mime_type))?;
		let form = Form::new().text("fileId", file_id.to_string()).part("file", part);

		let resp = self
			.http
			.post(&url)
			.multipart(form)
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;
		check(resp, "uploading file")
			.await?
			.json()
			.await
			.context("decoding uploaded file")
	}

	async fn delete_file(&self, bucket: &str, file_id: &str) -> Result<()> {
		let url = self.url(&format!("{}/{file_id}", Self::files_path(bucket)));
		let resp = self
			.http
			.delete(&url)
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;
		check(resp, "deleting file").await?;
		Ok(())
	}

	fn file_view_url(&self, bucket: &str, file_id: &str) -> String {
		format!(
			"{}{}/{file_id}/view?project={}",
			self.endpoint,
			Self::files_path(bucket),
			self.project
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn client() -> AppwriteClient {
		let cfg = AppwriteCfg::from_lookup(|key| {
			let value = match key {
				"APPWRITE_ENDPOINT" => "https://backend.test/v1/",
				"APPWRITE_PROJECT_ID" => "food",
				"APPWRITE_API_KEY" => "secret",
				"APPWRITE_DATABASE_ID" => "main",
				"APPWRITE_BUCKET_ID" => "assets",
				_ => return None,
			};
			Some(value.to_string())
		})
		.expect("config should load");
		AppwriteClient::new(&cfg).expect("client should build")
	}

	#[test]
	fn view_url_points_at_bucket_file() {
		assert_eq!(
			client().file_view_url("assets", "abc123"),
			"https://backend.test/v1/storage/buckets/assets/files/abc123/view?project=food"
		);
	}

	#[test]
	fn failure_prefers_server_message() {
		let body = r#"{"message":"Collection with the requested ID could not be found.","code":404}"#;
		assert_eq!(
			describe_failure(StatusCode::NOT_FOUND, body),
			"status 404: Collection with the requested ID could not be found."
		);
		assert_eq!(describe_failure(StatusCode::BAD_GATEWAY, ""), "status 502");
	}

	#[test]
	fn document_decodes_id_and_fields() {
		let doc: Document =
			serde_json::from_str(r#"{"$id":"d1","$collectionId":"menu","name":"Fries"}"#)
				.expect("document should decode");
		assert_eq!(doc.id, "d1");
		assert_eq!(doc.data.get("name"), Some(&Value::from("Fries")));
	}
}
