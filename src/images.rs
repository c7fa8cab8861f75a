use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;

use crate::appwrite::{BlobStore, FileUpload};
use crate::core::{now_millis, unique_id};

pub const FALLBACK_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct FetchedImage {
	pub status: u16,
	pub content_type: Option<String>,
	pub bytes: Vec<u8>,
}

/// Downloads source images. Non-2xx responses are returned, not raised.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
	async fn fetch(&self, url: &str) -> Result<FetchedImage>;
}

pub struct HttpFetcher {
	http: reqwest::Client,
}

impl HttpFetcher {
	pub fn new(timeout_ms: u64) -> Result<Self> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_millis(timeout_ms))
			.build()
			.context("building image client")?;
		Ok(Self { http })
	}
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
	async fn fetch(&self, url: &str) -> Result<FetchedImage> {
		let parsed = Url::parse(url).with_context(|| format!("invalid image URL '{url}'"))?;
		let resp = self
			.http
			.get(parsed)
			.send()
			.await
			.with_context(|| format!("request to {url} failed"))?;

		let status = resp.status().as_u16();
		let content_type = resp
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|v| v.to_str().ok())
			.map(|v| v.to_string());
		let bytes = resp.bytes().await.context("reading image body")?.to_vec();

		Ok(FetchedImage {
			status,
			content_type,
			bytes,
		})
	}
}

pub struct ImageUploader {
	fetcher: Arc<dyn ImageFetcher>,
	blobs: Arc<dyn BlobStore>,
	bucket: String,
}

impl ImageUploader {
	pub fn new(fetcher: Arc<dyn ImageFetcher>, blobs: Arc<dyn BlobStore>, bucket: &str) -> Self {
		Self {
			fetcher,
			blobs,
			bucket: bucket.to_string(),
		}
	}

	/// Re-hosts `image_url` in the bucket and returns its view URL.
	/// Any failure is logged and yields `None`.
	pub async fn upload(&self, image_url: &str) -> Option<String> {
		match self.try_upload(image_url).await {
			Ok(view_url) => Some(view_url),
			Err(err) => {
				let error = format!("{err:#}");
				tracing::warn!(image_url, error = %error, "image upload failed");
				None
			}
		}
	}

	async fn try_upload(&self, image_url: &str) -> Result<String> {
		if image_url.trim().is_empty() {
			bail!("no image URL provided");
		}

		let image = self.fetcher.fetch(image_url).await?;
		if !(200..300).contains(&image.status) {
			bail!("failed to fetch image, status {}", image.status);
		}
		if image.bytes.is_empty() {
			bail!("fetched image is empty");
		}

		let upload = FileUpload {
			name: file_name_for(image_url),
			mime_type: image
				.content_type
				.filter(|v| !v.trim().is_empty())
				.unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string()),
			bytes: image.bytes,
		};
		let file = self
			.blobs
			.create_file(&self.bucket, &unique_id(), upload)
			.await
			.context("uploading image to storage")?;
		tracing::debug!(
			image_url,
			file_id = %file.id,
			name = %file.name,
			mime_type = %file.mime_type,
			size = file.size,
			"image uploaded"
		);

		Ok(self.blobs.file_view_url(&self.bucket, &file.id))
	}
}

/// Last path segment of the URL, or `file-<millis>.jpg` when there is none.
pub fn file_name_for(image_url: &str) -> String {
	let path = image_url.split(['?', '#']).next().unwrap_or_default();
	match path.rsplit('/').next() {
		Some(segment) if !segment.is_empty() && !segment.ends_with(':') => segment.to_string(),
		_ => format!("file-{}.jpg", now_millis()),
	}
}
