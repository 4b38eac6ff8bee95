//! File operations: list, upload, download URL, delete
//!
//! Thin typed wrappers over [`ApiClient`]. Upload is the one operation that
//! bypasses the JSON pipeline because it ships a multipart body, but it
//! still goes through the shared 401-refresh-replay recovery.

use std::sync::Arc;

use dropshelf_domain::{DropshelfError, FileDownload, Result, StoredFile};
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::credentials::CredentialStore;
use crate::http::{ApiClient, RequestOptions};

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
}

/// Typed file endpoints over the shared API client.
pub struct FilesApi<S: CredentialStore> {
    client: Arc<ApiClient<S>>,
}

impl<S: CredentialStore> FilesApi<S> {
    #[must_use]
    pub fn new(client: Arc<ApiClient<S>>) -> Self {
        Self { client }
    }

    /// List the caller's files.
    pub async fn list(&self) -> Result<Vec<StoredFile>> {
        self.client.get("/files", &RequestOptions::new()).await
    }

    /// Upload a file as multipart form data.
    ///
    /// `file_name` is the name presented to the backend; `content_type` the
    /// MIME type attached to the part.
    pub async fn upload(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredFile> {
        let url = format!("{}/files", self.client.session().config().api_root());

        let response = self.send_upload(&url, file_name, content_type, bytes.clone()).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(%url, "upload received 401, attempting token refresh");
            if matches!(self.client.session().refresh().await, Ok(true)) {
                let retried = self.send_upload(&url, file_name, content_type, bytes).await?;
                return ApiClient::<S>::parse_response(retried).await;
            }
            return Err(DropshelfError::Auth("Authentication failed".to_string()));
        }

        ApiClient::<S>::parse_response(response).await
    }

    /// Resolve a presigned URL for a stored file.
    ///
    /// With `download` set, the backend issues a URL that forces a
    /// content-disposition attachment instead of inline display.
    pub async fn download_url(&self, name: &str, download: bool) -> Result<String> {
        let mut options = RequestOptions::new().param("name", name);
        if download {
            options = options.query("download", "true");
        }
        let response: FileDownload = self.client.get("/files/:name", &options).await?;
        Ok(response.url)
    }

    /// Delete a stored file by name.
    pub async fn delete(&self, name: &str) -> Result<()> {
        let options = RequestOptions::new().param("name", name);
        let _: DeleteResponse = self.client.delete("/files/:name", &options).await?;
        Ok(())
    }

    async fn send_upload(
        &self,
        url: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| DropshelfError::Internal(format!("Invalid content type: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let mut request = self.client.http().post(url).multipart(form);
        if let Some(token) = self.client.session().access_token().await? {
            request = request.bearer_auth(token);
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                DropshelfError::Timeout(format!("Upload to {url} timed out"))
            } else {
                DropshelfError::Network(e.to_string())
            }
        })
    }
}
