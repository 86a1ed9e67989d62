use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{resolve_staged_path, MediaHost};
use crate::configuration::MediaSettings;
use crate::error::MediaError;

/// Uploads staged files to a remote media host over HTTP.
///
/// The staged file is removed after every attempt, successful or not.
#[derive(Clone)]
pub struct HttpMediaHost {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    staging_dir: PathBuf,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

impl HttpMediaHost {
    pub fn new(
        base_url: String,
        api_key: String,
        staging_dir: PathBuf,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
            staging_dir,
        }
    }

    /// Build a client whose request timeout comes from configuration.
    pub fn from_settings(settings: &MediaSettings) -> Result<Self, MediaError> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| MediaError::UploadFailed(format!("client build failed: {}", e)))?;

        Ok(Self::new(
            settings.base_url.clone(),
            settings.api_key.clone(),
            PathBuf::from(&settings.staging_dir),
            http_client,
        ))
    }

    async fn send(&self, path: &Path, file_name: String) -> Result<String, MediaError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MediaError::ReadFailed(format!("{}: {}", file_name, e)))?;

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));
        let url = format!("{}/upload", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to reach media host: {}", e);
                MediaError::UploadFailed(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Media host returned error: {}", e);
                MediaError::UploadFailed(e.to_string())
            })?;

        response
            .json::<UploadResponse>()
            .await
            .map(|body| body.url)
            .map_err(|e| MediaError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl MediaHost for HttpMediaHost {
    async fn upload(&self, staged_name: &str) -> Result<String, MediaError> {
        let path = resolve_staged_path(&self.staging_dir, staged_name)?;
        let result = self.send(&path, staged_name.trim().to_string()).await;
        remove_staged(&path).await;

        if let Ok(url) = &result {
            tracing::info!(url = %url, "Staged file uploaded");
        }
        result
    }

    async fn discard(&self, staged_name: &str) {
        match resolve_staged_path(&self.staging_dir, staged_name) {
            Ok(path) => remove_staged(&path).await,
            Err(e) => tracing::warn!("Staged file not discarded: {}", e),
        }
    }
}

/// A file that is already gone counts as removed.
async fn remove_staged(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to remove staged file: {}", e);
        }
    }
}
