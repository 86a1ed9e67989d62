/// Media Host
///
/// Avatar and cover images arrive already staged on local disk by the
/// transport; this module pushes a staged file to the remote media host and
/// hands back its public URL.

mod http;

pub use http::HttpMediaHost;

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::error::MediaError;

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Uploads the staged file called `staged_name` and returns its public URL.
    async fn upload(&self, staged_name: &str) -> Result<String, MediaError>;

    /// Removes a staged file that will not be uploaded. Never fails the caller.
    async fn discard(&self, staged_name: &str);
}

/// Resolve a staged file name inside `staging_dir`.
///
/// Only a single plain file name is accepted; separators, `..` and absolute
/// paths are rejected so a request cannot point the uploader at arbitrary files.
pub fn resolve_staged_path(staging_dir: &Path, staged_name: &str) -> Result<PathBuf, MediaError> {
    let name = staged_name.trim();
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(file)), None) => Ok(staging_dir.join(file)),
        _ => Err(MediaError::InvalidStagingName(name.to_string())),
    }
}
