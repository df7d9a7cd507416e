//! Write-once blob storage for product images and payment screenshots.
//!
//! [`ObjectStore::put`] returns the public URL that gets stored on the
//! product or order record. Two backends, chosen by `storage.backend`:
//! [`LocalObjectStore`] and [`CdnObjectStore`].

use std::sync::Arc;

use async_trait::async_trait;
use kadai_config::{StorageBackend, StorageConfig};

mod cdn;
mod key;
mod local;

pub use cdn::CdnObjectStore;
pub use key::{sanitize_segment, ObjectKey};
pub use local::LocalObjectStore;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("object store I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("upload request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote store answered but refused the upload.
    #[error("{0}")]
    Rejected(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key` and return the public URL.
    async fn put(
        &self,
        key: &ObjectKey,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured backend.
pub fn object_store_from_config(cfg: &StorageConfig) -> Arc<dyn ObjectStore> {
    match cfg.backend {
        StorageBackend::Local => Arc::new(LocalObjectStore::new(
            &cfg.local.root,
            &cfg.local.public_base_url,
        )),
        StorageBackend::Cdn => Arc::new(CdnObjectStore::new(
            &cfg.cdn.upload_url,
            &cfg.cdn.upload_preset,
            &cfg.cdn.folder,
        )),
    }
}
