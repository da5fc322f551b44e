//! Blob storage for audio files, posters and avatars.

mod cloudinary;
mod local;

pub use cloudinary::CloudinaryRelay;
pub use local::LocalMediaRelay;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{MediaConfig, ServerConfig};
use crate::error::Result;
use crate::types::Asset;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Audio,
    Image,
}

impl AssetKind {
    fn default_extension(self) -> &'static str {
        match self {
            AssetKind::Audio => "mp3",
            AssetKind::Image => "jpg",
        }
    }
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Bytes,
    pub file_name: Option<String>,
}

impl Blob {
    /// Lowercased extension of the client file name, if it looks sane.
    fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let (_, ext) = name.rsplit_once('.')?;
        let ext = ext.to_ascii_lowercase();
        (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .then_some(ext)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadedAsset {
    pub url: String,
    pub public_id: String,
    /// Known only when the relay probes the media.
    pub duration_seconds: Option<f64>,
}

impl UploadedAsset {
    #[must_use]
    pub fn asset(&self) -> Asset {
        Asset {
            url: self.url.clone(),
            public_id: self.public_id.clone(),
        }
    }
}

#[async_trait]
pub trait MediaRelay: Send + Sync {
    async fn upload(&self, blob: Blob, kind: AssetKind) -> Result<UploadedAsset>;

    async fn destroy(&self, public_id: &str, kind: AssetKind) -> Result<()>;
}

/// Best-effort removal used when rolling back or replacing assets.
pub async fn discard(relay: &dyn MediaRelay, public_id: &str, kind: AssetKind) {
    if let Err(e) = relay.destroy(public_id, kind).await {
        tracing::warn!("Failed to remove media asset {}: {e}", public_id);
    }
}

pub fn from_config(config: &ServerConfig) -> Arc<dyn MediaRelay> {
    match &config.media {
        MediaConfig::Local => Arc::new(LocalMediaRelay::new(&config.data_dir, config.base_url())),
        MediaConfig::Cloudinary {
            cloud_name,
            api_key,
            api_secret,
        } => Arc::new(CloudinaryRelay::new(cloud_name, api_key, api_secret)),
    }
}
