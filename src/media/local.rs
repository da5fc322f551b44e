use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};

use super::{AssetKind, Blob, MediaRelay, UploadedAsset};
use crate::error::{Error, Result};
use crate::types::new_id;

/// Stores media under `<data_dir>/media`. The public id is the file name.
pub struct LocalMediaRelay {
    base_path: PathBuf,
    base_url: String,
}

impl LocalMediaRelay {
    pub fn new(data_dir: &Path, base_url: impl Into<String>) -> Self {
        Self {
            base_path: data_dir.join("media"),
            base_url: base_url.into(),
        }
    }

    fn object_path(&self, public_id: &str) -> Result<PathBuf> {
        validate_public_id(public_id)?;
        Ok(self.base_path.join(public_id))
    }

    /// Opens a stored file for streaming. Returns the reader and its size.
    pub async fn open(&self, public_id: &str) -> Result<(BufReader<File>, u64)> {
        let path = self.object_path(public_id)?;
        let file = File::open(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata().await?.len();
        Ok((BufReader::new(file), size))
    }
}

#[async_trait]
impl MediaRelay for LocalMediaRelay {
    async fn upload(&self, blob: Blob, kind: AssetKind) -> Result<UploadedAsset> {
        let ext = blob
            .extension()
            .unwrap_or_else(|| kind.default_extension().to_string());
        let public_id = format!("{}.{ext}", new_id());

        fs::create_dir_all(&self.base_path).await?;
        let temp_path = self.base_path.join(format!(".{public_id}.tmp"));
        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(&blob.bytes).await?;
        temp_file.sync_all().await?;
        fs::rename(&temp_path, self.base_path.join(&public_id)).await?;

        Ok(UploadedAsset {
            url: format!("{}/media/{public_id}", self.base_url),
            public_id,
            duration_seconds: None,
        })
    }

    async fn destroy(&self, public_id: &str, _kind: AssetKind) -> Result<()> {
        let path = self.object_path(public_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn validate_public_id(public_id: &str) -> Result<()> {
    let valid = !public_id.is_empty()
        && !public_id.starts_with('.')
        && public_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(Error::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_upload_open_destroy() {
        let temp_dir = TempDir::new().unwrap();
        let relay = LocalMediaRelay::new(temp_dir.path(), "http://localhost:8080");

        let uploaded = relay
            .upload(
                Blob {
                    bytes: Bytes::from_static(b"ID3 fake audio"),
                    file_name: Some("episode.ogg".to_string()),
                },
                AssetKind::Audio,
            )
            .await
            .unwrap();

        assert!(uploaded.public_id.ends_with(".ogg"));
        assert_eq!(
            uploaded.url,
            format!("http://localhost:8080/media/{}", uploaded.public_id)
        );

        let (mut reader, size) = relay.open(&uploaded.public_id).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"ID3 fake audio");
        assert_eq!(size, 14);

        relay.destroy(&uploaded.public_id, AssetKind::Audio).await.unwrap();
        assert!(matches!(
            relay.open(&uploaded.public_id).await,
            Err(Error::NotFound)
        ));
        // Destroying twice is fine.
        relay.destroy(&uploaded.public_id, AssetKind::Audio).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let relay = LocalMediaRelay::new(temp_dir.path(), "http://localhost");

        assert!(matches!(relay.open("../secret").await, Err(Error::NotFound)));
        assert!(relay.destroy("a/b", AssetKind::Image).await.is_err());
    }
}
