//! # Local media store
//!
//! Filesystem implementation of `MediaStore`. Files are content-addressed by
//! their SHA-256 digest and sharded two levels deep (`ab/cd/abcd….png`), so
//! identical uploads are stored once.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use domains::{DomainError, MediaStore, Result, Upload};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, info};

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./uploads")
    root_path: PathBuf,
    /// Public URL prefix the root is served under (e.g., "/uploads")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            root_path: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// "ab/cd/<hash>.<ext>", relative to the root.
    fn sharded_name(hash: &str, ext: &str) -> String {
        format!("{}/{}/{hash}.{ext}", &hash[0..2], &hash[2..4])
    }

    /// The declared type, or one guessed from the file name. `None` when neither says anything.
    fn declared_type(upload: &Upload) -> Option<mime::Mime> {
        upload.content_type.clone().or_else(|| {
            upload
                .file_name
                .as_deref()
                .and_then(|name| mime_guess::from_path(name).first())
        })
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save_image(&self, upload: Upload) -> Result<Option<String>> {
        if upload.data.is_empty() {
            return Ok(None);
        }
        if let Some(declared) = Self::declared_type(&upload) {
            if declared.type_() != mime::IMAGE {
                debug!(%declared, "non-image upload ignored");
                return Ok(None);
            }
        }
        // The bytes decide, not the client's claim.
        let Ok(format) = image::guess_format(&upload.data) else {
            debug!("upload is not a recognizable image, ignored");
            return Ok(None);
        };
        let ext = format.extensions_str().first().copied().unwrap_or("img");

        let hash = hex::encode(Sha256::digest(&upload.data));
        let name = Self::sharded_name(&hash, ext);
        let target = self.root_path.join(&name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(DomainError::internal)?;
        }
        if !fs::try_exists(&target).await.map_err(DomainError::internal)? {
            fs::write(&target, &upload.data).await.map_err(DomainError::internal)?;
            info!(path = %target.display(), bytes = upload.data.len(), "image stored");
        }
        Ok(Some(format!("{}/{name}", self.url_prefix)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    // Smallest valid PNG signature plus IHDR start; enough for format sniffing.
    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13, b'I', b'H', b'D', b'R'];

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("rusty-forum-media-{tag}-{}", std::process::id()))
    }

    fn upload(data: &'static [u8], content_type: Option<mime::Mime>) -> Upload {
        Upload {
            data: Bytes::from_static(data),
            content_type,
            file_name: None,
        }
    }

    #[tokio::test]
    async fn stores_images_under_sharded_hash() {
        let root = scratch_dir("png");
        let store = LocalMediaStore::new(&root, "/uploads/");
        let path = store
            .save_image(upload(PNG_HEADER, Some(mime::IMAGE_PNG)))
            .await
            .unwrap()
            .unwrap();

        let hash = hex::encode(Sha256::digest(PNG_HEADER));
        assert_eq!(path, format!("/uploads/{}/{}/{hash}.png", &hash[0..2], &hash[2..4]));
        assert!(root.join(&path["/uploads/".len()..]).exists());

        // Same bytes, same path.
        let again = store.save_image(upload(PNG_HEADER, None)).await.unwrap();
        assert_eq!(again.as_deref(), Some(path.as_str()));
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn non_images_are_ignored() {
        let store = LocalMediaStore::new(scratch_dir("txt"), "/uploads");
        assert_eq!(store.save_image(upload(b"hello", Some(mime::TEXT_PLAIN))).await.unwrap(), None);
        assert_eq!(store.save_image(upload(b"hello", None)).await.unwrap(), None);
        assert_eq!(store.save_image(upload(b"", Some(mime::IMAGE_PNG))).await.unwrap(), None);

        let mut named = upload(PNG_HEADER, None);
        named.file_name = Some("notes.txt".into());
        assert_eq!(store.save_image(named).await.unwrap(), None);
    }
}
