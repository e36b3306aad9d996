use anyhow::Result;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use postbox_crypto::ids::create_id;

const UPLOADS: &str = "uploads";

/// An uploaded photo as received, before validation.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl PhotoUpload {
    /// Extension (with dot) for the stored file: the client's extension if
    /// it is short and plain, otherwise one derived from the MIME type.
    pub fn extension(&self) -> String {
        let from_name = self
            .file_name
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        if let Some(ext) = from_name {
            return format!(".{}", ext);
        }

        match self.content_type.as_deref() {
            Some("image/jpeg") | Some("image/jpg") => ".jpg".into(),
            Some("image/png") => ".png".into(),
            Some("image/webp") => ".webp".into(),
            _ => String::new(),
        }
    }
}

/// Resolves where uploaded photos live on disk.
///
/// Files are served from `<root>/public/uploads` in development and from
/// `<root>/dist/client/uploads` in production builds. Rows store the
/// root-relative URL `/uploads/<name>`, which is the same in both.
pub struct PhotoStorage {
    root: PathBuf,
    production: bool,
}

impl PhotoStorage {
    pub fn new(root: PathBuf, production: bool) -> Self {
        Self { root, production }
    }

    pub fn base_dir(&self) -> PathBuf {
        if self.production {
            self.root.join("dist").join("client")
        } else {
            self.root.join("public")
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.base_dir().join(UPLOADS)
    }

    pub async fn ensure_uploads_dir(&self) -> Result<()> {
        let dir = self.uploads_dir();
        if !fs::try_exists(&dir).await? {
            fs::create_dir_all(&dir).await?;
            info!("Created uploads directory: {}", dir.display());
        }
        Ok(())
    }

    /// System path for a stored URL path, under the current base dir.
    pub fn system_path(&self, url_path: &str) -> Option<PathBuf> {
        relative_path(url_path).map(|rel| self.base_dir().join(rel))
    }

    /// Every location a stored URL path may point at. Production also
    /// checks `public/`, where files land when saved by a dev build.
    pub fn candidate_paths(&self, url_path: &str) -> Vec<PathBuf> {
        let Some(rel) = relative_path(url_path) else {
            return Vec::new();
        };

        let mut paths = vec![self.base_dir().join(&rel)];
        if self.production {
            paths.push(self.root.join("public").join(&rel));
        }
        paths
    }

    /// Write the photo under a fresh name and return its URL path.
    pub async fn save_photo(&self, data: &[u8], extension: &str) -> Result<String> {
        self.ensure_uploads_dir().await?;

        let file_name = format!("{}{}", create_id(), extension);
        let file_path = self.uploads_dir().join(&file_name);

        let mut file = fs::File::create(&file_path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        info!("Saved photo to {} ({} bytes)", file_path.display(), data.len());
        Ok(format!("/{}/{}", UPLOADS, file_name))
    }

    /// Remove the file behind `url_path` from the first location that has
    /// it. Never fails; returns whether anything was removed.
    pub async fn delete_photo(&self, url_path: &str) -> bool {
        for path in self.candidate_paths(url_path) {
            match fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Deleted photo {}", path.display());
                    return true;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!("Photo not at {}", path.display());
                }
                Err(e) => {
                    warn!("Failed to delete photo {}: {}", path.display(), e);
                }
            }
        }

        warn!("Photo {} not found in any upload location", url_path);
        false
    }
}

/// Strip the leading slash and refuse anything that could leave the base dir.
fn relative_path(url_path: &str) -> Option<PathBuf> {
    let trimmed = url_path.strip_prefix('/').unwrap_or(url_path);
    if trimmed.is_empty() {
        return None;
    }

    let rel = Path::new(trimmed);
    if rel.components().all(|c| matches!(c, Component::Normal(_))) {
        Some(rel.to_path_buf())
    } else {
        None
    }
}
