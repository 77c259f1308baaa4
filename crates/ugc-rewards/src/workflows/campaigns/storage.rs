use std::fs;
use std::path::{Path, PathBuf};

/// Media file as received from the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Object storage for submitted media: store the bytes, get back a stable public URL.
pub trait MediaStorage: Send + Sync {
    fn store(&self, upload: &MediaUpload) -> Result<String, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("media file is empty")]
    Empty,
    #[error("unsupported media type for '{0}'; only images and videos are accepted")]
    UnsupportedMediaType(String),
    #[error("failed to write media to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Local-disk fallback used when no remote object storage is configured.
#[derive(Debug, Clone)]
pub struct LocalMediaStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MediaStorage for LocalMediaStorage {
    fn store(&self, upload: &MediaUpload) -> Result<String, StorageError> {
        if upload.bytes.is_empty() {
            return Err(StorageError::Empty);
        }

        let sanitized = sanitize_filename(&upload.filename);
        let mime = mime_guess::from_path(&sanitized).first();
        let accepted = mime
            .as_ref()
            .map(|mime| {
                mime.type_() == mime_guess::mime::IMAGE || mime.type_() == mime_guess::mime::VIDEO
            })
            .unwrap_or(false);
        if !accepted {
            return Err(StorageError::UnsupportedMediaType(upload.filename.clone()));
        }

        fs::create_dir_all(&self.root).map_err(|source| StorageError::Write {
            path: self.root.clone(),
            source,
        })?;

        let stored_name = format!("{}-{}", uuid::Uuid::new_v4().simple(), sanitized);
        let path = self.root.join(&stored_name);
        fs::write(&path, &upload.bytes).map_err(|source| StorageError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            stored_name
        ))
    }
}

/// Keep ASCII alphanumerics, dots, dashes and underscores; drop any directory part.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_images_under_public_base_url() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = LocalMediaStorage::new(dir.path(), "/uploads/");
        let url = storage
            .store(&MediaUpload {
                filename: "../../My Photo.JPG".to_string(),
                bytes: vec![0xFF, 0xD8, 0xFF],
            })
            .expect("stored");

        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with("-My_Photo.JPG"));
        let stored_name = url.trim_start_matches("/uploads/");
        assert!(dir.path().join(stored_name).exists());
    }

    #[test]
    fn rejects_non_media_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = LocalMediaStorage::new(dir.path(), "/uploads");
        let result = storage.store(&MediaUpload {
            filename: "notes.txt".to_string(),
            bytes: b"hello".to_vec(),
        });
        assert!(matches!(result, Err(StorageError::UnsupportedMediaType(_))));
    }

    #[test]
    fn rejects_empty_uploads() {
        let storage = LocalMediaStorage::new("unused", "/uploads");
        let result = storage.store(&MediaUpload {
            filename: "clip.mp4".to_string(),
            bytes: Vec::new(),
        });
        assert!(matches!(result, Err(StorageError::Empty)));
    }
}
