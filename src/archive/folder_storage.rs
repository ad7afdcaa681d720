use std::path::{Path, PathBuf};

use super::{BlobStorage, StorageError};

/// Stores uploaded photos in a local (or network-mounted) folder.
///
/// Links use `public_base_url` when set (a web server exposing the folder),
/// otherwise a `file://` URL to the written file.
pub struct FolderStorage {
    dir: PathBuf,
    public_base_url: Option<String>,
}

impl FolderStorage {
    pub fn new(dir: impl Into<PathBuf>, public_base_url: Option<&str>) -> Self {
        Self {
            dir: dir.into(),
            public_base_url: public_base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Free path for `name`; an existing file gets a random suffix instead
    /// of being overwritten.
    fn target_path(&self, name: &str) -> PathBuf {
        let candidate = self.dir.join(name);
        if !candidate.exists() {
            return candidate;
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (name, String::new()),
        };
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        self.dir.join(format!("{stem}_{}{ext}", &suffix[..8]))
    }
}

/// Keep file names portable: ASCII alphanumerics plus `-`, `_`, `.`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

impl BlobStorage for FolderStorage {
    fn upload(&self, bytes: &[u8], media_type: &str, suggested_name: &str) -> Result<String, StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.target_path(&sanitize_file_name(suggested_name));
        std::fs::write(&path, bytes)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!(
            path = %path.display(),
            media_type,
            size = bytes.len(),
            "Image stored"
        );

        let link = match &self.public_base_url {
            Some(base) => format!("{base}/{file_name}"),
            None => format!("file://{}", std::fs::canonicalize(&path)?.display()),
        };
        Ok(link)
    }
}
