use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, BufReader};

use super::error::{InvalidNameReason, StorageError};
use super::traits::{BoxReader, StoredUpload, UploadStore};

/// Longest sanitized original-name suffix kept in a stored file name.
const MAX_NAME_SUFFIX: usize = 96;

/// Filesystem-backed upload store.
///
/// Files are stored flat as `{base_path}/{uuid}-{sanitized original name}`.
/// Writes go through `{base_path}/.tmp` and are renamed into place.
pub struct FilesystemUploadStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemUploadStore {
    /// Create a new filesystem upload store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            max_size,
        })
    }

    /// Compute the filesystem path for a stored file name.
    fn file_path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        validate_stored_name(filename)?;
        Ok(self.base_path.join(filename))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

/// Reject names that would escape the upload directory or hit the temp dir.
fn validate_stored_name(filename: &str) -> Result<(), StorageError> {
    let reason = if filename.is_empty() {
        InvalidNameReason::Empty
    } else if filename.contains(['/', '\\', '\0']) {
        InvalidNameReason::PathSeparator
    } else if filename.starts_with('.') {
        InvalidNameReason::Hidden
    } else {
        return Ok(());
    };
    Err(StorageError::invalid_name(filename, reason))
}

/// Build a unique stored name that keeps a readable trace of the original.
fn stored_name(original_name: &str) -> String {
    let sanitized: String = original_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.');
    let suffix: String = if sanitized.is_empty() {
        "file".into()
    } else {
        // Keep the tail so the extension survives truncation.
        let skip = sanitized.chars().count().saturating_sub(MAX_NAME_SUFFIX);
        sanitized.chars().skip(skip).collect()
    };
    format!("{}-{}", uuid::Uuid::now_v7().simple(), suffix)
}

#[async_trait]
impl UploadStore for FilesystemUploadStore {
    async fn put(&self, original_name: &str, data: &[u8]) -> Result<StoredUpload, StorageError> {
        if data.len() as u64 > self.max_size {
            return Err(StorageError::TooLarge {
                size: data.len() as u64,
                limit: self.max_size,
            });
        }

        let filename = stored_name(original_name);
        let file_path = self.file_path(&filename)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&temp_path, &file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(StoredUpload {
            filename,
            size: data.len() as u64,
        })
    }

    async fn put_stream(
        &self,
        original_name: &str,
        mut reader: BoxReader,
    ) -> Result<StoredUpload, StorageError> {
        let temp_path = self.temp_path();
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
        let mut temp_file = fs::File::create(&temp_path).await?;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > self.max_size {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::TooLarge {
                    size: total_bytes,
                    limit: self.max_size,
                });
            }

            tokio::io::AsyncWriteExt::write_all(&mut temp_file, &buf[..n]).await?;
        }

        tokio::io::AsyncWriteExt::flush(&mut temp_file).await?;
        drop(temp_file);

        let filename = stored_name(original_name);
        let file_path = self.file_path(&filename)?;

        if let Err(e) = fs::rename(&temp_path, &file_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(StoredUpload {
            filename,
            size: total_bytes,
        })
    }

    async fn get_stream(&self, filename: &str) -> Result<BoxReader, StorageError> {
        let file_path = self.file_path(filename)?;
        match fs::File::open(&file_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        let file_path = self.file_path(filename)?;
        Ok(fs::try_exists(&file_path).await?)
    }

    async fn delete(&self, filename: &str) -> Result<bool, StorageError> {
        let file_path = self.file_path(filename)?;
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn size(&self, filename: &str) -> Result<u64, StorageError> {
        let file_path = self.file_path(filename)?;
        match fs::metadata(&file_path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
