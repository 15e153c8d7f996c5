use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Prefix of the path string stored on records that reference an upload.
pub const UPLOAD_PREFIX: &str = "/uploads/";

/// Build the reference string (`/uploads/<filename>`) for a stored file.
pub fn upload_ref(filename: &str) -> String {
    format!("{UPLOAD_PREFIX}{filename}")
}

/// Extract the file name from an `/uploads/<filename>` reference.
///
/// Returns `None` for references outside the uploads namespace or that
/// point into a subdirectory.
pub fn parse_upload_ref(reference: &str) -> Option<&str> {
    let name = reference.trim().strip_prefix(UPLOAD_PREFIX)?;
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return None;
    }
    Some(name)
}

/// Metadata of a freshly stored upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredUpload {
    /// Name the file is addressed by.
    pub filename: String,
    pub size: u64,
}

/// Filename-addressed upload storage.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Store bytes under a fresh name derived from `original_name`.
    async fn put(&self, original_name: &str, data: &[u8]) -> Result<StoredUpload, StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(original_name, reader).await
    }

    /// Store data from an async reader under a fresh name derived from `original_name`.
    async fn put_stream(
        &self,
        original_name: &str,
        reader: BoxReader,
    ) -> Result<StoredUpload, StorageError>;

    /// Retrieve all bytes of a stored file.
    async fn get(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(filename).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve a stored file as a streaming async reader.
    async fn get_stream(&self, filename: &str) -> Result<BoxReader, StorageError>;

    /// Check whether a file exists.
    async fn exists(&self, filename: &str) -> Result<bool, StorageError>;

    /// Delete a file.
    ///
    /// Returns `true` if the file was deleted, `false` if it did not exist.
    async fn delete(&self, filename: &str) -> Result<bool, StorageError>;

    /// Get the size of a file in bytes.
    async fn size(&self, filename: &str) -> Result<u64, StorageError>;
}
