mod error;
mod traits;

pub mod filesystem;

pub use error::{InvalidNameReason, StorageError};
pub use traits::{BoxReader, StoredUpload, UPLOAD_PREFIX, UploadStore, parse_upload_ref, upload_ref};
