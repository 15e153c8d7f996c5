use std::fmt;

/// Why a name cannot address a file in the flat upload directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidNameReason {
    Empty,
    /// `/`, `\` or NUL would leave the upload directory.
    PathSeparator,
    /// Leading `.`: covers `..` and the `.tmp` staging directory.
    Hidden,
}

impl InvalidNameReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "name is empty",
            Self::PathSeparator => "name contains a path separator",
            Self::Hidden => "name starts with '.'",
        }
    }
}

/// Errors raised by an [`UploadStore`](super::UploadStore).
#[derive(Debug)]
pub enum StorageError {
    /// No stored upload has this name.
    NotFound(String),
    /// The name is not a flat stored-upload name.
    InvalidName {
        name: String,
        reason: InvalidNameReason,
    },
    /// The upload is larger than the store accepts. `size` is the number of
    /// bytes seen before the write was abandoned.
    TooLarge { size: u64, limit: u64 },
    Io(std::io::Error),
}

impl StorageError {
    pub(crate) fn invalid_name(name: &str, reason: InvalidNameReason) -> Self {
        Self::InvalidName {
            name: name.to_string(),
            reason,
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(name) => write!(f, "no upload named '{name}'"),
            Self::InvalidName { name, reason } => {
                write!(f, "invalid upload name '{name}': {}", reason.as_str())
            }
            Self::TooLarge { size, limit } => {
                write!(f, "upload of at least {size} bytes exceeds the {limit} byte limit")
            }
            Self::Io(err) => write!(f, "upload directory I/O error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
