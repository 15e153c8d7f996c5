use thiserror::Error;

/// Longest client-supplied proof name kept in storage references.
const MAX_NAME_LEN: usize = 200;

/// Extensions accepted as proof files and the content type served for each.
const PROOF_TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofNameError {
    #[error("File name cannot be empty")]
    Empty,
    #[error("File name must be at most {MAX_NAME_LEN} characters")]
    TooLong,
    #[error("File name must not contain path separators")]
    PathSeparator,
    #[error("File name must not contain control characters")]
    ControlCharacter,
    #[error("File name must not start with '.'")]
    Hidden,
    #[error("Only PNG, JPEG, GIF, WebP and PDF files are accepted")]
    UnsupportedType,
}

/// A proof file name that passed validation.
#[derive(Debug, PartialEq, Eq)]
pub struct ProofName<'a> {
    pub name: &'a str,
    pub content_type: &'static str,
}

/// Checks the client-supplied name of an uploaded proof file.
///
/// The name must be flat (no directories) and carry one of the accepted
/// image or PDF extensions, compared case-insensitively.
pub fn validate_proof_filename(filename: &str) -> Result<ProofName<'_>, ProofNameError> {
    let name = filename.trim();
    if name.is_empty() {
        return Err(ProofNameError::Empty);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ProofNameError::TooLong);
    }
    // NUL and CR/LF would otherwise reach Content-Disposition headers.
    if name.chars().any(|c| c.is_control()) {
        return Err(ProofNameError::ControlCharacter);
    }
    if name.contains(['/', '\\']) {
        return Err(ProofNameError::PathSeparator);
    }
    if name.starts_with('.') {
        return Err(ProofNameError::Hidden);
    }

    let content_type = name
        .rsplit_once('.')
        .and_then(|(_, ext)| {
            PROOF_TYPES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        })
        .map(|(_, content_type)| *content_type)
        .ok_or(ProofNameError::UnsupportedType)?;

    Ok(ProofName { name, content_type })
}
