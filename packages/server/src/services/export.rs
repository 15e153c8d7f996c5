//! CSV and ZIP exports for administrators.

use std::io::{Cursor, Write};

use chrono::{DateTime, Utc};
use common::storage::{StorageError, UploadStore, parse_upload_ref};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::entity::{achievement, student};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("zip: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Serialize)]
pub struct AchievementRow<'a> {
    pub id: i32,
    pub student_name: &'a str,
    pub roll_number: &'a str,
    pub department: &'a str,
    pub title: &'a str,
    #[serde(rename = "type")]
    pub achievement_type: &'static str,
    pub category: &'a str,
    pub level: &'static str,
    pub award: &'a str,
    pub issuer: &'a str,
    pub achievement_date: &'a str,
    pub status: &'static str,
    pub points: i32,
    pub risk_score: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl<'a> AchievementRow<'a> {
    pub fn new(a: &'a achievement::Model, s: Option<&'a student::Model>) -> Self {
        Self {
            id: a.id,
            student_name: s.map(|s| s.name.as_str()).unwrap_or_default(),
            roll_number: s.map(|s| s.roll_number.as_str()).unwrap_or_default(),
            department: s.map(|s| s.department.as_str()).unwrap_or_default(),
            title: &a.title,
            achievement_type: a.achievement_type.as_str(),
            category: &a.category,
            level: a.level.as_str(),
            award: a.award.as_deref().unwrap_or_default(),
            issuer: a.issuer.as_deref().unwrap_or_default(),
            achievement_date: a.achievement_date.as_deref().unwrap_or_default(),
            status: a.status.as_str(),
            points: a.points,
            risk_score: a
                .suspicious_activity
                .as_ref()
                .and_then(|v| v.get("risk_score"))
                .and_then(|v| v.as_u64()),
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentRow<'a> {
    pub id: i32,
    pub name: &'a str,
    pub email: &'a str,
    pub roll_number: &'a str,
    pub department: &'a str,
    pub year: i32,
    pub total_points: i32,
    pub erp_points: i32,
    pub manual_points: i32,
    pub created_at: DateTime<Utc>,
}

impl<'a> From<&'a student::Model> for StudentRow<'a> {
    fn from(s: &'a student::Model) -> Self {
        Self {
            id: s.id,
            name: &s.name,
            email: &s.email,
            roll_number: &s.roll_number,
            department: &s.department,
            year: s.year,
            total_points: s.total_points,
            erp_points: s.erp_points,
            manual_points: s.manual_points,
            created_at: s.created_at,
        }
    }
}

fn write_csv<T: Serialize>(rows: impl IntoIterator<Item = T>) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

pub fn achievements_csv(rows: &[AchievementRow<'_>]) -> Result<Vec<u8>, ExportError> {
    write_csv(rows)
}

pub fn students_csv(rows: &[StudentRow<'_>]) -> Result<Vec<u8>, ExportError> {
    write_csv(rows)
}

/// A proof file to include in the archive.
#[derive(Debug, Clone)]
pub struct ProofEntry {
    /// Directory inside the archive, usually the student's roll number.
    pub folder: String,
    pub achievement_id: i32,
    pub reference: String,
}

/// Summary of a built archive.
#[derive(Debug)]
pub struct ProofArchive {
    pub bytes: Vec<u8>,
    pub included: usize,
    pub skipped: usize,
}

fn archive_folder(folder: &str) -> String {
    let cleaned: String = folder
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".into()
    } else {
        cleaned
    }
}

/// Zip the referenced proof files. Files that are missing or have malformed
/// references are skipped with a warning.
pub async fn proofs_zip(
    store: &dyn UploadStore,
    entries: &[ProofEntry],
) -> Result<ProofArchive, ExportError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let (mut included, mut skipped) = (0, 0);

    for entry in entries {
        let Some(filename) = parse_upload_ref(&entry.reference) else {
            warn!(reference = %entry.reference, "Skipping malformed proof reference");
            skipped += 1;
            continue;
        };
        let data = match store.get(filename).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_) | StorageError::InvalidName { .. }) => {
                warn!(filename, achievement_id = entry.achievement_id, "Proof file missing; skipped");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let path = format!(
            "{}/{}-{}",
            archive_folder(&entry.folder),
            entry.achievement_id,
            filename
        );
        zip.start_file(path, options)?;
        zip.write_all(&data)?;
        included += 1;
    }

    let bytes = zip.finish()?.into_inner();
    Ok(ProofArchive {
        bytes,
        included,
        skipped,
    })
}
