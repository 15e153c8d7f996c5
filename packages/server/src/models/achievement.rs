use chrono::{DateTime, Utc};
use common::storage::parse_upload_ref;
use common::{AchievementLevel, AchievementStatus, AchievementType};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_optional_text, validate_title};
use crate::entity::achievement;
use crate::error::AppError;
use crate::services::certificate::ValidationVerdict;
use crate::services::suspicious::SuspiciousVerdict;

const MAX_PROOF_FILES: usize = 10;

/// Request body for submitting an achievement.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAchievementRequest {
    #[schema(example = "Smart India Hackathon")]
    pub title: String,
    pub description: Option<String>,
    pub achievement_type: AchievementType,
    /// Free-form category, e.g. Certification, Competition, Course, Project.
    #[schema(example = "Competition")]
    pub category: String,
    pub level: AchievementLevel,
    /// Placing for competitions: "1", "2nd", "third", "runner", "participation".
    #[schema(example = "1")]
    pub award: Option<String>,
    #[schema(example = "Ministry of Education")]
    pub issuer: Option<String>,
    /// Date of the achievement, preferably `YYYY-MM-DD`.
    #[schema(example = "2024-03-01")]
    pub achievement_date: Option<String>,
    /// References returned by `POST /uploads`.
    #[schema(example = json!(["/uploads/0190f5c2d7e84b5a9d3c1f2e3a4b5c6d-certificate.png"]))]
    pub proof_files: Vec<String>,
}

pub fn validate_create_achievement(req: &CreateAchievementRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    let category = req.category.trim();
    if category.is_empty() || category.chars().count() > 64 {
        return Err(AppError::Validation(
            "Category must be 1-64 characters".into(),
        ));
    }
    validate_optional_text(req.description.as_deref(), "Description", 4000)?;
    validate_optional_text(req.award.as_deref(), "Award", 64)?;
    validate_optional_text(req.issuer.as_deref(), "Issuer", 256)?;
    validate_optional_text(req.achievement_date.as_deref(), "Achievement date", 64)?;

    if req.proof_files.is_empty() {
        return Err(AppError::Validation(
            "At least one proof file is required".into(),
        ));
    }
    if req.proof_files.len() > MAX_PROOF_FILES {
        return Err(AppError::Validation(format!(
            "At most {MAX_PROOF_FILES} proof files are allowed"
        )));
    }
    for reference in &req.proof_files {
        if parse_upload_ref(reference).is_none() {
            return Err(AppError::Validation(format!(
                "Invalid proof file reference: {reference}"
            )));
        }
    }
    Ok(())
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AchievementListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<AchievementStatus>,
    pub achievement_type: Option<AchievementType>,
    pub level: Option<AchievementLevel>,
    /// Only honored for admins.
    pub student_id: Option<i32>,
    /// Case-insensitive title search.
    pub search: Option<String>,
    /// `asc` or `desc` (default) by creation time.
    pub sort_order: Option<String>,
}

/// Request body for approving an achievement.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct ApproveAchievementRequest {
    /// Overrides the calculated points. Must be 0-10000.
    #[schema(example = 120)]
    pub custom_points: Option<i32>,
}

/// Upper bound for an admin-chosen award.
pub const MAX_CUSTOM_POINTS: i32 = 10_000;

pub fn validate_approve(req: &ApproveAchievementRequest) -> Result<(), AppError> {
    if let Some(points) = req.custom_points
        && !(0..=MAX_CUSTOM_POINTS).contains(&points)
    {
        return Err(AppError::Validation(format!(
            "custom_points must be between 0 and {MAX_CUSTOM_POINTS}"
        )));
    }
    Ok(())
}

/// Request body for rejecting an achievement.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct RejectAchievementRequest {
    #[schema(example = "Certificate is not legible")]
    pub reason: Option<String>,
}

pub fn validate_reject(req: &RejectAchievementRequest) -> Result<(), AppError> {
    validate_optional_text(req.reason.as_deref(), "Reason", 1000)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AchievementResponse {
    pub id: i32,
    pub student_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub achievement_type: AchievementType,
    pub category: String,
    pub level: AchievementLevel,
    pub award: Option<String>,
    pub issuer: Option<String>,
    pub achievement_date: Option<String>,
    pub proof_files: Vec<String>,
    pub status: AchievementStatus,
    pub points: i32,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Present for admins only.
    pub suspicious_activity: Option<SuspiciousVerdict>,
    /// Present for admins only.
    pub validation: Option<ValidationVerdict>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AchievementResponse {
    /// Build a response; verdicts are only included when `include_verdicts`.
    pub fn from_model(m: achievement::Model, include_verdicts: bool) -> Self {
        let proof_files = m.proof_refs();
        let (suspicious_activity, validation) = if include_verdicts {
            (
                m.suspicious_activity
                    .and_then(|v| serde_json::from_value(v).ok()),
                m.validation.and_then(|v| serde_json::from_value(v).ok()),
            )
        } else {
            (None, None)
        };
        Self {
            id: m.id,
            student_id: m.student_id,
            title: m.title,
            description: m.description,
            achievement_type: m.achievement_type,
            category: m.category,
            level: m.level,
            award: m.award,
            issuer: m.issuer,
            achievement_date: m.achievement_date,
            proof_files,
            status: m.status,
            points: m.points,
            rejection_reason: m.rejection_reason,
            reviewed_by: m.reviewed_by,
            reviewed_at: m.reviewed_at,
            suspicious_activity,
            validation,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AchievementListResponse {
    pub data: Vec<AchievementResponse>,
    pub pagination: Pagination,
}

/// Result of an admin review.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ReviewResponse {
    pub achievement: AchievementResponse,
    /// Student's running total after the review.
    #[schema(example = 450)]
    pub student_total_points: i32,
}
