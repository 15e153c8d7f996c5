use serde::{Deserialize, Serialize};

use super::achievement::AchievementResponse;
use super::shared::{Pagination, validate_optional_text};
use super::student::StudentResponse;
use crate::error::AppError;

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StudentListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Case-insensitive match on name, email or roll number.
    pub search: Option<String>,
    pub department: Option<String>,
    pub year: Option<i32>,
    /// One of `total_points` (default), `name`, `created_at`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StudentListResponse {
    pub data: Vec<StudentResponse>,
    pub pagination: Pagination,
}

/// Achievement counts of a single student.
#[derive(Serialize, Default, utoipa::ToSchema)]
pub struct AchievementSummary {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    /// Sum of points over approved achievements.
    pub approved_points: i32,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StudentDetailResponse {
    pub student: StudentResponse,
    pub summary: AchievementSummary,
    /// Most recent achievements first.
    pub recent_achievements: Vec<AchievementResponse>,
}

/// Manual point adjustment.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AdjustPointsRequest {
    /// Points to add (negative to deduct). The total never drops below zero.
    #[schema(example = -20)]
    pub delta: i32,
    #[schema(example = "Duplicate claim")]
    pub reason: Option<String>,
}

pub fn validate_adjust_points(req: &AdjustPointsRequest) -> Result<(), AppError> {
    if req.delta == 0 {
        return Err(AppError::Validation("delta must not be zero".into()));
    }
    if req.delta.unsigned_abs() > 100_000 {
        return Err(AppError::Validation(
            "delta must be within ±100000".into(),
        ));
    }
    validate_optional_text(req.reason.as_deref(), "Reason", 500)
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AdjustPointsResponse {
    pub student_id: i32,
    /// Delta actually applied after flooring at zero.
    #[schema(example = -20)]
    pub applied: i32,
    pub total_points: i32,
}

#[derive(Serialize, Default, utoipa::ToSchema)]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LevelCount {
    #[schema(example = "National")]
    pub level: String,
    pub count: u64,
}

#[derive(Serialize, Default, utoipa::ToSchema)]
pub struct ErpCounts {
    pub draft: u64,
    pub submitted: u64,
    pub verified: u64,
    pub rejected: u64,
}

/// Dashboard aggregates.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub total_students: u64,
    pub total_achievements: u64,
    pub achievements_by_status: StatusCounts,
    pub achievements_by_level: Vec<LevelCount>,
    /// Sum of points over approved achievements.
    pub total_points_awarded: i64,
    /// Achievements whose submission-time verdict was suspicious.
    pub flagged_suspicious: u64,
    pub erp_profiles: ErpCounts,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// Restrict the achievement or proof export to one status.
    pub status: Option<common::AchievementStatus>,
}
