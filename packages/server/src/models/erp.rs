use chrono::{DateTime, Utc};
use common::ErpStatus;
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_optional_text};
use crate::entity::erp_profile::{self, SemesterRecord, cgpa};
use crate::error::AppError;

/// Full replacement of a student's ERP details.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpsertErpRequest {
    #[schema(example = "+91 98765 43210")]
    pub phone: Option<String>,
    pub address: Option<String>,
    #[schema(example = "2003-08-14")]
    pub date_of_birth: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_occupation: Option<String>,
    #[schema(example = 450000)]
    pub annual_family_income: Option<i64>,
    #[serde(default)]
    pub semesters: Vec<SemesterRecord>,
}

pub fn validate_upsert_erp(req: &UpsertErpRequest) -> Result<(), AppError> {
    validate_optional_text(req.phone.as_deref(), "Phone", 32)?;
    validate_optional_text(req.guardian_phone.as_deref(), "Guardian phone", 32)?;
    validate_optional_text(req.address.as_deref(), "Address", 1000)?;
    validate_optional_text(req.date_of_birth.as_deref(), "Date of birth", 32)?;
    validate_optional_text(req.guardian_name.as_deref(), "Guardian name", 128)?;
    validate_optional_text(req.guardian_occupation.as_deref(), "Guardian occupation", 128)?;
    if let Some(income) = req.annual_family_income
        && income < 0
    {
        return Err(AppError::Validation(
            "annual_family_income must be >= 0".into(),
        ));
    }

    let mut seen = std::collections::HashSet::new();
    for record in &req.semesters {
        if !(1..=12).contains(&record.semester) {
            return Err(AppError::Validation(
                "Semester must be between 1 and 12".into(),
            ));
        }
        if !seen.insert(record.semester) {
            return Err(AppError::Validation(format!(
                "Duplicate semester {}",
                record.semester
            )));
        }
        if !(0.0..=10.0).contains(&record.sgpa) {
            return Err(AppError::Validation("SGPA must be between 0 and 10".into()));
        }
        if record.credits < 0 || record.subjects.iter().any(|s| s.credits < 0) {
            return Err(AppError::Validation("Credits must be >= 0".into()));
        }
    }
    Ok(())
}

/// Optional note attached to a verification decision.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct ErpReviewRequest {
    #[schema(example = "Marksheets verified against originals")]
    pub remarks: Option<String>,
}

pub fn validate_erp_review(req: &ErpReviewRequest) -> Result<(), AppError> {
    validate_optional_text(req.remarks.as_deref(), "Remarks", 1000)
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ErpListQuery {
    pub status: Option<ErpStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErpProfileResponse {
    pub id: i32,
    pub student_id: i32,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_occupation: Option<String>,
    pub annual_family_income: Option<i64>,
    pub semesters: Vec<SemesterRecord>,
    /// Credit-weighted mean SGPA.
    #[schema(example = 8.6)]
    pub cgpa: Option<f64>,
    pub status: ErpStatus,
    pub remarks: Option<String>,
    pub verified_by: Option<i32>,
    pub verified_at: Option<DateTime<Utc>>,
    pub points_awarded: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<erp_profile::Model> for ErpProfileResponse {
    fn from(m: erp_profile::Model) -> Self {
        let semesters = m.semester_records();
        Self {
            id: m.id,
            student_id: m.student_id,
            phone: m.phone,
            address: m.address,
            date_of_birth: m.date_of_birth,
            guardian_name: m.guardian_name,
            guardian_phone: m.guardian_phone,
            guardian_occupation: m.guardian_occupation,
            annual_family_income: m.annual_family_income,
            cgpa: cgpa(&semesters),
            semesters,
            status: m.status,
            remarks: m.remarks,
            verified_by: m.verified_by,
            verified_at: m.verified_at,
            points_awarded: m.points_awarded,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErpListResponse {
    pub data: Vec<ErpProfileResponse>,
    pub pagination: Pagination,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErpVerifyResponse {
    pub profile: ErpProfileResponse,
    pub student_total_points: i32,
}
