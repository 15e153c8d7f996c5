use common::ErpStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One semester of academic record. Stored as a JSON array on the profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SemesterRecord {
    pub semester: i32,
    pub sgpa: f64,
    pub credits: i32,
    #[serde(default)]
    pub subjects: Vec<SubjectGrade>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubjectGrade {
    pub code: String,
    pub name: String,
    pub grade: String,
    pub credits: i32,
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "erp_profile")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub student_id: i32,
    #[sea_orm(belongs_to, from = "student_id", to = "id")]
    pub student: HasOne<super::student::Entity>,

    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub guardian_occupation: Option<String>,
    pub annual_family_income: Option<i64>,

    /// JSON array of [`SemesterRecord`].
    #[sea_orm(column_type = "JsonBinary")]
    pub semesters: Json,

    pub status: ErpStatus,
    pub remarks: Option<String>,
    pub verified_by: Option<i32>,
    pub verified_at: Option<DateTimeUtc>,
    /// Points granted on verification; non-zero at most once.
    pub points_awarded: i32,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn semester_records(&self) -> Vec<SemesterRecord> {
        serde_json::from_value(self.semesters.clone()).unwrap_or_default()
    }
}

/// Credit-weighted mean SGPA, rounded to two decimals. `None` without credits.
pub fn cgpa(semesters: &[SemesterRecord]) -> Option<f64> {
    let total_credits: i32 = semesters.iter().map(|s| s.credits.max(0)).sum();
    if total_credits == 0 {
        return None;
    }
    let weighted: f64 = semesters
        .iter()
        .map(|s| s.sgpa * f64::from(s.credits.max(0)))
        .sum();
    Some((weighted / f64::from(total_credits) * 100.0).round() / 100.0)
}
