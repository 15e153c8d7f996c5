use common::{AchievementLevel, AchievementStatus, AchievementType};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "achievement")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    pub description: Option<String>,
    pub achievement_type: AchievementType,
    pub category: String,
    pub level: AchievementLevel,
    /// Placing for competitions ("1", "2nd", "runner", "participation", ...).
    pub award: Option<String>,
    /// Issuing institute or organization.
    pub issuer: Option<String>,
    /// Date as submitted by the student; format is checked by the validator.
    pub achievement_date: Option<String>,
    /// JSON array of `/uploads/<filename>` references.
    #[sea_orm(column_type = "JsonBinary")]
    pub proof_files: Json,

    pub status: AchievementStatus,
    /// Zero until approved.
    pub points: i32,
    pub rejection_reason: Option<String>,
    pub reviewed_by: Option<i32>,
    pub reviewed_at: Option<DateTimeUtc>,

    /// Suspicious-activity verdict computed at submission time.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub suspicious_activity: Option<Json>,
    /// Latest certificate validation verdict.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub validation: Option<Json>,

    pub student_id: i32,
    #[sea_orm(belongs_to, from = "student_id", to = "id")]
    pub student: HasOne<super::student::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Proof file references stored on this achievement.
    pub fn proof_refs(&self) -> Vec<String> {
        serde_json::from_value(self.proof_files.clone()).unwrap_or_default()
    }
}
