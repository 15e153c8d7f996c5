use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "student")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[sea_orm(unique)]
    pub roll_number: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub department: String,
    pub year: i32,

    /// Running total: approved achievement points + `erp_points` + `manual_points`.
    pub total_points: i32,
    /// Points granted by ERP verification.
    pub erp_points: i32,
    /// Net points applied through manual admin adjustments.
    pub manual_points: i32,

    #[sea_orm(has_many)]
    pub achievements: HasMany<super::achievement::Entity>,

    #[sea_orm(has_one)]
    pub erp_profile: HasOne<super::erp_profile::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
