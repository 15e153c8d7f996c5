use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::student;
use crate::error::AppError;

/// Public view of a student record.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StudentResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "Asha Kumar")]
    pub name: String,
    #[schema(example = "asha@college.edu")]
    pub email: String,
    #[schema(example = "21CS001")]
    pub roll_number: String,
    #[schema(example = "Computer Science")]
    pub department: String,
    #[schema(example = 3)]
    pub year: i32,
    #[schema(example = 250)]
    pub total_points: i32,
    pub erp_points: i32,
    pub manual_points: i32,
    pub created_at: DateTime<Utc>,
}

impl From<student::Model> for StudentResponse {
    fn from(s: student::Model) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            roll_number: s.roll_number,
            department: s.department,
            year: s.year,
            total_points: s.total_points,
            erp_points: s.erp_points,
            manual_points: s.manual_points,
            created_at: s.created_at,
        }
    }
}

/// Fields a student may change on their own profile.
#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateStudentRequest {
    pub name: Option<String>,
    pub department: Option<String>,
    pub year: Option<i32>,
}

pub fn validate_update_student(req: &UpdateStudentRequest) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > 128 {
            return Err(AppError::Validation("Name must be 1-128 characters".into()));
        }
    }
    if let Some(ref department) = req.department {
        let department = department.trim();
        if department.is_empty() || department.chars().count() > 128 {
            return Err(AppError::Validation(
                "Department must be 1-128 characters".into(),
            ));
        }
    }
    if let Some(year) = req.year
        && !(1..=6).contains(&year)
    {
        return Err(AppError::Validation("Year must be between 1 and 6".into()));
    }
    Ok(())
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Number of students to return (1-100, default 10).
    pub limit: Option<u64>,
    pub department: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based position; ties share the rank of their first occurrence.
    #[schema(example = 1)]
    pub rank: u64,
    pub id: i32,
    pub name: String,
    pub roll_number: String,
    pub department: String,
    pub year: i32,
    pub total_points: i32,
}

/// Assign competition ranks ("1224") to rows already sorted by points descending.
pub fn competition_ranks(points: &[i32]) -> Vec<u64> {
    let mut ranks = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let rank = match i {
            0 => 1,
            _ if points[i - 1] == *p => ranks[i - 1],
            _ => i as u64 + 1,
        };
        ranks.push(rank);
    }
    ranks
}
