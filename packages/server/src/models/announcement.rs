use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, validate_title};
use crate::entity::announcement;
use crate::error::AppError;

const MAX_CONTENT_CHARS: usize = 20_000;

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateAnnouncementRequest {
    #[schema(example = "Achievement portal closes Friday")]
    pub title: String,
    #[schema(example = "Submit pending certificates before 5 PM.")]
    pub content: String,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

fn validate_content(content: &str) -> Result<(), AppError> {
    let content = content.trim();
    if content.is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "Content must be 1-{MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_create_announcement(req: &CreateAnnouncementRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    validate_content(&req.content)
}

pub fn validate_update_announcement(req: &UpdateAnnouncementRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(ref content) = req.content {
        validate_content(content)?;
    }
    Ok(())
}

#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnnouncementListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AnnouncementResponse {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub created_by: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<announcement::Model> for AnnouncementResponse {
    fn from(m: announcement::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            content: m.content,
            created_by: m.created_by,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct AnnouncementListResponse {
    pub data: Vec<AnnouncementResponse>,
    pub pagination: Pagination,
}
