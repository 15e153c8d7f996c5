use axum::Json;
use axum::extract::{Query, State};
use sea_orm::*;
use tracing::instrument;

use crate::entity::student;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::achievement::find_student;
use crate::models::student::*;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/me",
    tag = "Students",
    operation_id = "getMyProfile",
    summary = "Get the caller's student record",
    responses(
        (status = 200, description = "Student record", body = StudentResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Students only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Student not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.id))]
pub async fn get_me(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StudentResponse>, AppError> {
    let student_id = auth_user.require_student()?;
    let student = find_student(&state.db, student_id).await?;
    Ok(Json(student.into()))
}

#[utoipa::path(
    patch,
    path = "/me",
    tag = "Students",
    operation_id = "updateMyProfile",
    summary = "Update the caller's name, department or year",
    request_body = UpdateStudentRequest,
    responses(
        (status = 200, description = "Updated record", body = StudentResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Students only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Student not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = auth_user.id))]
pub async fn update_me(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateStudentRequest>,
) -> Result<Json<StudentResponse>, AppError> {
    let student_id = auth_user.require_student()?;
    validate_update_student(&payload)?;

    let existing = find_student(&state.db, student_id).await?;
    let mut active: student::ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(department) = payload.department {
        active.department = Set(department.trim().to_string());
    }
    if let Some(year) = payload.year {
        active.year = Set(year);
    }
    let model = active.update(&state.db).await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Students",
    operation_id = "getLeaderboard",
    summary = "Top students by points",
    description = "Students with equal totals share a rank.",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard", body = Vec<LeaderboardEntry>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn leaderboard(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = query.limit.unwrap_or(10).clamp(1, 100);

    let mut select = student::Entity::find();
    if let Some(ref department) = query.department {
        select = select.filter(student::Column::Department.eq(department.trim()));
    }
    let students = select
        .order_by_desc(student::Column::TotalPoints)
        .order_by_asc(student::Column::Name)
        .order_by_asc(student::Column::Id)
        .limit(Some(limit))
        .all(&state.db)
        .await?;

    let totals: Vec<i32> = students.iter().map(|s| s.total_points).collect();
    let entries = competition_ranks(&totals)
        .into_iter()
        .zip(students)
        .map(|(rank, s)| LeaderboardEntry {
            rank,
            id: s.id,
            name: s.name,
            roll_number: s.roll_number,
            department: s.department,
            year: s.year,
            total_points: s.total_points,
        })
        .collect();

    Ok(Json(entries))
}
