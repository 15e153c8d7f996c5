use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use common::ErpStatus;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::instrument;

use crate::entity::erp_profile;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::achievement::find_student;
use crate::models::erp::*;
use crate::models::shared::{Pagination, page_params};
use crate::services::points::PointsService;
use crate::state::AppState;

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn find_profile<C: ConnectionTrait>(
    db: &C,
    student_id: i32,
    lock: bool,
) -> Result<Option<erp_profile::Model>, DbErr> {
    let mut select = erp_profile::Entity::find().filter(erp_profile::Column::StudentId.eq(student_id));
    if lock {
        select = select.lock(LockType::Update);
    }
    select.one(db).await
}

fn not_found() -> AppError {
    AppError::NotFound("ERP profile not found".into())
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "ERP",
    operation_id = "getMyErpProfile",
    summary = "Get the caller's ERP profile",
    responses(
        (status = 200, description = "ERP profile", body = ErpProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Students only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "No profile yet (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.id))]
pub async fn get_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ErpProfileResponse>, AppError> {
    let student_id = auth_user.require_student()?;
    let profile = find_profile(&state.db, student_id, false)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(profile.into()))
}

#[utoipa::path(
    put,
    path = "/me",
    tag = "ERP",
    operation_id = "upsertMyErpProfile",
    summary = "Create or replace the caller's ERP profile",
    description = "Replaces every field. A new profile starts as a draft; a verified profile can \
        no longer be edited.",
    request_body = UpsertErpRequest,
    responses(
        (status = 200, description = "Saved profile", body = ErpProfileResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Students only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Profile already verified (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = auth_user.id))]
pub async fn upsert_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpsertErpRequest>,
) -> Result<Json<ErpProfileResponse>, AppError> {
    let student_id = auth_user.require_student()?;
    validate_upsert_erp(&payload)?;

    let mut semesters = payload.semesters;
    semesters.sort_by_key(|s| s.semester);
    let semesters = serde_json::to_value(&semesters)
        .map_err(|e| AppError::Internal(format!("Failed to encode semesters: {e}")))?;

    let now = Utc::now();
    let txn = state.db.begin().await?;
    let existing = find_profile(&txn, student_id, true).await?;

    let mut active = match existing {
        Some(profile) if profile.status == ErpStatus::Verified => {
            return Err(AppError::Conflict(
                "Verified ERP profiles cannot be edited".into(),
            ));
        }
        Some(profile) => profile.into_active_model(),
        None => erp_profile::ActiveModel {
            student_id: Set(student_id),
            status: Set(ErpStatus::Draft),
            remarks: Set(None),
            verified_by: Set(None),
            verified_at: Set(None),
            points_awarded: Set(0),
            created_at: Set(now),
            ..Default::default()
        },
    };

    active.phone = Set(trimmed(payload.phone));
    active.address = Set(trimmed(payload.address));
    active.date_of_birth = Set(trimmed(payload.date_of_birth));
    active.guardian_name = Set(trimmed(payload.guardian_name));
    active.guardian_phone = Set(trimmed(payload.guardian_phone));
    active.guardian_occupation = Set(trimmed(payload.guardian_occupation));
    active.annual_family_income = Set(payload.annual_family_income);
    active.semesters = Set(semesters);
    active.updated_at = Set(now);

    let model = active.save(&txn).await?.try_into_model()?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    post,
    path = "/me/submit",
    tag = "ERP",
    operation_id = "submitMyErpProfile",
    summary = "Submit the caller's ERP profile for verification",
    description = "Allowed from draft or rejected.",
    responses(
        (status = 200, description = "Submitted profile", body = ErpProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Students only (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "No profile yet (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already submitted or verified (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(student_id = auth_user.id))]
pub async fn submit_my_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ErpProfileResponse>, AppError> {
    let student_id = auth_user.require_student()?;

    let txn = state.db.begin().await?;
    let profile = find_profile(&txn, student_id, true)
        .await?
        .ok_or_else(not_found)?;
    if !matches!(profile.status, ErpStatus::Draft | ErpStatus::Rejected) {
        return Err(AppError::Conflict(format!(
            "ERP profile is already {}",
            profile.status
        )));
    }

    let mut active: erp_profile::ActiveModel = profile.into();
    active.status = Set(ErpStatus::Submitted);
    active.updated_at = Set(Utc::now());
    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "ERP",
    operation_id = "listErpProfiles",
    summary = "List ERP profiles",
    description = "Oldest update first, so the verification queue reads in arrival order.",
    params(ErpListQuery),
    responses(
        (status = 200, description = "ERP profiles", body = ErpListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_profiles(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ErpListQuery>,
) -> Result<Json<ErpListResponse>, AppError> {
    auth_user.require_admin()?;
    let (page, per_page) = page_params(query.page, query.per_page);

    let mut select = erp_profile::Entity::find();
    if let Some(status) = query.status {
        select = select.filter(erp_profile::Column::Status.eq(status));
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by_asc(erp_profile::Column::UpdatedAt)
        .order_by_asc(erp_profile::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(ErpProfileResponse::from)
        .collect();

    Ok(Json(ErpListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    post,
    path = "/{student_id}/verify",
    tag = "ERP",
    operation_id = "verifyErpProfile",
    summary = "Verify a submitted ERP profile",
    description = "Marks the profile verified and grants the configured ERP points to the \
        student. Points are granted at most once per profile.",
    params(("student_id" = i32, Path, description = "Student ID")),
    request_body = ErpReviewRequest,
    responses(
        (status = 200, description = "Verified", body = ErpVerifyResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Profile not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Profile is not submitted (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin_id = auth_user.id, student_id))]
pub async fn verify_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
    AppJson(payload): AppJson<ErpReviewRequest>,
) -> Result<Json<ErpVerifyResponse>, AppError> {
    auth_user.require_admin()?;
    validate_erp_review(&payload)?;

    let txn = state.db.begin().await?;
    let profile = find_profile(&txn, student_id, true)
        .await?
        .ok_or_else(not_found)?;
    if profile.status != ErpStatus::Submitted {
        return Err(AppError::Conflict(format!(
            "ERP profile is {}, not submitted",
            profile.status
        )));
    }

    let points = PointsService::new(&txn);
    let (awarded, student) = if profile.points_awarded == 0 {
        let award = state.config.points.erp_verification;
        (award, points.award_erp_points(student_id, award).await?)
    } else {
        (profile.points_awarded, find_student(&txn, student_id).await?)
    };

    let now = Utc::now();
    let mut active: erp_profile::ActiveModel = profile.into();
    active.status = Set(ErpStatus::Verified);
    active.remarks = Set(trimmed(payload.remarks));
    active.verified_by = Set(Some(auth_user.id));
    active.verified_at = Set(Some(now));
    active.points_awarded = Set(awarded);
    active.updated_at = Set(now);
    let model = active.update(&txn).await?;
    txn.commit().await?;

    tracing::info!(awarded, total_points = student.total_points, "ERP profile verified");

    Ok(Json(ErpVerifyResponse {
        profile: model.into(),
        student_total_points: student.total_points,
    }))
}

#[utoipa::path(
    post,
    path = "/{student_id}/reject",
    tag = "ERP",
    operation_id = "rejectErpProfile",
    summary = "Reject a submitted ERP profile",
    description = "The student can edit and resubmit afterwards.",
    params(("student_id" = i32, Path, description = "Student ID")),
    request_body = ErpReviewRequest,
    responses(
        (status = 200, description = "Rejected", body = ErpProfileResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Profile not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Profile is not submitted (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin_id = auth_user.id, student_id))]
pub async fn reject_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(student_id): Path<i32>,
    AppJson(payload): AppJson<ErpReviewRequest>,
) -> Result<Json<ErpProfileResponse>, AppError> {
    auth_user.require_admin()?;
    validate_erp_review(&payload)?;

    let txn = state.db.begin().await?;
    let profile = find_profile(&txn, student_id, true)
        .await?
        .ok_or_else(not_found)?;
    if profile.status != ErpStatus::Submitted {
        return Err(AppError::Conflict(format!(
            "ERP profile is {}, not submitted",
            profile.status
        )));
    }

    let mut active: erp_profile::ActiveModel = profile.into();
    active.status = Set(ErpStatus::Rejected);
    active.remarks = Set(trimmed(payload.remarks));
    active.verified_by = Set(Some(auth_user.id));
    active.verified_at = Set(None);
    active.updated_at = Set(Utc::now());
    let model = active.update(&txn).await?;
    txn.commit().await?;

    Ok(Json(model.into()))
}
