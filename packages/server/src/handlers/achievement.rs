use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::storage::parse_upload_ref;
use common::{AchievementStatus, AchievementType};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, LockType};
use sea_orm::*;
use tracing::{instrument, warn};

use crate::entity::{achievement, student};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::achievement::*;
use crate::models::shared::{Pagination, escape_like, page_params};
use crate::services::certificate::{self, CertificateContext, ValidationVerdict};
use crate::services::mail::{self, Decision, Mailer};
use crate::services::points::{PointsService, calculate_points};
use crate::services::suspicious::{Submission, SuspiciousActivityDetector};
use crate::state::AppState;

pub(crate) async fn find_achievement<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<achievement::Model, AppError> {
    achievement::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Achievement not found".into()))
}

async fn find_achievement_for_update<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<achievement::Model, AppError> {
    achievement::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Achievement not found".into()))
}

pub(crate) async fn find_student<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<student::Model, AppError> {
    student::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".into()))
}

fn ensure_pending(model: &achievement::Model) -> Result<(), AppError> {
    if model.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Achievement is already {}",
            model.status
        )));
    }
    Ok(())
}

fn notify(mailer: Arc<dyn Mailer>, student: &student::Model, title: &str, decision: Decision) {
    let email = mail::decision_email(&student.email, &student.name, title, &decision);
    mail::spawn_send(mailer, email);
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[utoipa::path(
    post,
    path = "/",
    tag = "Achievements",
    operation_id = "createAchievement",
    summary = "Submit an achievement",
    description = "Creates a pending achievement for the calling student. Every proof file must \
        have been uploaded first. The suspicious-activity detector runs on submission; its verdict \
        is stored for reviewers and omitted if the analysis fails.",
    request_body = CreateAchievementRequest,
    responses(
        (status = 201, description = "Achievement submitted", body = AchievementResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Only students can submit (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(student_id = auth_user.id, title = %payload.title))]
pub async fn create_achievement(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateAchievementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = auth_user.require_student()?;
    validate_create_achievement(&payload)?;

    let mut proof_files = Vec::with_capacity(payload.proof_files.len());
    for reference in &payload.proof_files {
        let reference = reference.trim();
        let filename = parse_upload_ref(reference).ok_or_else(|| {
            AppError::Validation(format!("Invalid proof file reference: {reference}"))
        })?;
        if !state.uploads.exists(filename).await? {
            return Err(AppError::Validation(format!(
                "Proof file not found: {reference}"
            )));
        }
        proof_files.push(reference.to_string());
    }

    let now = Utc::now();
    let issuer = trimmed(payload.issuer);
    let candidate = Submission {
        title: payload.title.trim().to_string(),
        issuer: issuer.clone(),
        level: payload.level,
        created_at: now,
    };

    let detector = SuspiciousActivityDetector::new(&state.db, state.config.detector.offset());
    let verdict = match detector.analyze(student_id, &candidate, now).await {
        Ok(verdict) => serde_json::to_value(&verdict).ok(),
        Err(e) => {
            warn!(error = %e, "Suspicious-activity analysis failed; storing without verdict");
            None
        }
    };

    // Awards only make sense for competitions.
    let award = match payload.achievement_type {
        AchievementType::Competition => trimmed(payload.award),
        AchievementType::Certification => None,
    };

    let new_achievement = achievement::ActiveModel {
        title: Set(candidate.title),
        description: Set(trimmed(payload.description)),
        achievement_type: Set(payload.achievement_type),
        category: Set(payload.category.trim().to_string()),
        level: Set(payload.level),
        award: Set(award),
        issuer: Set(issuer),
        achievement_date: Set(trimmed(payload.achievement_date)),
        proof_files: Set(serde_json::json!(proof_files)),
        status: Set(AchievementStatus::Pending),
        points: Set(0),
        rejection_reason: Set(None),
        reviewed_by: Set(None),
        reviewed_at: Set(None),
        suspicious_activity: Set(verdict),
        validation: Set(None),
        student_id: Set(student_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let model = new_achievement.insert(&state.db).await?;

    Ok((
        StatusCode::CREATED,
        Json(AchievementResponse::from_model(model, false)),
    ))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Achievements",
    operation_id = "listAchievements",
    summary = "List achievements",
    description = "Students see their own achievements; admins see everyone's and may filter by \
        `student_id`. Sorted by submission time.",
    params(AchievementListQuery),
    responses(
        (status = 200, description = "Achievements", body = AchievementListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(caller = auth_user.id))]
pub async fn list_achievements(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<AchievementListQuery>,
) -> Result<Json<AchievementListResponse>, AppError> {
    let (page, per_page) = page_params(query.page, query.per_page);
    let is_admin = auth_user.is_admin();

    let mut select = achievement::Entity::find();

    if is_admin {
        if let Some(student_id) = query.student_id {
            select = select.filter(achievement::Column::StudentId.eq(student_id));
        }
    } else {
        select = select.filter(achievement::Column::StudentId.eq(auth_user.id));
    }
    if let Some(status) = query.status {
        select = select.filter(achievement::Column::Status.eq(status));
    }
    if let Some(kind) = query.achievement_type {
        select = select.filter(achievement::Column::AchievementType.eq(kind));
    }
    if let Some(level) = query.level {
        select = select.filter(achievement::Column::Level.eq(level));
    }
    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(achievement::Column::Title)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    let order = match query.sort_order.as_deref() {
        None | Some("desc") => Order::Desc,
        Some("asc") => Order::Asc,
        Some(_) => {
            return Err(AppError::Validation(
                "sort_order must be one of: asc, desc".into(),
            ));
        }
    };

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by(achievement::Column::CreatedAt, order.clone())
        .order_by(achievement::Column::Id, order)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|m| AchievementResponse::from_model(m, is_admin))
        .collect();

    Ok(Json(AchievementListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Achievements",
    operation_id = "getAchievement",
    summary = "Get an achievement",
    description = "Students can read their own achievements; admins can read any and also see the \
        stored verdicts.",
    params(("id" = i32, Path, description = "Achievement ID")),
    responses(
        (status = 200, description = "Achievement", body = AchievementResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Achievement not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.id, id))]
pub async fn get_achievement(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<AchievementResponse>, AppError> {
    let model = find_achievement(&state.db, id).await?;
    let is_admin = auth_user.is_admin();
    if !is_admin && model.student_id != auth_user.id {
        return Err(AppError::PermissionDenied);
    }
    Ok(Json(AchievementResponse::from_model(model, is_admin)))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Achievements",
    operation_id = "deleteAchievement",
    summary = "Delete an achievement",
    description = "Students may delete their own pending achievements. Admins may delete any; \
        deleting an approved achievement deducts its points from the student in the same transaction.",
    params(("id" = i32, Path, description = "Achievement ID")),
    responses(
        (status = 204, description = "Achievement deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Not the owner (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Achievement not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already reviewed (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(caller = auth_user.id, id))]
pub async fn delete_achievement(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let txn = state.db.begin().await?;
    let model = find_achievement_for_update(&txn, id).await?;

    if auth_user.is_admin() {
        if model.status == AchievementStatus::Approved && model.points != 0 {
            PointsService::new(&txn)
                .add_points(model.student_id, -model.points)
                .await?;
            tracing::info!(
                student_id = model.student_id,
                points = model.points,
                "Reversed points of deleted approved achievement"
            );
        }
    } else {
        if model.student_id != auth_user.id {
            return Err(AppError::PermissionDenied);
        }
        if model.status != AchievementStatus::Pending {
            return Err(AppError::Conflict(
                "Only pending achievements can be deleted".into(),
            ));
        }
    }

    achievement::Entity::delete_by_id(model.id).exec(&txn).await?;
    txn.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/approve",
    tag = "Review",
    operation_id = "approveAchievement",
    summary = "Approve a pending achievement",
    description = "Awards `custom_points` if given, otherwise the calculated points, and adds them \
        to the student's total in the same transaction. The student is notified by email.",
    params(("id" = i32, Path, description = "Achievement ID")),
    request_body = ApproveAchievementRequest,
    responses(
        (status = 200, description = "Achievement approved", body = ReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Achievement not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already reviewed (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin_id = auth_user.id, id))]
pub async fn approve_achievement(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ApproveAchievementRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    auth_user.require_admin()?;
    validate_approve(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_achievement_for_update(&txn, id).await?;
    ensure_pending(&existing)?;

    let points = payload.custom_points.unwrap_or_else(|| {
        calculate_points(
            existing.achievement_type,
            existing.level.as_str(),
            existing.award.as_deref(),
        )
    });

    let now = Utc::now();
    let mut active: achievement::ActiveModel = existing.into();
    active.status = Set(AchievementStatus::Approved);
    active.points = Set(points);
    active.rejection_reason = Set(None);
    active.reviewed_by = Set(Some(auth_user.id));
    active.reviewed_at = Set(Some(now));
    active.updated_at = Set(now);
    let model = active.update(&txn).await?;

    let student = PointsService::new(&txn)
        .add_points(model.student_id, points)
        .await?;
    txn.commit().await?;

    tracing::info!(student_id = student.id, points, "Achievement approved");
    notify(
        state.mailer.clone(),
        &student,
        &model.title,
        Decision::Approved { points },
    );

    Ok(Json(ReviewResponse {
        achievement: AchievementResponse::from_model(model, true),
        student_total_points: student.total_points,
    }))
}

#[utoipa::path(
    post,
    path = "/{id}/reject",
    tag = "Review",
    operation_id = "rejectAchievement",
    summary = "Reject a pending achievement",
    description = "Marks the achievement rejected without touching any points. The student is \
        notified by email.",
    params(("id" = i32, Path, description = "Achievement ID")),
    request_body = RejectAchievementRequest,
    responses(
        (status = 200, description = "Achievement rejected", body = ReviewResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Achievement not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already reviewed (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin_id = auth_user.id, id))]
pub async fn reject_achievement(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<RejectAchievementRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    auth_user.require_admin()?;
    validate_reject(&payload)?;

    let txn = state.db.begin().await?;
    let existing = find_achievement_for_update(&txn, id).await?;
    ensure_pending(&existing)?;

    let reason = trimmed(payload.reason);
    let now = Utc::now();
    let mut active: achievement::ActiveModel = existing.into();
    active.status = Set(AchievementStatus::Rejected);
    active.points = Set(0);
    active.rejection_reason = Set(reason.clone());
    active.reviewed_by = Set(Some(auth_user.id));
    active.reviewed_at = Set(Some(now));
    active.updated_at = Set(now);
    let model = active.update(&txn).await?;
    txn.commit().await?;

    let student = find_student(&state.db, model.student_id).await?;
    notify(
        state.mailer.clone(),
        &student,
        &model.title,
        Decision::Rejected { reason },
    );

    Ok(Json(ReviewResponse {
        achievement: AchievementResponse::from_model(model, true),
        student_total_points: student.total_points,
    }))
}

#[utoipa::path(
    post,
    path = "/{id}/validate",
    tag = "Review",
    operation_id = "validateAchievement",
    summary = "Validate the certificate of an achievement",
    description = "Runs the certificate validator on the first proof file and stores the verdict, \
        replacing any earlier one. If the image model is unavailable the verdict is still produced \
        from neutral scores.",
    params(("id" = i32, Path, description = "Achievement ID")),
    responses(
        (status = 200, description = "Validation verdict", body = ValidationVerdict),
        (status = 400, description = "No proof files (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Achievement or proof file not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(admin_id = auth_user.id, id))]
pub async fn validate_achievement(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ValidationVerdict>, AppError> {
    auth_user.require_admin()?;

    let model = find_achievement(&state.db, id).await?;
    let proof_ref = model
        .proof_refs()
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Validation("Achievement has no proof files".into()))?;
    let filename = parse_upload_ref(&proof_ref)
        .ok_or_else(|| AppError::NotFound(format!("File '{proof_ref}' not found")))?;
    if !state.uploads.exists(filename).await? {
        return Err(AppError::NotFound(format!("File '{filename}' not found")));
    }
    let image = state.uploads.get(filename).await?;
    let mime_type = mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let student = find_student(&state.db, model.student_id).await?;
    let ctx = CertificateContext {
        title: model.title.clone(),
        achievement_type: model.achievement_type,
        category: model.category.clone(),
        level: model.level,
        issuer: model.issuer.clone(),
        achievement_date: model.achievement_date.clone(),
        student_name: student.name,
    };

    let ai = certificate::analyze_image(state.vision.as_ref(), &image, &mime_type, &ctx).await;
    let verdict = certificate::build_verdict(&proof_ref, ai, &ctx, Utc::now());

    let value = serde_json::to_value(&verdict)
        .map_err(|e| AppError::Internal(format!("Failed to encode verdict: {e}")))?;
    let mut active: achievement::ActiveModel = model.into();
    active.validation = Set(Some(value));
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    tracing::info!(trust_score = verdict.trust_score, "Certificate validated");
    Ok(Json(verdict))
}
