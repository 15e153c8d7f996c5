use std::collections::HashMap;

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use common::{AchievementLevel, AchievementStatus, ErpStatus};
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{achievement, erp_profile, student};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::handlers::achievement::find_student;
use crate::models::achievement::AchievementResponse;
use crate::models::admin::*;
use crate::models::shared::{Pagination, escape_like, page_params};
use crate::models::student::StudentResponse;
use crate::services::export::{self, AchievementRow, ProofEntry, StudentRow};
use crate::services::points::{PointsService, ReconcileReport};
use crate::state::AppState;

const RECENT_ACHIEVEMENTS: u64 = 10;

fn parse_order(sort_order: Option<&str>) -> Result<Order, AppError> {
    match sort_order {
        None | Some("desc") => Ok(Order::Desc),
        Some("asc") => Ok(Order::Asc),
        Some(_) => Err(AppError::Validation(
            "sort_order must be one of: asc, desc".into(),
        )),
    }
}

fn attachment(bytes: Vec<u8>, content_type: &str, filename: &str) -> Result<Response, AppError> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, bytes.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

async fn export_achievements_query(
    db: &DatabaseConnection,
    status: Option<AchievementStatus>,
) -> Result<Vec<achievement::Model>, DbErr> {
    let mut select = achievement::Entity::find();
    if let Some(status) = status {
        select = select.filter(achievement::Column::Status.eq(status));
    }
    select
        .order_by_asc(achievement::Column::StudentId)
        .order_by_asc(achievement::Column::CreatedAt)
        .all(db)
        .await
}

async fn students_by_id(
    db: &DatabaseConnection,
    achievements: &[achievement::Model],
) -> Result<HashMap<i32, student::Model>, DbErr> {
    let mut ids: Vec<i32> = achievements.iter().map(|a| a.student_id).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(student::Entity::find()
        .filter(student::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect())
}

#[utoipa::path(
    get,
    path = "/students",
    tag = "Admin",
    operation_id = "listStudents",
    summary = "List students",
    description = "Paginated student list with case-insensitive search over name, email and roll \
        number. Sorted by `total_points` unless `sort_by` says otherwise.",
    params(StudentListQuery),
    responses(
        (status = 200, description = "Students", body = StudentListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_students(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<StudentListQuery>,
) -> Result<Json<StudentListResponse>, AppError> {
    auth_user.require_admin()?;
    let (page, per_page) = page_params(query.page, query.per_page);

    let mut select = student::Entity::find();

    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            let pattern = format!("%{}%", term.to_lowercase());
            let like = |col: student::Column| {
                Expr::expr(Func::lower(Expr::col(col)))
                    .like(LikeExpr::new(pattern.clone()).escape('\\'))
            };
            select = select.filter(
                Condition::any()
                    .add(like(student::Column::Name))
                    .add(like(student::Column::Email))
                    .add(like(student::Column::RollNumber)),
            );
        }
    }
    if let Some(ref department) = query.department {
        select = select.filter(student::Column::Department.eq(department.trim()));
    }
    if let Some(year) = query.year {
        select = select.filter(student::Column::Year.eq(year));
    }

    let sort_col = match query.sort_by.as_deref() {
        None | Some("total_points") => student::Column::TotalPoints,
        Some("name") => student::Column::Name,
        Some("created_at") => student::Column::CreatedAt,
        Some(_) => {
            return Err(AppError::Validation(
                "sort_by must be one of: total_points, name, created_at".into(),
            ));
        }
    };
    let order = parse_order(query.sort_order.as_deref())?;

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by(sort_col, order)
        .order_by_asc(student::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(StudentResponse::from)
        .collect();

    Ok(Json(StudentListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/students/{id}",
    tag = "Admin",
    operation_id = "getStudentDetail",
    summary = "Get a student with an achievement summary",
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Student detail", body = StudentDetailResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Student not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_student(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<StudentDetailResponse>, AppError> {
    auth_user.require_admin()?;
    let student = find_student(&state.db, id).await?;

    let counts: Vec<(AchievementStatus, i64)> = achievement::Entity::find()
        .select_only()
        .column(achievement::Column::Status)
        .column_as(achievement::Column::Id.count(), "count")
        .filter(achievement::Column::StudentId.eq(id))
        .group_by(achievement::Column::Status)
        .into_tuple()
        .all(&state.db)
        .await?;

    let mut summary = AchievementSummary::default();
    for (status, count) in counts {
        let count = count as u64;
        summary.total += count;
        match status {
            AchievementStatus::Pending => summary.pending = count,
            AchievementStatus::Approved => summary.approved = count,
            AchievementStatus::Rejected => summary.rejected = count,
        }
    }
    summary.approved_points = PointsService::new(&state.db).approved_points(id).await?;

    let recent_achievements = achievement::Entity::find()
        .filter(achievement::Column::StudentId.eq(id))
        .order_by_desc(achievement::Column::CreatedAt)
        .limit(Some(RECENT_ACHIEVEMENTS))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|m| AchievementResponse::from_model(m, true))
        .collect();

    Ok(Json(StudentDetailResponse {
        student: student.into(),
        summary,
        recent_achievements,
    }))
}

#[utoipa::path(
    post,
    path = "/students/{id}/points",
    tag = "Admin",
    operation_id = "adjustStudentPoints",
    summary = "Manually adjust a student's points",
    description = "Adds `delta` to the student's total. Deductions stop at zero; the amount \
        actually applied is returned.",
    params(("id" = i32, Path, description = "Student ID")),
    request_body = AdjustPointsRequest,
    responses(
        (status = 200, description = "Points adjusted", body = AdjustPointsResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Student not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin_id = auth_user.id, id, delta = payload.delta))]
pub async fn adjust_points(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<AdjustPointsRequest>,
) -> Result<Json<AdjustPointsResponse>, AppError> {
    auth_user.require_admin()?;
    validate_adjust_points(&payload)?;

    let txn = state.db.begin().await?;
    let (student, applied) = PointsService::new(&txn)
        .adjust_points(id, payload.delta)
        .await?;
    txn.commit().await?;

    tracing::info!(
        applied,
        total_points = student.total_points,
        reason = payload.reason.as_deref().unwrap_or(""),
        "Manual point adjustment"
    );

    Ok(Json(AdjustPointsResponse {
        student_id: student.id,
        applied,
        total_points: student.total_points,
    }))
}

#[utoipa::path(
    post,
    path = "/students/{id}/points/reconcile",
    tag = "Admin",
    operation_id = "reconcileStudentPoints",
    summary = "Recompute a student's point total",
    description = "Recomputes `total_points` from approved achievements, ERP points and manual \
        adjustments, and reports the drift that was corrected.",
    params(("id" = i32, Path, description = "Student ID")),
    responses(
        (status = 200, description = "Reconciled", body = ReconcileReport),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Student not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn reconcile_points(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ReconcileReport>, AppError> {
    auth_user.require_admin()?;

    let txn = state.db.begin().await?;
    let report = PointsService::new(&txn).reconcile_points(id).await?;
    txn.commit().await?;

    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Admin",
    operation_id = "getStats",
    summary = "Dashboard aggregates",
    responses(
        (status = 200, description = "Aggregates", body = StatsResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn get_stats(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    auth_user.require_admin()?;
    let db = &state.db;

    let total_students = student::Entity::find().count(db).await?;

    let by_status: Vec<(AchievementStatus, i64)> = achievement::Entity::find()
        .select_only()
        .column(achievement::Column::Status)
        .column_as(achievement::Column::Id.count(), "count")
        .group_by(achievement::Column::Status)
        .into_tuple()
        .all(db)
        .await?;
    let mut achievements_by_status = StatusCounts::default();
    let mut total_achievements = 0;
    for (status, count) in by_status {
        let count = count as u64;
        total_achievements += count;
        match status {
            AchievementStatus::Pending => achievements_by_status.pending = count,
            AchievementStatus::Approved => achievements_by_status.approved = count,
            AchievementStatus::Rejected => achievements_by_status.rejected = count,
        }
    }

    let by_level: HashMap<AchievementLevel, i64> = achievement::Entity::find()
        .select_only()
        .column(achievement::Column::Level)
        .column_as(achievement::Column::Id.count(), "count")
        .group_by(achievement::Column::Level)
        .into_tuple::<(AchievementLevel, i64)>()
        .all(db)
        .await?
        .into_iter()
        .collect();
    let achievements_by_level = AchievementLevel::ALL
        .iter()
        .map(|level| LevelCount {
            level: level.to_string(),
            count: by_level.get(level).copied().unwrap_or(0) as u64,
        })
        .collect();

    let total_points_awarded: Option<Option<i64>> = achievement::Entity::find()
        .select_only()
        .column_as(achievement::Column::Points.sum(), "sum")
        .filter(achievement::Column::Status.eq(AchievementStatus::Approved))
        .into_tuple()
        .one(db)
        .await?;

    let flagged_suspicious = achievement::Entity::find()
        .filter(Expr::cust(
            "COALESCE((suspicious_activity ->> 'is_suspicious')::boolean, false)",
        ))
        .count(db)
        .await?;

    let erp: Vec<(ErpStatus, i64)> = erp_profile::Entity::find()
        .select_only()
        .column(erp_profile::Column::Status)
        .column_as(erp_profile::Column::Id.count(), "count")
        .group_by(erp_profile::Column::Status)
        .into_tuple()
        .all(db)
        .await?;
    let mut erp_profiles = ErpCounts::default();
    for (status, count) in erp {
        let count = count as u64;
        match status {
            ErpStatus::Draft => erp_profiles.draft = count,
            ErpStatus::Submitted => erp_profiles.submitted = count,
            ErpStatus::Verified => erp_profiles.verified = count,
            ErpStatus::Rejected => erp_profiles.rejected = count,
        }
    }

    Ok(Json(StatsResponse {
        total_students,
        total_achievements,
        achievements_by_status,
        achievements_by_level,
        total_points_awarded: total_points_awarded.flatten().unwrap_or(0),
        flagged_suspicious,
        erp_profiles,
    }))
}

#[utoipa::path(
    get,
    path = "/export/achievements",
    tag = "Export",
    operation_id = "exportAchievements",
    summary = "Export achievements as CSV",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn export_achievements(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    auth_user.require_admin()?;

    let achievements = export_achievements_query(&state.db, query.status).await?;
    let students = students_by_id(&state.db, &achievements).await?;
    let rows: Vec<AchievementRow> = achievements
        .iter()
        .map(|a| AchievementRow::new(a, students.get(&a.student_id)))
        .collect();

    let csv = export::achievements_csv(&rows)?;
    attachment(csv, "text/csv; charset=utf-8", "achievements.csv")
}

#[utoipa::path(
    get,
    path = "/export/students",
    tag = "Export",
    operation_id = "exportStudents",
    summary = "Export students as CSV",
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user))]
pub async fn export_students(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    auth_user.require_admin()?;

    let students = student::Entity::find()
        .order_by_desc(student::Column::TotalPoints)
        .order_by_asc(student::Column::Id)
        .all(&state.db)
        .await?;
    let rows: Vec<StudentRow> = students.iter().map(StudentRow::from).collect();

    let csv = export::students_csv(&rows)?;
    attachment(csv, "text/csv; charset=utf-8", "students.csv")
}

#[utoipa::path(
    get,
    path = "/export/proofs",
    tag = "Export",
    operation_id = "exportProofs",
    summary = "Download proof files as a ZIP archive",
    description = "Archives every proof file, grouped by the student's roll number. Files that \
        no longer exist are skipped.",
    params(ExportQuery),
    responses(
        (status = 200, description = "ZIP archive", content_type = "application/zip"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn export_proofs(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    auth_user.require_admin()?;

    let achievements = export_achievements_query(&state.db, query.status).await?;
    let students = students_by_id(&state.db, &achievements).await?;
    let entries: Vec<ProofEntry> = achievements
        .iter()
        .flat_map(|a| {
            let folder = students
                .get(&a.student_id)
                .map(|s| s.roll_number.clone())
                .unwrap_or_else(|| format!("student-{}", a.student_id));
            a.proof_refs().into_iter().map(move |reference| ProofEntry {
                folder: folder.clone(),
                achievement_id: a.id,
                reference,
            })
        })
        .collect();

    let archive = export::proofs_zip(state.uploads.as_ref(), &entries).await?;
    tracing::info!(
        included = archive.included,
        skipped = archive.skipped,
        "Built proof archive"
    );
    attachment(archive.bytes, "application/zip", "proofs.zip")
}
