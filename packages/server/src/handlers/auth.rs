use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{admin, student};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::auth::{
    AdminRegisterRequest, LoginRequest, LoginResponse, MeResponse, RegisterResponse,
    StudentRegisterRequest, validate_admin_register, validate_login_request,
    validate_student_register,
};
use crate::state::AppState;
use crate::utils::jwt::{self, Role};
use crate::utils::hash;

fn map_unique_violation(e: DbErr, message: &str) -> AppError {
    match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Registration race condition: unique constraint caught on insert");
            AppError::EmailTaken(message.into())
        }
        _ => AppError::from(e),
    }
}

fn hash_password(password: &str) -> Result<String, AppError> {
    hash::hash_password(password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {e}")))
}

fn check_password(password: &str, stored: &str) -> Result<(), AppError> {
    let is_valid = hash::verify_password(password, stored)
        .map_err(|e| AppError::Internal(format!("Password verify error: {e}")))?;
    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }
    Ok(())
}

fn issue_token(
    state: &AppState,
    id: i32,
    email: &str,
    name: &str,
    role: Role,
) -> Result<String, AppError> {
    let auth = &state.config.auth;
    let secret = match role {
        Role::Student => &auth.student_jwt_secret,
        Role::Admin => &auth.admin_jwt_secret,
    };
    jwt::sign(id, email, name, role, secret, auth.token_ttl_hours)
        .map_err(|e| AppError::Internal(format!("JWT sign error: {e}")))
}

#[utoipa::path(
    post,
    path = "/student/register",
    tag = "Auth",
    operation_id = "registerStudent",
    summary = "Register a student account",
    description = "Creates a student. Email (case-insensitive) and roll number must be unique.",
    request_body = StudentRegisterRequest,
    responses(
        (status = 201, description = "Student created", body = RegisterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 409, description = "Email or roll number taken (EMAIL_TAKEN)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(roll_number = %payload.roll_number))]
pub async fn register_student(
    State(state): State<AppState>,
    AppJson(payload): AppJson<StudentRegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_student_register(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let roll_number = payload.roll_number.trim().to_string();

    let taken = student::Entity::find()
        .filter(
            Condition::any()
                .add(student::Column::Email.eq(&email))
                .add(student::Column::RollNumber.eq(&roll_number)),
        )
        .one(&state.db)
        .await?;
    if let Some(existing) = taken {
        let what = if existing.email == email {
            "Email is already registered"
        } else {
            "Roll number is already registered"
        };
        return Err(AppError::EmailTaken(what.into()));
    }

    let new_student = student::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        roll_number: Set(roll_number),
        password: Set(hash_password(&payload.password)?),
        department: Set(payload.department.trim().to_string()),
        year: Set(payload.year),
        total_points: Set(0),
        erp_points: Set(0),
        manual_points: Set(0),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let student = new_student
        .insert(&state.db)
        .await
        .map_err(|e| map_unique_violation(e, "Email or roll number is already registered"))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: student.id,
            email: student.email,
            role: Role::Student,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/student/login",
    tag = "Auth",
    operation_id = "loginStudent",
    summary = "Log in as a student",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Wrong email or password (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login_student(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let student = student::Entity::find()
        .filter(student::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    check_password(&payload.password, &student.password)?;
    let token = issue_token(&state, student.id, &student.email, &student.name, Role::Student)?;

    Ok(Json(LoginResponse {
        token,
        id: student.id,
        name: student.name,
        email: student.email,
        role: Role::Student,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/login",
    tag = "Auth",
    operation_id = "loginAdmin",
    summary = "Log in as an administrator",
    description = "Admin tokens are signed with a secret separate from student tokens.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Wrong email or password (INVALID_CREDENTIALS)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login_admin(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let admin = admin::Entity::find()
        .filter(admin::Column::Email.eq(payload.email.trim().to_lowercase()))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    check_password(&payload.password, &admin.password)?;
    let token = issue_token(&state, admin.id, &admin.email, &admin.name, Role::Admin)?;

    Ok(Json(LoginResponse {
        token,
        id: admin.id,
        name: admin.name,
        email: admin.email,
        role: Role::Admin,
    }))
}

#[utoipa::path(
    post,
    path = "/admin/register",
    tag = "Auth",
    operation_id = "registerAdmin",
    summary = "Create another administrator",
    description = "Admin only.",
    request_body = AdminRegisterRequest,
    responses(
        (status = 201, description = "Admin created", body = RegisterResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 409, description = "Email taken (EMAIL_TAKEN)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(admin_id = auth_user.id))]
pub async fn register_admin(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<AdminRegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_admin()?;
    validate_admin_register(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let exists = admin::Entity::find()
        .filter(admin::Column::Email.eq(&email))
        .one(&state.db)
        .await?
        .is_some();
    if exists {
        return Err(AppError::EmailTaken("Email is already registered".into()));
    }

    let new_admin = admin::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        password: Set(hash_password(&payload.password)?),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };
    let admin = new_admin
        .insert(&state.db)
        .await
        .map_err(|e| map_unique_violation(e, "Email is already registered"))?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: admin.id,
            email: admin.email,
            role: Role::Admin,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/me",
    tag = "Auth",
    operation_id = "me",
    summary = "Identity of the current token",
    responses(
        (status = 200, description = "Caller identity", body = MeResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(auth_user), fields(id = auth_user.id))]
pub async fn me(auth_user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: auth_user.id,
        name: auth_user.name,
        email: auth_user.email,
        role: auth_user.role,
    })
}
