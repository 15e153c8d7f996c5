use serde::{Deserialize, Serialize};

use super::shared::{validate_email, validate_password};
use crate::error::AppError;
use crate::utils::jwt::Role;

/// Request body for student registration.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct StudentRegisterRequest {
    #[schema(example = "Asha Kumar")]
    pub name: String,
    /// Unique email address; stored lowercase.
    #[schema(example = "asha@college.edu")]
    pub email: String,
    /// Unique institutional roll number.
    #[schema(example = "21CS001")]
    pub roll_number: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[schema(example = "Computer Science")]
    pub department: String,
    /// Year of study (1-6).
    #[schema(example = 3)]
    pub year: i32,
}

pub fn validate_student_register(payload: &StudentRegisterRequest) -> Result<(), AppError> {
    let name = payload.name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(AppError::Validation("Name must be 1-128 characters".into()));
    }
    validate_email(&payload.email)?;
    let roll = payload.roll_number.trim();
    if roll.is_empty() || roll.chars().count() > 32 {
        return Err(AppError::Validation(
            "Roll number must be 1-32 characters".into(),
        ));
    }
    validate_password(&payload.password)?;
    let department = payload.department.trim();
    if department.is_empty() || department.chars().count() > 128 {
        return Err(AppError::Validation(
            "Department must be 1-128 characters".into(),
        ));
    }
    if !(1..=6).contains(&payload.year) {
        return Err(AppError::Validation("Year must be between 1 and 6".into()));
    }
    Ok(())
}

/// Request body for creating another admin account.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct AdminRegisterRequest {
    #[schema(example = "Dr. Rao")]
    pub name: String,
    #[schema(example = "rao@college.edu")]
    pub email: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_admin_register(payload: &AdminRegisterRequest) -> Result<(), AppError> {
    let name = payload.name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(AppError::Validation("Name must be 1-128 characters".into()));
    }
    validate_email(&payload.email)?;
    validate_password(&payload.password)
}

/// Request body for student or admin login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "asha@college.edu")]
    pub email: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::Validation("Email must not be empty".into()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Successful registration response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "asha@college.edu")]
    pub email: String,
    pub role: Role,
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "Asha Kumar")]
    pub name: String,
    #[schema(example = "asha@college.edu")]
    pub email: String,
    pub role: Role,
}

/// Identity carried by the caller's token.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MeResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "Asha Kumar")]
    pub name: String,
    #[schema(example = "asha@college.edu")]
    pub email: String,
    pub role: Role,
}
