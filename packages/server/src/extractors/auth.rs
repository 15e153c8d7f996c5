use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt::{self, Role};

/// Authenticated caller extracted from the `Authorization: Bearer <token>` header.
///
/// The token is checked against the student secret and then the admin secret.
/// Role checks happen via `require_admin()` / `require_student()` in the handler body.
pub struct AuthUser {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Returns `Ok(())` for admins, `Err(PermissionDenied)` otherwise.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::PermissionDenied)
        }
    }

    /// Returns the student ID for students, `Err(PermissionDenied)` otherwise.
    pub fn require_student(&self) -> Result<i32, AppError> {
        match self.role {
            Role::Student => Ok(self.id),
            Role::Admin => Err(AppError::PermissionDenied),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let auth = &state.config.auth;
        let claims = jwt::verify_any(token, &auth.student_jwt_secret, &auth.admin_jwt_secret)
            .map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            id: claims.uid,
            email: claims.sub,
            name: claims.name,
            role: claims.role,
        })
    }
}
