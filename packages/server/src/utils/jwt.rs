use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Which account table a token was issued for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Admin => "admin",
        }
    }
}

/// JWT Claims structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Email
    pub uid: i32,    // Student or admin ID
    pub name: String,
    pub role: Role,
    pub exp: usize, // Expiration timestamp
}

/// Sign a new JWT token.
pub fn sign(
    uid: i32,
    email: &str,
    name: &str,
    role: Role,
    secret: &str,
    ttl_hours: i64,
) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .context("token expiry overflows")?
        .timestamp();

    let claims = Claims {
        sub: email.to_owned(),
        uid,
        name: name.to_owned(),
        role,
        exp: expiration as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a JWT token.
pub fn verify(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Decode a token trying the student secret first, then the admin secret.
///
/// The role claim must match the secret that verified the token, so a token
/// signed with the student secret can never act as an admin. A role mismatch
/// on the student secret falls through to the admin secret.
pub fn verify_any(token: &str, student_secret: &str, admin_secret: &str) -> Result<Claims> {
    if let Ok(claims) = verify(token, student_secret)
        && claims.role == Role::Student
    {
        return Ok(claims);
    }
    let claims = verify(token, admin_secret)?;
    anyhow::ensure!(claims.role == Role::Admin, "role does not match signing key");
    Ok(claims)
}
