//! HTTP Basic authentication.
//!
//! Credentials travel as `Authorization: Basic base64(email:password)` and
//! are resolved to a user record with a single store lookup plus an argon2
//! hash verification. There are no sessions or tokens; every request
//! authenticates itself.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header, HeaderMap};
use base64::Engine;

use crate::config::AuthConfig;
use crate::db::{DbPool, Role, User};

use super::error::ApiError;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. The hash string carries its own
/// algorithm parameters, so hashes produced with differing cost settings
/// verify equally well.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Parse Basic credentials out of the Authorization header.
///
/// Returns None when the header is missing, uses another scheme, is not
/// valid base64, or the decoded value does not split into exactly two
/// colon-separated fields.
pub fn extract_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;

    let fields: Vec<&str> = decoded.split(':').collect();
    if fields.len() != 2 {
        return None;
    }

    Some((fields[0].to_string(), fields[1].to_string()))
}

/// Resolve the request's credentials to a user record.
///
/// Missing or unverifiable credentials yield `Ok(None)`; the caller decides
/// whether that means a 401 challenge. Only store failures are errors.
pub async fn current_user(pool: &DbPool, headers: &HeaderMap) -> Result<Option<User>, ApiError> {
    let Some((email, password)) = extract_credentials(headers) else {
        return Ok(None);
    };

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(&email)
        .fetch_optional(pool)
        .await?;

    let Some(user) = user else {
        return Ok(None);
    };

    if verify_password(&password, &user.password_hash) {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// Authenticate or fail with a 401 challenge.
pub async fn require_user(pool: &DbPool, headers: &HeaderMap) -> Result<User, ApiError> {
    current_user(pool, headers)
        .await?
        .ok_or_else(ApiError::unauthorized)
}

/// Seed the admin account from config if it does not exist yet.
/// Idempotent; runs at every startup.
pub async fn ensure_admin_user(pool: &DbPool, auth: &AuthConfig) -> anyhow::Result<()> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
        .bind(&auth.admin_email)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let id = crate::db::new_document_id();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&auth.admin_password)
        .map_err(|e| anyhow::anyhow!("Failed to hash admin password: {e}"))?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind("Admin")
    .bind(&auth.admin_email)
    .bind(&password_hash)
    .bind(Role::Admin)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!("Created admin user {}", auth.admin_email);
    Ok(())
}
