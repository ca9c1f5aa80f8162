//! User account endpoints: registration, listing, and admin-only
//! role updates and deletion.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::db::{new_document_id, DbPool, RegisterRequest, Role, UpdateUserRequest, User, UserResponse};
use crate::AppState;

use super::auth::{self, hash_password};
use super::error::ApiError;
use super::validation::{self, REGISTER_SCHEMA, USER_UPDATE_SCHEMA};
use super::{accepts_json, collection_guards, parse_body};

/// `/api/register` — open registration. POST only.
pub async fn register_collection(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(response) = collection_guards(&method, &headers, &[Method::POST])? {
        return Ok(response);
    }

    let doc = parse_body(&body)?;
    register_user(&state.db, doc).await
}

/// `/api/users` — admin-only listing. GET only.
pub async fn collection(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(response) = collection_guards(&method, &headers, &[Method::GET])? {
        return Ok(response);
    }

    let user = auth::require_user(&state.db, &headers).await?;
    if !user.is_admin() {
        return Err(ApiError::forbidden());
    }

    list_users(&state.db).await
}

/// `/api/users/{id}` — admin-only view, role update and deletion.
pub async fn by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if !validation::is_document_id(&id) {
        return Err(ApiError::not_found());
    }

    let current = auth::require_user(&state.db, &headers).await?;
    if !current.is_admin() {
        return Err(ApiError::forbidden());
    }
    if !accepts_json(&headers) {
        return Err(ApiError::not_acceptable());
    }

    match method {
        Method::GET => view_user(&state.db, &id).await,
        Method::PUT => {
            let doc = parse_body(&body)?;
            update_user_role(&state.db, &id, &current, doc).await
        }
        Method::DELETE => delete_user(&state.db, &id, &current).await,
        _ => Err(ApiError::method_not_allowed()),
    }
}

// -------------------------------------------------------------------------
// Controllers
// -------------------------------------------------------------------------

async fn find_user(pool: &DbPool, id: &str) -> Result<Option<User>, ApiError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Create a new customer account. The role in the payload, if any, is
/// ignored: registration always produces a customer.
async fn register_user(pool: &DbPool, doc: serde_json::Value) -> Result<Response, ApiError> {
    let request: RegisterRequest = validation::parse_validated(doc, REGISTER_SCHEMA)?;

    let id = new_document_id();
    let now = chrono::Utc::now().to_rfc3339();
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {e}")))?;

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.email)
    .bind(&password_hash)
    .bind(Role::Customer)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(user_id = %id, "Registered new customer");

    let created = UserResponse {
        id,
        name: request.name,
        email: request.email,
        role: Role::Customer,
    };
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn list_users(pool: &DbPool) -> Result<Response, ApiError> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    let users: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(Json(users).into_response())
}

async fn view_user(pool: &DbPool, id: &str) -> Result<Response, ApiError> {
    let user = find_user(pool, id).await?.ok_or_else(ApiError::not_found)?;
    Ok(Json(UserResponse::from(user)).into_response())
}

/// Overwrite only the role of another user. Self-modification is rejected
/// before the target is even looked up.
async fn update_user_role(
    pool: &DbPool,
    id: &str,
    current: &User,
    doc: serde_json::Value,
) -> Result<Response, ApiError> {
    if id == current.id {
        return Err(ApiError::bad_request("Updating own data is not allowed"));
    }

    let mut user = find_user(pool, id).await?.ok_or_else(ApiError::not_found)?;

    let request: UpdateUserRequest = validation::parse_validated(doc, USER_UPDATE_SCHEMA)?;

    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(request.role)
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %id, role = %request.role, "Updated user role");

    user.role = request.role;
    Ok(Json(UserResponse::from(user)).into_response())
}

/// Delete another user and return the deleted record. Deleting yourself is
/// rejected before the lookup.
async fn delete_user(pool: &DbPool, id: &str, current: &User) -> Result<Response, ApiError> {
    if id == current.id {
        return Err(ApiError::bad_request("Deleting own data is not allowed"));
    }

    let user = find_user(pool, id).await?.ok_or_else(ApiError::not_found)?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    tracing::info!(user_id = %id, "Deleted user");

    Ok(Json(UserResponse::from(user)).into_response())
}
