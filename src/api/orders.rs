//! Order endpoints. Orders are created by customers, read-only afterwards,
//! and scoped: an admin sees every order, a customer only their own. An
//! order that exists but belongs to someone else is indistinguishable from
//! one that does not exist.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::db::{new_document_id, CreateOrderRequest, DbPool, Order, Role, User};
use crate::AppState;

use super::auth;
use super::error::ApiError;
use super::validation::{self, ORDER_SCHEMA};
use super::{accepts_json, collection_guards, parse_body};

/// `/api/orders` — GET for any authenticated user (scoped by role),
/// POST for customers only.
pub async fn collection(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(response) = collection_guards(&method, &headers, &[Method::GET, Method::POST])? {
        return Ok(response);
    }

    let user = auth::require_user(&state.db, &headers).await?;

    match method {
        Method::POST => {
            // Only customers place orders; an admin account is not a buyer.
            if user.role != Role::Customer {
                return Err(ApiError::forbidden());
            }
            let doc = parse_body(&body)?;
            create_order(&state.db, &user, doc).await
        }
        // Guarded to GET | POST above
        _ => {
            if user.is_admin() {
                list_all_orders(&state.db).await
            } else {
                list_own_orders(&state.db, &user.id).await
            }
        }
    }
}

/// `/api/orders/{id}` — GET only.
pub async fn by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !validation::is_document_id(&id) {
        return Err(ApiError::not_found());
    }

    let user = auth::require_user(&state.db, &headers).await?;
    if !accepts_json(&headers) {
        return Err(ApiError::not_acceptable());
    }

    if method != Method::GET {
        return Err(ApiError::method_not_allowed());
    }

    if user.is_admin() {
        view_order(&state.db, &id).await
    } else {
        view_own_order(&state.db, &id, &user.id).await
    }
}

// -------------------------------------------------------------------------
// Controllers
// -------------------------------------------------------------------------

async fn list_all_orders(pool: &DbPool) -> Result<Response, ApiError> {
    let orders: Vec<Order> = sqlx::query_as("SELECT * FROM orders ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(Json(orders).into_response())
}

async fn list_own_orders(pool: &DbPool, customer_id: &str) -> Result<Response, ApiError> {
    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE customer_id = ? ORDER BY created_at")
            .bind(customer_id)
            .fetch_all(pool)
            .await?;
    Ok(Json(orders).into_response())
}

async fn view_order(pool: &DbPool, id: &str) -> Result<Response, ApiError> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    let order = order.ok_or_else(ApiError::not_found)?;
    Ok(Json(order).into_response())
}

/// Ownership is part of the lookup itself, so a miss never reveals whether
/// the order exists at all.
async fn view_own_order(pool: &DbPool, id: &str, customer_id: &str) -> Result<Response, ApiError> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = ? AND customer_id = ?")
            .bind(id)
            .bind(customer_id)
            .fetch_optional(pool)
            .await?;
    let order = order.ok_or_else(ApiError::not_found)?;
    Ok(Json(order).into_response())
}

/// Place an order. The customer id is always the authenticated caller;
/// any customerId in the payload is discarded. Items are stored as the
/// snapshots the client sent, never re-resolved against the catalog.
async fn create_order(
    pool: &DbPool,
    user: &User,
    doc: serde_json::Value,
) -> Result<Response, ApiError> {
    let request: CreateOrderRequest = validation::parse_validated(doc, ORDER_SCHEMA)?;

    let id = new_document_id();
    let now = chrono::Utc::now().to_rfc3339();
    let items = sqlx::types::Json(request.items);

    sqlx::query("INSERT INTO orders (id, customer_id, items, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(&user.id)
        .bind(&items)
        .bind(&now)
        .execute(pool)
        .await?;

    tracing::info!(order_id = %id, customer_id = %user.id, "Created order");

    let created = Order {
        id,
        customer_id: user.id.clone(),
        items,
        created_at: now,
    };
    Ok((StatusCode::CREATED, Json(created)).into_response())
}
