//! Product catalog endpoints. Reads are open to any authenticated user;
//! writes are admin-only.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::db::{new_document_id, CreateProductRequest, DbPool, Product, UpdateProductRequest};
use crate::AppState;

use super::auth;
use super::error::ApiError;
use super::validation::{self, PRODUCT_SCHEMA, PRODUCT_UPDATE_SCHEMA};
use super::{accepts_json, collection_guards, parse_body};

/// `/api/products` — GET for any authenticated user, POST for admins.
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
            if !user.is_admin() {
                return Err(ApiError::forbidden());
            }
            let doc = parse_body(&body)?;
            create_product(&state.db, doc).await
        }
        // Guarded to GET | POST above
        _ => list_products(&state.db).await,
    }
}

/// `/api/products/{id}` — view for any authenticated user; update and
/// deletion for admins.
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

    let user = auth::require_user(&state.db, &headers).await?;
    if !accepts_json(&headers) {
        return Err(ApiError::not_acceptable());
    }

    if method == Method::GET {
        return view_product(&state.db, &id).await;
    }

    // Everything beyond viewing is admin-only, checked before the method
    // is inspected further: a customer never learns which methods exist.
    if !user.is_admin() {
        return Err(ApiError::forbidden());
    }

    match method {
        Method::PUT => {
            let doc = parse_body(&body)?;
            update_product(&state.db, &id, doc).await
        }
        Method::DELETE => delete_product(&state.db, &id).await,
        _ => Err(ApiError::method_not_allowed()),
    }
}

// -------------------------------------------------------------------------
// Controllers
// -------------------------------------------------------------------------

async fn find_product(pool: &DbPool, id: &str) -> Result<Option<Product>, ApiError> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(product)
}

async fn list_products(pool: &DbPool) -> Result<Response, ApiError> {
    let products: Vec<Product> = sqlx::query_as("SELECT * FROM products ORDER BY created_at")
        .fetch_all(pool)
        .await?;
    Ok(Json(products).into_response())
}

async fn view_product(pool: &DbPool, id: &str) -> Result<Response, ApiError> {
    let product = find_product(pool, id)
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(product).into_response())
}

async fn create_product(pool: &DbPool, doc: serde_json::Value) -> Result<Response, ApiError> {
    let request: CreateProductRequest = validation::parse_validated(doc, PRODUCT_SCHEMA)?;

    let id = new_document_id();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO products (id, name, description, price, image, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&request.name)
    .bind(&request.description)
    .bind(request.price)
    .bind(&request.image)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(product_id = %id, "Created product");

    let created = Product {
        id,
        name: request.name,
        description: request.description,
        price: request.price,
        image: request.image,
        created_at: now.clone(),
        updated_at: now,
    };
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

/// Overwrite name and price unconditionally; description and image only
/// when the payload carries them.
async fn update_product(
    pool: &DbPool,
    id: &str,
    doc: serde_json::Value,
) -> Result<Response, ApiError> {
    let mut product = find_product(pool, id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    let request: UpdateProductRequest = validation::parse_validated(doc, PRODUCT_UPDATE_SCHEMA)?;

    product.name = request.name;
    product.price = request.price;
    if let Some(description) = request.description {
        product.description = Some(description);
    }
    if let Some(image) = request.image {
        product.image = Some(image);
    }
    product.updated_at = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE products SET name = ?, description = ?, price = ?, image = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price)
    .bind(&product.image)
    .bind(&product.updated_at)
    .bind(id)
    .execute(pool)
    .await?;

    tracing::info!(product_id = %id, "Updated product");

    Ok(Json(product).into_response())
}

/// Remove a product and return the deleted record.
async fn delete_product(pool: &DbPool, id: &str) -> Result<Response, ApiError> {
    let product = find_product(pool, id)
        .await?
        .ok_or_else(ApiError::not_found)?;

    sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    tracing::info!(product_id = %id, "Deleted product");

    Ok(Json(product).into_response())
}
