//! Product catalog HTTP handlers.
//!
//! Reads are public; `POST /products` and `PUT /products/{id}` require an
//! admin caller. A token without the admin claim is refused here, before the
//! service re-checks the caller's stored role.

use axum::{
    Extension,
    extract::State,
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    app::AppState,
    error::AppError,
    extract::{Json, Path},
    middleware::auth::AuthContext,
    models::product::{Product, ProductRequest},
};

/// List the catalog, ordered by name.
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Product>, AppError> {
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(product))
}

/// Add a product.
///
/// # Request Body
///
/// ```json
/// { "name": "Desk Lamp", "description": "LED, dimmable", "price": 4500, "stock": 210 }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: The new product
/// - **Error (400)**: Empty name, non-positive price or negative stock
/// - **Error (403)**: Caller is not an admin
pub async fn create_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    auth.require_admin_claim()?;
    let product = state.catalog.create_product(auth.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's fields. Same body and errors as creation, plus 404.
pub async fn update_product(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<ProductRequest>,
) -> Result<Json<Product>, AppError> {
    auth.require_admin_claim()?;

    let product = state
        .catalog
        .update_product(auth.user_id, product_id, request)
        .await?;

    Ok(Json(product))
}
