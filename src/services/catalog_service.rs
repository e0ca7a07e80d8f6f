//! Product catalog operations.
//!
//! Reads are public. Creating or changing a product requires the admin role,
//! which is read from the stored user record on every call rather than
//! trusted from the token, so a demoted admin loses access immediately.

use uuid::Uuid;

use crate::{
    error::AppError,
    models::product::{Product, ProductRequest},
    services::retry::RetryPolicy,
    store::{DynStore, LockSet},
};

#[derive(Clone)]
pub struct CatalogService {
    store: DynStore,
    retry: RetryPolicy,
}

impl CatalogService {
    pub fn new(store: DynStore, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        self.store.list_products().await
    }

    pub async fn get_product(&self, id: Uuid) -> Result<Product, AppError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(AppError::ProductNotFound)
    }

    /// Add a product to the catalog.
    ///
    /// # Errors
    ///
    /// - `Forbidden`: caller is not an admin
    /// - `InvalidRequest` / `InvalidAmount` / `InvalidQuantity`: bad name, price or stock
    pub async fn create_product(
        &self,
        actor: Uuid,
        request: ProductRequest,
    ) -> Result<Product, AppError> {
        self.require_admin(actor).await?;
        let request = request.validated()?;

        let product = self.store.create_product(request).await?;
        tracing::info!(product_id = %product.id, name = %product.name, "product created");

        Ok(product)
    }

    /// Replace a product's name, description, price and stock.
    ///
    /// Runs under the product's row lock, so it cannot interleave with a
    /// purchase of the same product.
    ///
    /// # Errors
    ///
    /// Same as [`create_product`](Self::create_product), plus:
    ///
    /// - `ProductNotFound`: product doesn't exist
    /// - `Conflict`: the product stayed locked through every retry
    pub async fn update_product(
        &self,
        actor: Uuid,
        product_id: Uuid,
        request: ProductRequest,
    ) -> Result<Product, AppError> {
        self.require_admin(actor).await?;
        let request = request.validated()?;

        let product = self
            .retry
            .run("update_product", || {
                self.update_once(product_id, request.clone())
            })
            .await?;

        tracing::info!(%product_id, stock = product.stock, price = product.price, "product updated");

        Ok(product)
    }

    async fn update_once(
        &self,
        product_id: Uuid,
        request: ProductRequest,
    ) -> Result<Product, AppError> {
        let mut unit = self.store.begin(&LockSet::new().product(product_id)).await?;
        if unit.product(product_id).is_none() {
            return Err(AppError::ProductNotFound);
        }
        let product = unit.replace_product(product_id, request).await?;
        unit.commit().await?;

        Ok(product)
    }

    async fn require_admin(&self, actor: Uuid) -> Result<(), AppError> {
        let user = self
            .store
            .find_user(actor)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !user.role.is_admin() {
            return Err(AppError::Forbidden);
        }

        Ok(())
    }
}
