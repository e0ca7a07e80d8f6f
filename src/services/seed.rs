//! Startup data: the bootstrap admin and an optional demo catalog.

use crate::{
    config::AdminSeed,
    error::AppError,
    models::{product::ProductRequest, user::Role},
    services::auth_service::{AuthService, normalize_email},
    store::DynStore,
};

const DEMO_PRODUCTS: &[(&str, &str, i64, i32)] = &[
    ("Wireless Headphones", "Premium noise-cancelling headphones with 30-hour battery life", 29900, 150),
    ("Smart Watch", "Fitness tracker with heart rate monitor and GPS", 19900, 200),
    ("Laptop Stand", "Ergonomic aluminum laptop stand for better posture", 4900, 300),
    ("USB-C Hub", "7-in-1 USB-C hub with HDMI, USB 3.0, and SD card reader", 3900, 250),
    ("Mechanical Keyboard", "RGB backlit mechanical keyboard with blue switches", 12900, 180),
    ("Gaming Mouse", "High-precision gaming mouse with customizable RGB", 6900, 220),
    ("Webcam 1080p", "Full HD webcam with auto-focus and built-in microphone", 7900, 175),
    ("Power Bank", "20000mAh portable power bank with dual USB ports", 5900, 280),
    ("Bluetooth Speaker", "Portable waterproof speaker with 360° sound", 8900, 190),
    ("Desk Lamp", "LED desk lamp with adjustable brightness and color", 4500, 210),
    ("Monitor Arm", "Single monitor arm with gas spring adjustment", 9900, 140),
    ("External SSD", "500GB portable external SSD USB 3.1", 7900, 200),
];

/// Create the admin user unless a user with that email already exists.
///
/// Returns whether a user was created.
pub async fn ensure_admin(
    store: &DynStore,
    auth: &AuthService,
    seed: AdminSeed,
) -> Result<bool, AppError> {
    let email = normalize_email(&seed.email);
    if store.find_user_by_email(&email).await?.is_some() {
        tracing::info!(%email, "admin user already present");
        return Ok(false);
    }

    let admin = auth
        .create_user(
            seed.username,
            email,
            &seed.password,
            seed.full_name,
            Role::Admin,
        )
        .await?;
    tracing::info!(user_id = %admin.id, "admin user created");

    Ok(true)
}

/// Fill an empty catalog with demo products.
///
/// Returns how many products were created; zero if the catalog had any.
pub async fn seed_demo_products(store: &DynStore) -> Result<usize, AppError> {
    if !store.list_products().await?.is_empty() {
        tracing::info!("catalog not empty, skipping demo products");
        return Ok(0);
    }

    for (name, description, price, stock) in DEMO_PRODUCTS {
        store
            .create_product(ProductRequest {
                name: (*name).to_string(),
                description: (*description).to_string(),
                price: *price,
                stock: *stock,
            })
            .await?;
    }
    tracing::info!(count = DEMO_PRODUCTS.len(), "demo products created");

    Ok(DEMO_PRODUCTS.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::{services::token::TokenSigner, store::memory::MemoryStore};

    #[tokio::test]
    async fn demo_catalog_is_created_once() {
        let store: DynStore = Arc::new(MemoryStore::default());

        assert_eq!(seed_demo_products(&store).await.unwrap(), DEMO_PRODUCTS.len());
        assert_eq!(seed_demo_products(&store).await.unwrap(), 0);
        assert_eq!(
            store.list_products().await.unwrap().len(),
            DEMO_PRODUCTS.len()
        );
    }

    #[tokio::test]
    async fn admin_bootstrap_is_idempotent() {
        let store: DynStore = Arc::new(MemoryStore::default());
        let auth = AuthService::new(
            Arc::clone(&store),
            TokenSigner::new("k", Duration::hours(1)),
        );
        let seed = AdminSeed {
            email: "Root@Example.com".into(),
            username: "root".into(),
            password: "rootpass".into(),
            full_name: "Root".into(),
        };

        assert!(ensure_admin(&store, &auth, seed.clone()).await.unwrap());
        assert!(!ensure_admin(&store, &auth, seed).await.unwrap());

        let admin = store
            .find_user_by_email("root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }
}
