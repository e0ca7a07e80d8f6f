//! Product catalog models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Represents a product record.
///
/// # Database Table
///
/// Maps to the `products` table. `price` is in cents and strictly positive;
/// `stock` never drops below zero and only shrinks through a purchase.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,

    /// Unit price in cents
    pub price: i64,

    /// Units available for purchase
    pub stock: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating or replacing a product.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Wireless Headphones",
///   "description": "Noise-cancelling, 30-hour battery",
///   "price": 29900,
///   "stock": 150
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    pub stock: i32,
}

impl ProductRequest {
    /// Check name, price and stock; returns the request with a trimmed name.
    pub fn validated(self) -> Result<Self, AppError> {
        let name = self.name.trim().to_string();

        if name.is_empty() {
            return Err(AppError::InvalidRequest(
                "Product name is required".to_string(),
            ));
        }
        if self.price <= 0 {
            return Err(AppError::InvalidAmount);
        }
        if self.stock < 0 {
            return Err(AppError::InvalidQuantity);
        }

        Ok(Self { name, ..self })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, price: i64, stock: i32) -> ProductRequest {
        ProductRequest {
            name: name.to_string(),
            description: String::new(),
            price,
            stock,
        }
    }

    #[test]
    fn zero_stock_is_allowed_but_negative_is_not() {
        assert!(request("Lamp", 100, 0).validated().is_ok());
        assert!(matches!(
            request("Lamp", 100, -1).validated(),
            Err(AppError::InvalidQuantity)
        ));
    }

    #[test]
    fn price_must_be_positive() {
        assert!(matches!(
            request("Lamp", 0, 5).validated(),
            Err(AppError::InvalidAmount)
        ));
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(matches!(
            request("   ", 100, 5).validated(),
            Err(AppError::InvalidRequest(_))
        ));
    }
}
