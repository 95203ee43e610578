use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// A catalog product joined with its category.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: i64,
    pub category_handle: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ProductImage {
    pub id: i64,
    #[serde(skip_serializing)]
    pub product_id: i64,
    pub image_url: String,
}

/// Catalog listing entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub images: Vec<ProductImage>,
}

impl ProductView {
    /// Attach images to their products, preserving product order.
    pub fn assemble(products: Vec<Product>, images: Vec<ProductImage>) -> Vec<Self> {
        let mut views: Vec<Self> = products
            .into_iter()
            .map(|product| Self {
                product,
                images: Vec::new(),
            })
            .collect();

        for image in images {
            if let Some(view) = views.iter_mut().find(|v| v.product.id == image.product_id) {
                view.images.push(image);
            }
        }

        views
    }
}

/// Catalog entry to create under the category identified by `category_handle`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_handle: String,
    pub image_urls: Vec<String>,
}

/// Partial update. `None` keeps the stored value; `Some` image urls replace
/// the whole image set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub category_handle: Option<String>,
    pub image_urls: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            description: String::new(),
            price: dec!(12.90),
            category_id: 1,
            category_handle: "burgers".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_assemble_attaches_images_to_owning_product() {
        let images = vec![
            ProductImage {
                id: 1,
                product_id: 2,
                image_url: "https://cdn/2a.png".to_string(),
            },
            ProductImage {
                id: 2,
                product_id: 2,
                image_url: "https://cdn/2b.png".to_string(),
            },
            ProductImage {
                id: 3,
                product_id: 99,
                image_url: "https://cdn/orphan.png".to_string(),
            },
        ];

        let views = ProductView::assemble(vec![product(1), product(2)], images);

        assert_eq!(views[0].product.id, 1);
        assert!(views[0].images.is_empty());
        assert_eq!(views[1].images.len(), 2);
    }
}
