//! Product catalog lookup.
//!
//! `GET /products/{id}` against the catalog backend, with a moka
//! read-through cache (capacity and TTL from [`ClientConfig`]). Catalog
//! lookups are pure reads with no side effects on cart state, so they are
//! retried on transient failures.

use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

use marketbag_core::{Price, ProductId};

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{ApiError, CatalogError};
use crate::http::{decode_json, retry_idempotent};

/// Product attributes as resolved from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub image: String,
    pub description: String,
    pub rating: Option<Rating>,
}

/// Aggregate customer rating for a product.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rating {
    pub rate: f64,
    pub count: u64,
}

/// Read-only catalog collaborator.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// Resolve display attributes for one product.
    async fn product(&self, id: &ProductId) -> Result<CatalogProduct, CatalogError>;
}

/// Wire shape of `GET /products/{id}`.
#[derive(Debug, Deserialize)]
struct ProductBody {
    #[serde(deserialize_with = "super::de_id_string")]
    id: String,
    title: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    image: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    rating: Option<Rating>,
}

impl From<ProductBody> for CatalogProduct {
    fn from(body: ProductBody) -> Self {
        Self {
            id: ProductId::new(body.id),
            title: body.title,
            price: Price::new(body.price),
            image: body.image,
            description: body.description,
            rating: body.rating,
        }
    }
}

/// HTTP client for the product catalog.
#[derive(Clone)]
pub struct CatalogClient {
    inner: Arc<CatalogClientInner>,
}

struct CatalogClientInner {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
    cache: Cache<ProductId, CatalogProduct>,
}

impl CatalogClient {
    /// Create a catalog client sharing `client` with the other services.
    #[must_use]
    pub fn new(config: &ClientConfig, client: reqwest::Client) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.catalog_cache_capacity)
            .time_to_live(config.catalog_cache_ttl)
            .build();

        Self {
            inner: Arc::new(CatalogClientInner {
                client,
                base_url: config.catalog_base_url.trim_end_matches('/').to_string(),
                retry: config.retry,
                cache,
            }),
        }
    }
}

#[async_trait]
impl CatalogApi for CatalogClient {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn product(&self, id: &ProductId) -> Result<CatalogProduct, CatalogError> {
        if let Some(product) = self.inner.cache.get(id).await {
            debug!("catalog cache hit");
            return Ok(product);
        }

        let url = format!("{}/products/{id}", self.inner.base_url);
        let body = retry_idempotent(self.inner.retry, "catalog product", || {
            let request = self.inner.client.get(&url);
            async move {
                let response = request.send().await.map_err(ApiError::from)?;
                decode_json::<ProductBody>(response).await
            }
        })
        .await
        .map_err(|source| CatalogError {
            product_id: id.clone(),
            source,
        })?;

        let product = CatalogProduct::from(body);
        self.inner.cache.insert(id.clone(), product.clone()).await;
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_catalog_wire_shape() {
        let body: ProductBody = serde_json::from_str(
            r#"{
                "id": 3,
                "title": "Mens Cotton Jacket",
                "price": 55.99,
                "description": "great outerwear jackets",
                "category": "men's clothing",
                "image": "https://img.example/3.png",
                "rating": {"rate": 4.7, "count": 500}
            }"#,
        )
        .unwrap();

        let product = CatalogProduct::from(body);
        assert_eq!(product.id, ProductId::new("3"));
        assert_eq!(product.price, Price::from_cents(5599));
        assert_eq!(product.rating.map(|r| r.count), Some(500));
    }

    #[test]
    fn rating_and_description_are_optional() {
        let body: ProductBody = serde_json::from_str(
            r#"{"id": "9", "title": "Gold Chain", "price": 10.0, "image": ""}"#,
        )
        .unwrap();
        assert!(body.rating.is_none());
        assert!(body.description.is_empty());
    }
}
