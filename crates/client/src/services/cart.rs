//! Remote cart service: `GET /cart` and `PUT /cart`.
//!
//! The remote cart is eventually consistent with the durable local cart;
//! the synchronizer replaces it wholesale after local mutations and a
//! failed replace never rolls one back. Reads are retried; the replace is
//! issued exactly once per mutation since the next mutation pushes a fresh
//! snapshot anyway.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use marketbag_core::{CartLine, Price, ProductId};

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{ApiError, RemoteCartError};
use crate::http::{decode_json, retry_idempotent};

/// One cart line on the wire: `{id, title, price, count}` with a numeric
/// price, matching what the backend stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCartLine {
    #[serde(deserialize_with = "super::de_id_string")]
    pub id: String,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub count: u32,
}

impl From<&CartLine> for RemoteCartLine {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.product_id.to_string(),
            title: line.title.clone(),
            price: line.price.amount(),
            count: line.quantity,
        }
    }
}

impl RemoteCartLine {
    /// Product id of this line.
    #[must_use]
    pub fn product_id(&self) -> ProductId {
        ProductId::new(self.id.clone())
    }

    /// Unit price of this line.
    #[must_use]
    pub const fn unit_price(&self) -> Price {
        Price::new(self.price)
    }
}

/// Remote cart collaborator.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Fetch the server-side cart.
    async fn fetch(&self) -> Result<Vec<RemoteCartLine>, RemoteCartError>;

    /// Replace the server-side cart wholesale.
    async fn replace(&self, items: &[RemoteCartLine]) -> Result<(), RemoteCartError>;
}

#[derive(Debug, Deserialize)]
struct CartResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    items: Vec<RemoteCartLine>,
}

#[derive(Debug, Serialize)]
struct ReplaceCartBody<'a> {
    items: &'a [RemoteCartLine],
}

/// HTTP client for the remote cart service.
#[derive(Clone)]
pub struct RemoteCartClient {
    inner: Arc<RemoteCartClientInner>,
}

struct RemoteCartClientInner {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    retry: RetryPolicy,
}

impl RemoteCartClient {
    /// Create a cart client authenticated with the session's bearer token.
    #[must_use]
    pub fn new(config: &ClientConfig, client: reqwest::Client, token: SecretString) -> Self {
        Self {
            inner: Arc::new(RemoteCartClientInner {
                client,
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                token,
                retry: config.retry,
            }),
        }
    }

    fn check_status(response: CartResponse) -> Result<CartResponse, RemoteCartError> {
        if response.status == "OK" {
            Ok(response)
        } else {
            Err(RemoteCartError::Rejected(
                response.message.unwrap_or(response.status),
            ))
        }
    }
}

#[async_trait]
impl CartApi for RemoteCartClient {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<Vec<RemoteCartLine>, RemoteCartError> {
        let url = format!("{}/cart", self.inner.base_url);
        let response = retry_idempotent(self.inner.retry, "cart fetch", || {
            let request = self
                .inner
                .client
                .get(&url)
                .bearer_auth(self.inner.token.expose_secret());
            async move {
                let response = request.send().await.map_err(ApiError::from)?;
                decode_json::<CartResponse>(response).await
            }
        })
        .await?;

        Ok(Self::check_status(response)?.items)
    }

    #[instrument(skip(self, items), fields(lines = items.len()))]
    async fn replace(&self, items: &[RemoteCartLine]) -> Result<(), RemoteCartError> {
        let url = format!("{}/cart", self.inner.base_url);
        let response = self
            .inner
            .client
            .put(&url)
            .bearer_auth(self.inner.token.expose_secret())
            .json(&ReplaceCartBody { items })
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = decode_json::<CartResponse>(response).await?;
        Self::check_status(response)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_the_cart_wire_shape() {
        let response: CartResponse = serde_json::from_str(
            r#"{"status": "OK", "items": [{"id": 2, "title": "Slim Fit T-Shirt", "price": 22.3, "count": 3}]}"#,
        )
        .unwrap();
        assert_eq!(response.status, "OK");
        let line = response.items.first().unwrap();
        assert_eq!(line.product_id(), ProductId::new("2"));
        assert_eq!(line.unit_price(), Price::from_cents(2230));
    }

    #[test]
    fn rejected_response_surfaces_the_message() {
        let response: CartResponse =
            serde_json::from_str(r#"{"status": "ERROR", "message": "token expired"}"#).unwrap();
        let err = RemoteCartClient::check_status(response).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cart service rejected the request: token expired"
        );
    }

    #[test]
    fn replace_body_serializes_numeric_prices() {
        let line = RemoteCartLine {
            id: "5".to_string(),
            title: "Bracelet".to_string(),
            price: Price::from_cents(69500).amount(),
            count: 1,
        };
        let body = serde_json::to_value(ReplaceCartBody { items: &[line] }).unwrap();
        assert_eq!(body["items"][0]["price"], 695.0);
    }
}
