//! Order service: create orders, list them, update their status.
//!
//! The backend stores order lines as a JSON-encoded string inside the order
//! record, prices in cents, and paid/delivered flags as 0/1 integers; the
//! decoding here turns that into validated [`Order`] values so the rest of
//! the client never sees a raw record.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use marketbag_core::{Order, OrderId, OrderLine, OrderStatus, Price, ProductId};

use crate::config::{ClientConfig, RetryPolicy};
use crate::error::{ApiError, RemoteOrderError};
use crate::http::{decode_json, retry_idempotent};

/// The items of an order about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub items: Vec<OrderLine>,
}

/// Order service collaborator.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Create an order from the drafted items.
    ///
    /// `idempotency_key` is generated once per checkout attempt so a
    /// duplicate delivery of the same request cannot create two orders.
    async fn create(
        &self,
        draft: &OrderDraft,
        idempotency_key: Uuid,
    ) -> Result<OrderId, RemoteOrderError>;

    /// List all orders for the authenticated user.
    async fn list(&self) -> Result<Vec<Order>, RemoteOrderError>;

    /// Ask the backend to move an order to `status`.
    async fn update_status(&self, id: &OrderId, status: OrderStatus)
    -> Result<(), RemoteOrderError>;
}

/// One order line on the wire (`prodID` naming, numeric price).
#[derive(Debug, Serialize, Deserialize)]
struct OrderLineWire {
    #[serde(rename = "prodID", deserialize_with = "super::de_id_string")]
    prod_id: String,
    title: String,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    quantity: u32,
    #[serde(default)]
    image: String,
}

impl From<&OrderLine> for OrderLineWire {
    fn from(line: &OrderLine) -> Self {
        Self {
            prod_id: line.product_id.to_string(),
            title: line.title.clone(),
            price: line.price.amount(),
            quantity: line.quantity,
            image: line.image.clone(),
        }
    }
}

impl From<OrderLineWire> for OrderLine {
    fn from(wire: OrderLineWire) -> Self {
        Self {
            product_id: ProductId::new(wire.prod_id),
            title: wire.title,
            price: Price::new(wire.price),
            quantity: wire.quantity,
            image: wire.image,
        }
    }
}

/// One order record as returned by `GET /orders/all`.
#[derive(Debug, Deserialize)]
struct OrderRecord {
    #[serde(deserialize_with = "super::de_id_string")]
    id: String,
    /// Cents.
    total_price: i64,
    /// JSON-encoded array of [`OrderLineWire`].
    order_items: String,
    #[serde(deserialize_with = "super::de_int_bool")]
    is_paid: bool,
    #[serde(deserialize_with = "super::de_int_bool")]
    is_delivered: bool,
}

impl TryFrom<OrderRecord> for Order {
    type Error = RemoteOrderError;

    fn try_from(record: OrderRecord) -> Result<Self, RemoteOrderError> {
        let items: Vec<OrderLineWire> = serde_json::from_str(&record.order_items)
            .map_err(|e| RemoteOrderError::Malformed(format!("order {}: {e}", record.id)))?;
        Self::from_flags(
            OrderId::new(record.id),
            items.into_iter().map(OrderLine::from).collect(),
            Price::from_cents(record.total_price),
            record.is_paid,
            record.is_delivered,
        )
        .map_err(|e| RemoteOrderError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "orderId", deserialize_with = "de_opt_id")]
    order_id: Option<String>,
}

fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    super::de_id_string(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct ListOrdersResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    orders: Vec<OrderRecord>,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody {
    items: Vec<OrderLineWire>,
}

#[derive(Debug, Serialize)]
struct UpdateOrderBody<'a> {
    #[serde(rename = "orderID")]
    order_id: &'a str,
    #[serde(rename = "isPaid")]
    is_paid: bool,
    #[serde(rename = "isDelivered")]
    is_delivered: bool,
}

fn rejected(status: String, message: Option<String>) -> RemoteOrderError {
    RemoteOrderError::Rejected(message.unwrap_or(status))
}

/// HTTP client for the order service.
#[derive(Clone)]
pub struct OrderClient {
    inner: Arc<OrderClientInner>,
}

struct OrderClientInner {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    retry: RetryPolicy,
}

impl OrderClient {
    /// Create an order client authenticated with the session's bearer token.
    #[must_use]
    pub fn new(config: &ClientConfig, client: reqwest::Client, token: SecretString) -> Self {
        Self {
            inner: Arc::new(OrderClientInner {
                client,
                base_url: config.api_base_url.trim_end_matches('/').to_string(),
                token,
                retry: config.retry,
            }),
        }
    }
}

#[async_trait]
impl OrderApi for OrderClient {
    #[instrument(skip(self, draft), fields(lines = draft.items.len(), %idempotency_key))]
    async fn create(
        &self,
        draft: &OrderDraft,
        idempotency_key: Uuid,
    ) -> Result<OrderId, RemoteOrderError> {
        let url = format!("{}/orders/neworder", self.inner.base_url);
        let body = CreateOrderBody {
            items: draft.items.iter().map(OrderLineWire::from).collect(),
        };

        // Never auto-retried: order creation is not idempotent on the
        // backend. The key lets the backend deduplicate if the request is
        // delivered twice in flight.
        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.token.expose_secret())
            .header("Idempotency-Key", idempotency_key.to_string())
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = decode_json::<CreateOrderResponse>(response).await?;

        if response.status != "OK" {
            return Err(rejected(response.status, response.message));
        }
        response
            .order_id
            .map(OrderId::new)
            .ok_or_else(|| RemoteOrderError::Malformed("missing orderId in response".to_string()))
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Order>, RemoteOrderError> {
        let url = format!("{}/orders/all", self.inner.base_url);
        let response = retry_idempotent(self.inner.retry, "order list", || {
            let request = self
                .inner
                .client
                .get(&url)
                .bearer_auth(self.inner.token.expose_secret());
            async move {
                let response = request.send().await.map_err(ApiError::from)?;
                decode_json::<ListOrdersResponse>(response).await
            }
        })
        .await?;

        if response.status != "OK" {
            return Err(rejected(response.status, response.message));
        }
        response.orders.into_iter().map(Order::try_from).collect()
    }

    #[instrument(skip(self), fields(order_id = %id, %status))]
    async fn update_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<(), RemoteOrderError> {
        let url = format!("{}/orders/updateorder", self.inner.base_url);
        let (is_paid, is_delivered) = status.flags();
        let body = UpdateOrderBody {
            order_id: id.as_str(),
            is_paid,
            is_delivered,
        };

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(ApiError::from)?;
        let response = decode_json::<StatusResponse>(response).await?;

        if response.status != "OK" {
            return Err(rejected(response.status, response.message));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_an_order_record() {
        let record: OrderRecord = serde_json::from_str(
            r#"{
                "id": 12,
                "item_numbers": 3,
                "total_price": 7850,
                "order_items": "[{\"prodID\": 3, \"title\": \"Jacket\", \"price\": 55.99, \"quantity\": 1, \"image\": \"\"}]",
                "is_paid": 1,
                "is_delivered": 0
            }"#,
        )
        .unwrap();

        let order = Order::try_from(record).unwrap();
        assert_eq!(order.id, OrderId::new("12"));
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(order.total_price, Price::from_cents(7850));
        assert_eq!(
            order.items.first().map(|l| l.product_id.clone()),
            Some(ProductId::new("3"))
        );
    }

    #[test]
    fn rejects_the_unreachable_flag_pair() {
        let record: OrderRecord = serde_json::from_str(
            r#"{"id": 1, "total_price": 0, "order_items": "[]", "is_paid": 0, "is_delivered": 1}"#,
        )
        .unwrap();
        let err = Order::try_from(record).unwrap_err();
        assert!(matches!(err, RemoteOrderError::Malformed(_)));
    }

    #[test]
    fn rejects_unparseable_order_items() {
        let record: OrderRecord = serde_json::from_str(
            r#"{"id": 1, "total_price": 0, "order_items": "not json", "is_paid": 0, "is_delivered": 0}"#,
        )
        .unwrap();
        assert!(matches!(
            Order::try_from(record),
            Err(RemoteOrderError::Malformed(_))
        ));
    }

    #[test]
    fn update_body_uses_backend_field_names() {
        let body = UpdateOrderBody {
            order_id: "9",
            is_paid: true,
            is_delivered: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["orderID"], "9");
        assert_eq!(json["isPaid"], true);
        assert_eq!(json["isDelivered"], false);
    }
}
