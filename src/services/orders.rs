use crate::{
    entities::{order, order_item, Order, OrderItem, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Product price captured at purchase time
    pub price: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
}

impl OrderResponse {
    pub fn from_models(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            total_price: order.total_price,
            status: order.status,
            payment_id: order.payment_id,
            created_at: order.created_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
        }
    }
}

/// Order queries and the admin status workflow. Creation lives in the
/// checkout service; orders are immutable here except for `status`.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// The caller's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.with_items(orders).await
    }

    /// All orders, optionally filtered by status (case-insensitive).
    /// An unknown status value is a validation error.
    #[instrument(skip(self))]
    pub async fn list_all(
        &self,
        status_filter: Option<&str>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        let mut select = Order::find().order_by_desc(order::Column::CreatedAt);

        if let Some(raw) = status_filter.filter(|s| !s.trim().is_empty()) {
            let status = OrderStatus::parse(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("unknown order status '{}'", raw))
            })?;
            select = select.filter(order::Column::Status.eq(status));
        }

        let orders = select.all(&*self.db).await?;
        self.with_items(orders).await
    }

    /// Admin-only status update. Any known status may be set; transition
    /// legality is not checked.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let existing = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status = existing.status;
        let mut active: order::ActiveModel = existing.into();
        active.status = Set(new_status);
        let updated = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            })
            .await;

        info!(
            "Order {} status changed: {} -> {}",
            order_id, old_status, new_status
        );

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;
        Ok(OrderResponse::from_models(updated, items))
    }

    /// Attach line items to a batch of orders with a single query.
    async fn with_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderResponse>, ServiceError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db)
            .await?;

        let mut by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(orders
            .into_iter()
            .map(|o| {
                let items = by_order.remove(&o.id).unwrap_or_default();
                OrderResponse::from_models(o, items)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_response_carries_price_snapshots() {
        let order_id = Uuid::new_v4();
        let order = order::Model {
            id: order_id,
            user_id: Uuid::new_v4(),
            total_price: dec!(250.00),
            status: OrderStatus::Confirmed,
            payment_id: Some("pay_abc".to_string()),
            created_at: Utc::now(),
        };
        let items = vec![order_item::Model {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            quantity: 2,
            price: dec!(100.00),
            created_at: Utc::now(),
        }];

        let response = OrderResponse::from_models(order, items);
        assert_eq!(response.total_price, dec!(250.00));
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].price, dec!(100.00));
        assert_eq!(response.payment_id.as_deref(), Some("pay_abc"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(OrderStatus::Shipped).unwrap();
        assert_eq!(json, "shipped");
    }
}
