use crate::{
    entities::{cart, cart_item, Cart, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Input for adding an item to the caller's cart.
#[derive(Debug, Deserialize)]
pub struct AddItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Cart line joined with its product for display.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// The caller's cart with its lines.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub items: Vec<CartItemResponse>,
}

/// Per-user shopping cart. Carts are created lazily on first access;
/// every mutation is scoped to the requesting user so cross-user item
/// ids never resolve.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the user's cart, creating an empty one on first access.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: Uuid) -> Result<CartResponse, ServiceError> {
        let cart = self.find_or_create(&*self.db, user_id).await?;
        self.cart_view(&*self.db, cart).await
    }

    /// Adds `quantity` of a product to the user's cart. A line already
    /// holding the product accumulates; otherwise a new line is created
    /// with exactly the requested quantity.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartResponse, ServiceError> {
        if input.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = self.find_or_create(&txn, user_id).await?;

        Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing {
            let current = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current + input.quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let line = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            line.insert(&txn).await?;
        }

        let view = self.cart_view(&txn, cart.clone()).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
            })
            .await;

        info!(
            "Added to cart {}: product {} x{}",
            cart.id, input.product_id, input.quantity
        );
        Ok(view)
    }

    /// Overwrites the quantity on a line the caller owns.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartResponse, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let (item, cart) = self.owned_item(&txn, user_id, item_id).await?;

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let view = self.cart_view(&txn, cart.clone()).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;

        Ok(view)
    }

    /// Deletes a line the caller owns.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let (item, cart) = self.owned_item(&txn, user_id, item_id).await?;
        item.delete(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        Ok(())
    }

    /// Resolves a cart item only when it belongs to a cart owned by the
    /// caller. Any miss, including another user's item, is NotFound.
    async fn owned_item<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
        item_id: Uuid,
    ) -> Result<(cart_item::Model, cart::Model), ServiceError> {
        let not_found = || ServiceError::NotFound(format!("Cart item {} not found", item_id));

        let row = CartItem::find_by_id(item_id)
            .find_also_related(Cart)
            .one(conn)
            .await?;

        match row {
            Some((item, Some(cart))) if cart.user_id == user_id => Ok((item, cart)),
            _ => Err(not_found()),
        }
    }

    async fn find_or_create<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(conn)
            .await?
        {
            return Ok(cart);
        }

        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        match model.insert(conn).await {
            Ok(cart) => Ok(cart),
            // Lost a creation race on the unique user_id index; the
            // winner's row is the cart.
            Err(insert_err) => Cart::find()
                .filter(cart::Column::UserId.eq(user_id))
                .one(conn)
                .await?
                .ok_or(ServiceError::DatabaseError(insert_err)),
        }
    }

    async fn cart_view<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: cart::Model,
    ) -> Result<CartResponse, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(conn)
            .await?;

        let items = rows
            .into_iter()
            .map(|(item, prod)| {
                let prod = prod.ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
                Ok(CartItemResponse {
                    id: item.id,
                    product_id: prod.id,
                    product_name: prod.name,
                    unit_price: prod.price,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        Ok(CartResponse { id: cart.id, items })
    }
}
