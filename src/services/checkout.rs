use crate::{
    entities::{cart, cart_item, order, order_item, product, Cart, CartItem, OrderStatus, Product},
    errors::ServiceError,
    events::{Event, EventSender},
    message_queue::MessageQueue,
    services::notifications,
    services::orders::OrderResponse,
    services::payments::{PaymentGateway, PaymentIntent},
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Client-submitted payment confirmation triple.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyPaymentInput {
    #[validate(length(min = 1))]
    pub razorpay_order_id: String,
    #[validate(length(min = 1))]
    pub razorpay_payment_id: String,
    #[validate(length(min = 1))]
    pub razorpay_signature: String,
}

struct PricedCart {
    cart: cart::Model,
    /// Cart lines joined with their product at checkout time
    lines: Vec<(cart_item::Model, product::Model)>,
    total: Decimal,
}

/// Converts a cart into an immutable order. All three entry variants
/// share the pricing rule (current product prices at the moment of
/// checkout) and the empty-cart precondition.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    gateway: Arc<dyn PaymentGateway>,
    queue: Arc<dyn MessageQueue>,
    currency: String,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        queue: Arc<dyn MessageQueue>,
        currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            gateway,
            queue,
            currency,
        }
    }

    /// Direct confirm: order the cart contents without a payment step.
    #[instrument(skip(self))]
    pub async fn place_order(&self, user_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let txn = self.db.begin().await?;
        let priced = self.priced_cart(&txn, user_id).await?;
        let response = self
            .finalize_order(&txn, priced, OrderStatus::Confirmed, None)
            .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(response.id))
            .await;

        info!("Placed order {} for user {}", response.id, user_id);
        Ok(response)
    }

    /// Gateway order creation: prices the cart and creates a remote
    /// payment intent. Touches no local order or stock state.
    #[instrument(skip(self))]
    pub async fn create_gateway_order(
        &self,
        user_id: Uuid,
    ) -> Result<PaymentIntent, ServiceError> {
        let txn = self.db.begin().await?;
        let priced = self.priced_cart(&txn, user_id).await?;
        txn.commit().await?;

        let amount_minor = to_minor_units(priced.total)?;
        let receipt = format!("cart-{}", priced.cart.id);

        self.gateway
            .create_intent(amount_minor, &self.currency, &receipt)
            .await
    }

    /// Gateway-verified confirm: checks the payment signature, then
    /// places the order exactly like the direct variant, additionally
    /// recording the payment id and queueing the confirmation mail.
    #[instrument(skip(self, input))]
    pub async fn verify_and_place_order(
        &self,
        user_id: Uuid,
        input: VerifyPaymentInput,
    ) -> Result<OrderResponse, ServiceError> {
        input.validate()?;

        // Reject forged confirmations before touching any state.
        self.gateway.verify_signature(
            &input.razorpay_order_id,
            &input.razorpay_payment_id,
            &input.razorpay_signature,
        )?;

        let txn = self.db.begin().await?;
        let priced = self.priced_cart(&txn, user_id).await?;
        let response = self
            .finalize_order(
                &txn,
                priced,
                OrderStatus::Confirmed,
                Some(input.razorpay_payment_id.clone()),
            )
            .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(response.id))
            .await;
        self.event_sender
            .send_or_log(Event::PaymentVerified {
                order_id: response.id,
                payment_id: input.razorpay_payment_id,
            })
            .await;

        // Only after commit: the mail job must never observe (or roll
        // back with) an uncommitted order.
        if let Err(e) =
            notifications::enqueue_order_confirmation(self.queue.as_ref(), response.id).await
        {
            error!("Failed to enqueue confirmation mail for order {}: {}", response.id, e);
        }

        info!("Placed paid order {} for user {}", response.id, user_id);
        Ok(response)
    }

    /// Loads the caller's cart with products and prices it. EmptyCart if
    /// the cart is missing or holds no items.
    async fn priced_cart(
        &self,
        txn: &DatabaseTransaction,
        user_id: Uuid,
    ) -> Result<PricedCart, ServiceError> {
        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(txn)
            .await?;

        if rows.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let lines = rows
            .into_iter()
            .map(|(item, prod)| {
                let prod = prod.ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;
                Ok((item, prod))
            })
            .collect::<Result<Vec<_>, ServiceError>>()?;

        let total = lines
            .iter()
            .map(|(item, prod)| prod.price * Decimal::from(item.quantity))
            .sum();

        Ok(PricedCart { cart, lines, total })
    }

    /// Shared tail of variants A and C: order + line items, guarded
    /// stock decrement, cart clear. Runs entirely inside the caller's
    /// transaction, so any failure leaves no partial writes.
    async fn finalize_order(
        &self,
        txn: &DatabaseTransaction,
        priced: PricedCart,
        status: OrderStatus,
        payment_id: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(priced.cart.user_id),
            total_price: Set(priced.total),
            status: Set(status),
            payment_id: Set(payment_id),
            created_at: Set(now),
        };
        let placed = order_model.insert(txn).await?;

        let mut item_models = Vec::with_capacity(priced.lines.len());
        for (item, prod) in &priced.lines {
            let line = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(prod.id),
                quantity: Set(item.quantity),
                // Snapshot of the price at purchase time
                price: Set(prod.price),
                created_at: Set(now),
            };
            item_models.push(line.insert(txn).await?);

            self.decrement_stock(txn, prod, item.quantity).await?;
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(priced.cart.id))
            .exec(txn)
            .await?;

        Ok(OrderResponse::from_models(placed, item_models))
    }

    /// Conditional decrement: the WHERE clause keeps stock from ever
    /// going negative under concurrent checkouts; the losing transaction
    /// rolls back.
    async fn decrement_stock<C: ConnectionTrait>(
        &self,
        conn: &C,
        prod: &product::Model,
        quantity: i32,
    ) -> Result<(), ServiceError> {
        let result = Product::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(prod.id))
            .filter(product::Column::Stock.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock(format!(
                "not enough stock of {} to fulfil the order",
                prod.name
            )));
        }
        Ok(())
    }
}

/// Decimal price to minor currency units (paise).
fn to_minor_units(total: Decimal) -> Result<i64, ServiceError> {
    total
        .checked_mul(Decimal::from(100))
        .map(|minor| minor.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| ServiceError::InternalError(format!("order total {} out of range", total)))
}
