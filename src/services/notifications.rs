use crate::{
    entities::{Order, User},
    errors::ServiceError,
    mailer::{Mailer, OutboundEmail},
    message_queue::{Message, MessageQueue},
};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Queue topic carrying order-confirmation jobs.
pub const ORDER_CONFIRMATIONS_TOPIC: &str = "order-confirmations";

#[derive(Debug, Serialize, Deserialize)]
struct OrderConfirmationJob {
    order_id: Uuid,
}

/// Publish a confirmation job. Called by checkout after its transaction
/// commits; failures here are the caller's to log, never to surface.
pub async fn enqueue_order_confirmation(
    queue: &dyn MessageQueue,
    order_id: Uuid,
) -> Result<(), ServiceError> {
    let payload = serde_json::to_value(OrderConfirmationJob { order_id })
        .map_err(|e| ServiceError::QueueError(e.to_string()))?;
    queue
        .publish(Message::new(ORDER_CONFIRMATIONS_TOPIC.to_string(), payload))
        .await
        .map_err(|e| ServiceError::QueueError(e.to_string()))
}

/// Builds and sends order-confirmation mail off the request path.
#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl NotificationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        mailer: Arc<dyn Mailer>,
        from_address: String,
    ) -> Self {
        Self {
            db,
            mailer,
            from_address,
        }
    }

    /// Send the confirmation mail for an order. A missing order is a
    /// soft failure: logged, not retried, and the worker stays up.
    /// Transport errors propagate to the worker's policy.
    #[instrument(skip(self))]
    pub async fn notify_order_confirmed(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let row = Order::find_by_id(order_id)
            .find_also_related(User)
            .one(&*self.db)
            .await?;

        let (order, user) = match row {
            Some((order, Some(user))) => (order, user),
            _ => {
                warn!("Order {} not found; skipping confirmation mail", order_id);
                return Ok(());
            }
        };

        let email = OutboundEmail {
            from: self.from_address.clone(),
            to: user.email,
            subject: format!("Order #{} Confirmation", order.id),
            body: confirmation_body(&user.full_name, order.id, &order.total_price.to_string()),
        };

        self.mailer.send(email).await?;
        info!("Sent confirmation mail for order {}", order_id);
        Ok(())
    }
}

fn confirmation_body(full_name: &str, order_id: Uuid, total: &str) -> String {
    format!(
        "Hi {full_name},\n\n\
         Thank you for your order!\n\n\
         Order ID: {order_id}\n\
         Total: \u{20b9}{total}\n\n\
         We'll notify you once it's shipped.\n"
    )
}

/// Drain one job from the queue, if any. Returns whether a job was
/// processed; job errors are logged, not returned, so a poison message
/// cannot wedge the worker.
pub async fn process_next(
    queue: &dyn MessageQueue,
    service: &NotificationService,
) -> Result<bool, ServiceError> {
    let message = queue
        .subscribe(ORDER_CONFIRMATIONS_TOPIC)
        .await
        .map_err(|e| ServiceError::QueueError(e.to_string()))?;

    let Some(message) = message else {
        return Ok(false);
    };

    match serde_json::from_value::<OrderConfirmationJob>(message.payload.clone()) {
        Ok(job) => {
            if let Err(e) = service.notify_order_confirmed(job.order_id).await {
                error!(
                    "Confirmation mail for order {} failed: {}",
                    job.order_id, e
                );
            }
        }
        Err(e) => {
            error!("Discarding malformed notification job {}: {}", message.id, e);
        }
    }
    Ok(true)
}

/// Background worker loop consuming confirmation jobs.
pub fn start_worker(
    queue: Arc<dyn MessageQueue>,
    service: Arc<NotificationService>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Notification worker started");
        loop {
            match process_next(queue.as_ref(), service.as_ref()).await {
                Ok(true) => {}
                Ok(false) => tokio::time::sleep(Duration::from_millis(500)).await,
                Err(e) => {
                    error!("Notification worker queue error: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_body_contains_template_fields() {
        let order_id = Uuid::new_v4();
        let body = confirmation_body("Aafan Kadri", order_id, "250.00");
        assert!(body.contains("Hi Aafan Kadri,"));
        assert!(body.contains(&format!("Order ID: {order_id}")));
        assert!(body.contains("Total: \u{20b9}250.00"));
        assert!(body.contains("We'll notify you once it's shipped."));
    }

    #[tokio::test]
    async fn enqueue_publishes_to_the_confirmations_topic() {
        let queue = crate::message_queue::InMemoryMessageQueue::new();
        let order_id = Uuid::new_v4();
        enqueue_order_confirmation(&queue, order_id).await.unwrap();

        let message = queue
            .subscribe(ORDER_CONFIRMATIONS_TOPIC)
            .await
            .unwrap()
            .expect("one job enqueued");
        assert_eq!(message.payload["order_id"], order_id.to_string());
    }
}
