mod common;

use axum::http::StatusCode;
use common::{sign_payment, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use storefront_api::{
    entities::{Order, Product},
    services::cart::AddItemInput,
    services::notifications::{self, ORDER_CONFIRMATIONS_TOPIC},
};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn seed_cart(app: &TestApp, user_id: uuid::Uuid) -> uuid::Uuid {
    let category = app.create_category("Peripherals").await;
    let product = app
        .create_product("Keyboard", dec!(100.00), 5, category)
        .await;
    app.state
        .services
        .cart
        .add_item(
            user_id,
            AddItemInput {
                product_id: product,
                quantity: 2,
            },
        )
        .await
        .expect("add item");
    product
}

#[tokio::test]
async fn create_gateway_order_returns_the_remote_intent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        // 2 x 100.00 priced in paise
        .and(body_partial_json(json!({ "amount": 20000, "currency": "INR" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_remote_123",
            "amount": 20000,
            "currency": "INR",
            "status": "created"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = TestApp::with_gateway_base(&server.uri()).await;
    let user = app.create_user("shopper@example.com", false).await;
    let token = app.token_for(&user);
    let product = seed_cart(&app, user.id).await;

    let (status, body) = app
        .post_json("/api/v1/razorpay/create-order", Some(&token), json!({}))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["gateway_order_id"], "order_remote_123");
    assert_eq!(body["amount"], 20000);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["key_id"], common::TEST_RAZORPAY_KEY_ID);

    // Gateway order creation never touches local state
    let orders = Order::find().all(&*app.state.db).await.expect("query");
    assert!(orders.is_empty());
    let stock = Product::find_by_id(product)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 5);
}

#[tokio::test]
async fn gateway_rejection_propagates_as_payment_required() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = TestApp::with_gateway_base(&server.uri()).await;
    let user = app.create_user("shopper@example.com", false).await;
    let token = app.token_for(&user);
    seed_cart(&app, user.id).await;

    let (status, _) = app
        .post_json("/api/v1/razorpay/create-order", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn empty_cart_fails_before_any_gateway_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let app = TestApp::with_gateway_base(&server.uri()).await;
    let user = app.create_user("shopper@example.com", false).await;
    let token = app.token_for(&user);

    let (status, _) = app
        .post_json("/api/v1/razorpay/create-order", Some(&token), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_signature_leaves_all_state_untouched() {
    let app = TestApp::new().await;
    let user = app.create_user("shopper@example.com", false).await;
    let token = app.token_for(&user);
    let product = seed_cart(&app, user.id).await;

    let (status, _) = app
        .post_json(
            "/api/v1/razorpay/verify-payment",
            Some(&token),
            json!({
                "razorpay_order_id": "order_remote_123",
                "razorpay_payment_id": "pay_456",
                "razorpay_signature": "deadbeef"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let orders = Order::find().all(&*app.state.db).await.expect("query");
    assert!(orders.is_empty());

    let stock = Product::find_by_id(product)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 5);

    let cart = app
        .state
        .services
        .cart
        .get_or_create_cart(user.id)
        .await
        .expect("get cart");
    assert_eq!(cart.items.len(), 1);

    // Nothing queued either
    let queued = app
        .state
        .queue
        .subscribe(ORDER_CONFIRMATIONS_TOPIC)
        .await
        .expect("queue");
    assert!(queued.is_none());
}

#[tokio::test]
async fn verified_payment_places_the_order_and_queues_mail() {
    let app = TestApp::new().await;
    let user = app.create_user("shopper@example.com", false).await;
    let token = app.token_for(&user);
    let product = seed_cart(&app, user.id).await;

    let signature = sign_payment("order_remote_123", "pay_456");
    let (status, body) = app
        .post_json(
            "/api/v1/razorpay/verify-payment",
            Some(&token),
            json!({
                "razorpay_order_id": "order_remote_123",
                "razorpay_payment_id": "pay_456",
                "razorpay_signature": signature
            }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payment_id"], "pay_456");
    assert_eq!(body["status"], "confirmed");
    let total: rust_decimal::Decimal = body["total_price"]
        .as_str()
        .expect("decimal serializes as a string")
        .parse()
        .expect("parse total");
    assert_eq!(total, dec!(200));

    let stock = Product::find_by_id(product)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 3);

    let cart = app
        .state
        .services
        .cart
        .get_or_create_cart(user.id)
        .await
        .expect("get cart");
    assert!(cart.items.is_empty());

    // Exactly one confirmation job was queued after commit; draining it
    // sends the templated mail to the order owner.
    let processed = notifications::process_next(
        app.state.queue.as_ref(),
        app.state.services.notifications.as_ref(),
    )
    .await
    .expect("process job");
    assert!(processed);

    let sent = app.mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "shopper@example.com");
    let order_id = body["id"].as_str().unwrap();
    assert_eq!(sent[0].subject, format!("Order #{order_id} Confirmation"));
    assert!(sent[0].body.contains("We'll notify you once it's shipped."));

    // And the queue is drained
    let more = notifications::process_next(
        app.state.queue.as_ref(),
        app.state.services.notifications.as_ref(),
    )
    .await
    .expect("empty queue");
    assert!(!more);
}

#[tokio::test]
async fn notification_worker_survives_an_unknown_order() {
    let app = TestApp::new().await;

    notifications::enqueue_order_confirmation(app.state.queue.as_ref(), uuid::Uuid::new_v4())
        .await
        .expect("enqueue");

    let processed = notifications::process_next(
        app.state.queue.as_ref(),
        app.state.services.notifications.as_ref(),
    )
    .await
    .expect("soft failure");
    assert!(processed);
    assert!(app.mailer.sent.lock().unwrap().is_empty());
}
