mod common;

use axum::http::StatusCode;
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::services::cart::AddItemInput;

fn names(body: &serde_json::Value) -> Vec<String> {
    body.as_array()
        .expect("array body")
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn register_creates_a_user_and_rejects_duplicates() {
    let app = TestApp::new().await;

    let payload = json!({
        "email": "new@example.com",
        "full_name": "New Shopper",
        "password": "a-long-password"
    });

    let (status, body) = app
        .post_json("/api/v1/register", None, payload.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "new@example.com");
    assert_eq!(body["is_staff"], false);
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    let (status, _) = app.post_json("/api/v1/register", None, payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new().await;

    let (status, _) = app
        .post_json(
            "/api/v1/register",
            None,
            json!({
                "email": "not-an-email",
                "full_name": "X",
                "password": "a-long-password"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post_json(
            "/api/v1/register",
            None,
            json!({
                "email": "ok@example.com",
                "full_name": "X",
                "password": "short"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_search_matches_name_and_description_case_insensitively() {
    let app = TestApp::new().await;
    let category = app.create_category("Peripherals").await;
    app.create_product("Mechanical Keyboard", dec!(120.00), 5, category)
        .await;
    app.create_product("Mouse", dec!(40.00), 5, category).await;
    // "Desk Mat" mentions keyboards only in its description
    let id = app.create_product("Desk Mat", dec!(20.00), 5, category).await;
    {
        use sea_orm::{ActiveModelTrait, EntityTrait, Set};
        use storefront_api::entities::{product, Product};
        let model = Product::find_by_id(id)
            .one(&*app.state.db)
            .await
            .unwrap()
            .unwrap();
        let mut active: product::ActiveModel = model.into();
        active.description = Set("Fits under any KEYBOARD".to_string());
        active.update(&*app.state.db).await.unwrap();
    }

    let (status, body) = app.get("/api/v1/products?search=keyboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let mut found = names(&body);
    found.sort();
    assert_eq!(found, vec!["Desk Mat", "Mechanical Keyboard"]);

    let (_, body) = app.get("/api/v1/products?search=KEYBOARD", None).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn product_ordering_by_price_and_name() {
    let app = TestApp::new().await;
    let category = app.create_category("Peripherals").await;
    app.create_product("Keyboard", dec!(120.00), 5, category)
        .await;
    app.create_product("Mouse", dec!(40.00), 5, category).await;
    app.create_product("Amplifier", dec!(300.00), 5, category)
        .await;

    let (_, body) = app.get("/api/v1/products?ordering=price", None).await;
    assert_eq!(names(&body), vec!["Mouse", "Keyboard", "Amplifier"]);

    let (_, body) = app.get("/api/v1/products?ordering=-price", None).await;
    assert_eq!(names(&body), vec!["Amplifier", "Keyboard", "Mouse"]);

    let (_, body) = app.get("/api/v1/products?ordering=name", None).await;
    assert_eq!(names(&body), vec!["Amplifier", "Keyboard", "Mouse"]);

    let (_, body) = app.get("/api/v1/products?ordering=-name", None).await;
    assert_eq!(names(&body), vec!["Mouse", "Keyboard", "Amplifier"]);
}

#[tokio::test]
async fn product_listing_embeds_the_category() {
    let app = TestApp::new().await;
    let category = app.create_category("Peripherals").await;
    app.create_product("Keyboard", dec!(120.00), 5, category)
        .await;

    let (_, body) = app.get("/api/v1/products", None).await;
    assert_eq!(body[0]["category"]["name"], "Peripherals");
}

async fn place_order_for(app: &TestApp, email: &str) -> serde_json::Value {
    let user = app.create_user(email, false).await;
    let category = app.create_category("Misc").await;
    let product = app
        .create_product(&format!("Widget for {email}"), dec!(10.00), 10, category)
        .await;
    app.state
        .services
        .cart
        .add_item(
            user.id,
            AddItemInput {
                product_id: product,
                quantity: 1,
            },
        )
        .await
        .expect("add item");
    let order = app
        .state
        .services
        .checkout
        .place_order(user.id)
        .await
        .expect("checkout");
    serde_json::to_value(order).expect("order json")
}

#[tokio::test]
async fn admin_can_filter_orders_by_status_case_insensitively() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", true).await;
    let admin_token = app.token_for(&admin);

    let order_a = place_order_for(&app, "a@example.com").await;
    let order_b = place_order_for(&app, "b@example.com").await;

    // Ship one of the two orders
    let (status, _) = app
        .put_json(
            &format!("/api/v1/admin/orders/{}/update", order_a["id"].as_str().unwrap()),
            Some(&admin_token),
            json!({ "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .get("/api/v1/admin/orders?status=SHIPPED", Some(&admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], order_a["id"]);
    assert_eq!(listed[0]["status"], "shipped");

    // Unfiltered view returns everything
    let (_, body) = app.get("/api/v1/admin/orders", Some(&admin_token)).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    let _ = order_b;
}

#[tokio::test]
async fn admin_status_filter_rejects_unknown_values() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", true).await;
    let token = app.token_for(&admin);

    let (status, _) = app
        .get("/api/v1/admin/orders?status=teleported", Some(&token))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_update_accepts_patch_and_unknown_orders_are_404() {
    let app = TestApp::new().await;
    let admin = app.create_user("admin@example.com", true).await;
    let token = app.token_for(&admin);

    let order = place_order_for(&app, "c@example.com").await;
    let order_id = order["id"].as_str().unwrap();

    let (status, body) = app
        .request(
            axum::http::Method::PATCH,
            &format!("/api/v1/admin/orders/{order_id}/update"),
            Some(&token),
            Some(json!({ "status": "Delivered" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "delivered");

    let (status, _) = app
        .put_json(
            &format!("/api/v1/admin/orders/{}/update", uuid::Uuid::new_v4()),
            Some(&token),
            json!({ "status": "shipped" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_refuse_non_staff_callers() {
    let app = TestApp::new().await;
    let shopper = app.create_user("shopper@example.com", false).await;
    let token = app.token_for(&shopper);

    let (status, _) = app.get("/api/v1/admin/orders", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/v1/admin/orders", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}
