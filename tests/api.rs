//! End-to-end tests of the HTTP routes over the in-memory store.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use bargain_market::api::{router, AppState};
use bargain_market::domain::services::DeliveryPricing;
use bargain_market::events::EventPublisher;
use bargain_market::store::MemoryStore;
use bargain_market::OfferStrategy;

fn app() -> Router {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        OfferStrategy::default(),
        DeliveryPricing::default(),
        EventPublisher::disabled(),
    );
    router(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn create_product(app: &Router, body: Value) -> String {
    let (status, product) = call(app, Method::POST, "/api/v1/products", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    product["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = call(&app(), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_counter_then_accept_fills_cart() {
    let app = app();
    let product_id = create_product(
        &app,
        json!({
            "shop_id": Uuid::new_v4(),
            "name": "Adire fabric",
            "price": 100.0,
            "min_price": 70.0,
            "max_discount_percentage": 35.0,
            "allow_further_rounds": true,
            "stock": 3,
        }),
    )
    .await;
    let customer = Uuid::new_v4();

    let (status, offer) = call(
        &app,
        Method::POST,
        &format!("/api/v1/products/{product_id}/negotiate"),
        Some(json!({ "customer_id": customer, "offered_price": 85.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offer["decision"], "counter");
    assert_eq!(offer["negotiation"]["status"], "counter_offer");
    assert_eq!(offer["negotiation"]["rounds"], 1);
    let counter = offer["counter_price"].as_f64().unwrap();
    assert!((counter - 89.5).abs() < 1e-9);
    assert!(offer["message"].as_str().unwrap().starts_with("How about 89.50"));

    let negotiation_id = offer["negotiation"]["id"].as_str().unwrap().to_string();
    let accept_uri = format!("/api/v1/negotiations/{negotiation_id}/accept");

    let (status, _) = call(&app, Method::POST, &accept_uri, Some(json!({ "customer_id": Uuid::new_v4() }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, accepted) = call(&app, Method::POST, &accept_uri, Some(json!({ "customer_id": customer }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["final_price"].as_f64(), Some(counter));

    let (status, cart) = call(&app, Method::GET, &format!("/api/v1/carts/{customer}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["negotiated_price"].as_f64(), Some(counter));
    assert!((cart["subtotal"].as_f64().unwrap() - counter).abs() < 1e-9);

    let (_, product) = call(&app, Method::GET, &format!("/api/v1/products/{product_id}"), None).await;
    assert_eq!(product["stock"], 2);

    let (status, record) = call(&app, Method::GET, &format!("/api/v1/negotiations/{negotiation_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["negotiation"]["status"], "accepted");

    // accepted records take no further acceptance
    let (status, _) = call(&app, Method::POST, &accept_uri, Some(json!({ "customer_id": customer }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_single_round_product_refuses_second_offer() {
    let app = app();
    let product_id = create_product(
        &app,
        json!({ "shop_id": Uuid::new_v4(), "name": "Beaded bag", "price": 100.0, "min_price": 70.0 }),
    )
    .await;
    let customer = Uuid::new_v4();
    let uri = format!("/api/v1/products/{product_id}/negotiate");

    let (status, _) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": customer, "offered_price": 85.0 }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": customer, "offered_price": 88.0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_non_negotiable_product_and_bad_offers() {
    let app = app();
    let fixed = create_product(&app, json!({ "shop_id": Uuid::new_v4(), "name": "Fixed", "price": 50.0 })).await;
    let customer = Uuid::new_v4();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/products/{fixed}/negotiate"),
        Some(json!({ "customer_id": customer, "offered_price": 40.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "This product does not support price negotiation");

    let negotiable = create_product(
        &app,
        json!({ "shop_id": Uuid::new_v4(), "name": "Mat", "price": 100.0, "min_price": 70.0 }),
    )
    .await;
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/v1/products/{negotiable}/negotiate"),
        Some(json!({ "customer_id": customer, "offered_price": -5.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, rejected) = call(
        &app,
        Method::POST,
        &format!("/api/v1/products/{negotiable}/negotiate"),
        Some(json!({ "customer_id": customer, "offered_price": 100.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["decision"], "reject");
    assert_eq!(rejected["continue_negotiation"], false);

    let (status, _) = call(&app, Method::GET, &format!("/api/v1/products/{}", Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_min_price_above_list_price_is_not_negotiable() {
    let (status, product) = call(
        &app(),
        Method::POST,
        "/api/v1/products",
        Some(json!({ "shop_id": Uuid::new_v4(), "name": "Odd", "price": 50.0, "min_price": 60.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["is_negotiable"], false);
    assert_eq!(product["min_price"], Value::Null);
    assert_eq!(product["max_discount"], Value::Null);
}

#[tokio::test]
async fn test_late_offer_accepted_outright_fills_cart() {
    let app = app();
    let product_id = create_product(
        &app,
        json!({
            "shop_id": Uuid::new_v4(),
            "name": "Aso oke",
            "price": 100.0,
            "min_price": 70.0,
            "max_discount_percentage": 35.0,
            "allow_further_rounds": true,
            "stock": 4,
        }),
    )
    .await;
    let customer = Uuid::new_v4();
    let uri = format!("/api/v1/products/{product_id}/negotiate");

    for offered in [80.0, 82.0, 84.0, 86.0] {
        let (status, offer) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": customer, "offered_price": offered }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(offer["decision"], "counter");
        assert_eq!(offer["continue_negotiation"], true);
    }

    let (status, deal) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": customer, "offered_price": 98.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deal["decision"], "accept");
    assert_eq!(deal["continue_negotiation"], false);
    assert_eq!(deal["final_price"].as_f64(), Some(98.0));
    assert_eq!(deal["negotiation"]["status"], "accepted");
    assert_eq!(deal["negotiation"]["rounds"], 5);

    let (_, cart) = call(&app, Method::GET, &format!("/api/v1/carts/{customer}"), None).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["negotiated_price"].as_f64(), Some(98.0));
    assert_eq!(cart["subtotal"].as_f64(), Some(98.0));

    let (_, product) = call(&app, Method::GET, &format!("/api/v1/products/{product_id}"), None).await;
    assert_eq!(product["stock"], 3);
}

#[tokio::test]
async fn test_accept_fails_when_out_of_stock() {
    let app = app();
    let product_id = create_product(
        &app,
        json!({ "shop_id": Uuid::new_v4(), "name": "Last one gone", "price": 100.0, "min_price": 70.0 }),
    )
    .await;
    let customer = Uuid::new_v4();

    let (_, offer) = call(
        &app,
        Method::POST,
        &format!("/api/v1/products/{product_id}/negotiate"),
        Some(json!({ "customer_id": customer, "offered_price": 85.0 })),
    )
    .await;
    let negotiation_id = offer["negotiation"]["id"].as_str().unwrap();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/v1/negotiations/{negotiation_id}/accept"),
        Some(json!({ "customer_id": customer })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Insufficient stock");

    let (_, record) = call(&app, Method::GET, &format!("/api/v1/negotiations/{negotiation_id}"), None).await;
    assert_eq!(record["negotiation"]["status"], "counter_offer");
}

#[tokio::test]
async fn test_delivery_fee_accepted_outright_sets_order_fee() {
    let app = app();
    let customer = Uuid::new_v4();
    // Lagos to Ibadan
    let (_, order) = call(
        &app,
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "customer_id": customer,
            "shop_lat": 6.5244, "shop_lng": 3.3792,
            "delivery_lat": 7.3775, "delivery_lng": 3.9470,
            "subtotal": 20.0,
        })),
    )
    .await;
    let order_id = order["id"].as_str().unwrap().to_string();
    let (_, quote) = call(&app, Method::GET, &format!("/api/v1/orders/{order_id}/delivery-quote"), None).await;
    let base_fee = quote["base_fee"].as_f64().unwrap();
    assert!(base_fee > 80.0);

    let uri = format!("/api/v1/orders/{order_id}/delivery/negotiate");
    for share in [0.80, 0.82, 0.84, 0.86] {
        let (status, offer) = call(
            &app,
            Method::POST,
            &uri,
            Some(json!({ "customer_id": customer, "offered_fee": base_fee * share })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(offer["decision"], "counter");
    }

    let final_fee = base_fee * 0.98;
    let (status, deal) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": customer, "offered_fee": final_fee }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deal["decision"], "accept");
    assert_eq!(deal["final_fee"].as_f64(), Some(final_fee));

    let (_, order) = call(&app, Method::GET, &format!("/api/v1/orders/{order_id}"), None).await;
    assert_eq!(order["delivery_fee"].as_f64(), Some(final_fee));
    assert!((order["total"].as_f64().unwrap() - (20.0 + final_fee)).abs() < 1e-9);
}

#[tokio::test]
async fn test_delivery_fee_negotiation() {
    let app = app();
    let customer = Uuid::new_v4();
    let (status, order) = call(
        &app,
        Method::POST,
        "/api/v1/orders",
        Some(json!({
            "customer_id": customer,
            "shop_lat": 6.4541, "shop_lng": 3.3947,
            "delivery_lat": 6.4400, "delivery_lng": 3.4000,
            "subtotal": 40.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_str().unwrap().to_string();

    let (status, quote) = call(&app, Method::GET, &format!("/api/v1/orders/{order_id}/delivery-quote"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["base_fee"].as_f64(), Some(5.0));

    let uri = format!("/api/v1/orders/{order_id}/delivery/negotiate");
    let (status, _) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": Uuid::new_v4(), "offered_fee": 4.5 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, offer) = call(&app, Method::POST, &uri, Some(json!({ "customer_id": customer, "offered_fee": 4.5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(offer["decision"], "counter");
    let counter = offer["counter_fee"].as_f64().unwrap();
    assert!((counter - 4.55).abs() < 1e-9);

    let negotiation_id = offer["negotiation"]["id"].as_str().unwrap();
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/v1/negotiations/{negotiation_id}/accept"),
        Some(json!({ "customer_id": customer })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, order) = call(&app, Method::GET, &format!("/api/v1/orders/{order_id}"), None).await;
    assert_eq!(order["delivery_fee"].as_f64(), Some(counter));
    assert!((order["total"].as_f64().unwrap() - (40.0 + counter)).abs() < 1e-9);
}

#[tokio::test]
async fn test_stateless_evaluation() {
    let app = app();
    let (status, out) = call(
        &app,
        Method::POST,
        "/api/v1/negotiations/evaluate",
        Some(json!({
            "list_price": 100.0,
            "min_price": 70.0,
            "max_discount_percentage": 20.0,
            "offered_price": 85.0,
            "rounds_so_far": 4,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(out["decision"], "counter");
    assert!((out["counter_price"].as_f64().unwrap() - 94.0).abs() < 1e-9);
    assert_eq!(out["continue_negotiation"], false);

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/v1/negotiations/evaluate",
        Some(json!({ "list_price": 100.0, "offered_price": 85.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}
