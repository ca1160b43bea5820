//! Cart, saved address, profile and pricing endpoints.

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use serde_json::json;

use poizon_integration_tests::{TestApp, pickup_checkout};

#[tokio::test]
async fn test_cart_items_belong_to_their_owner() {
    let app = TestApp::new();
    let owner = app.login(42, "buyer").await;
    let other = app.login(43, "stranger").await;

    let (status, item) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(&owner),
            Some(json!({
                "link": "https://dw4.co/t/A/1abc",
                "category": "Обувь",
                "shipping": "standard",
                "price": 5000,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let item_id = item["id"].as_i64().unwrap();

    let (_, foreign_cart) = app.request(Method::GET, "/api/cart", Some(&other), None).await;
    assert_eq!(foreign_cart, json!([]));

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/cart/{item_id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Товар не найден");

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/cart/{item_id}"), Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, cart) = app.request(Method::GET, "/api/cart", Some(&owner), None).await;
    assert_eq!(cart, json!([]));
}

#[tokio::test]
async fn test_cart_prices_raw_amount_server_side() {
    let app = TestApp::new();
    let token = app.login(42, "buyer").await;

    // A client-supplied price is ignored when the raw price is present.
    let (status, item) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({
                "link": "https://dw4.co/t/A/1abc",
                "category": "Обувь",
                "shipping": "air",
                "price": 1,
                "rawPrice": 100,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["price"], 2790);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "link": "", "category": "Обувь", "shipping": "air", "price": 10 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_address_round_trip() {
    let app = TestApp::new();
    let token = app.login(42, "buyer").await;

    let (status, empty) = app
        .request(Method::GET, "/api/user/address", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty, json!(null));

    let (status, saved) = app
        .request(
            Method::POST,
            "/api/user/address",
            Some(&token),
            Some(json!({
                "name": "  Иванов Иван ",
                "phone": "+79990000000",
                "city": "Москва",
                "cityCode": "44",
                "deliveryType": "address",
                "street": "ул. Ленина, 5",
                "pickupCode": "",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(saved["name"], "Иванов Иван");
    assert_eq!(saved["pickupCode"], json!(null));

    let (_, loaded) = app
        .request(Method::GET, "/api/user/address", Some(&token), None)
        .await;
    assert_eq!(loaded, saved);
}

#[tokio::test]
async fn test_address_requires_pickup_point_for_pickup() {
    let app = TestApp::new();
    let token = app.login(42, "buyer").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/user/address",
            Some(&token),
            Some(json!({
                "name": "Иванов Иван",
                "phone": "+79990000000",
                "city": "Москва",
                "deliveryType": "pickup",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Выберите пункт выдачи");
}

#[tokio::test]
async fn test_profile_without_orders() {
    let app = TestApp::new();
    let token = app.login(42, "buyer").await;

    let (status, profile) = app
        .request(Method::GET, "/api/user/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["orderCount"], 0);
    assert_eq!(profile["totalSpent"], 0);
    assert_eq!(profile["loyalty"]["tier"], "Bronze");
    assert_eq!(profile["lastOrder"], json!(null));
    assert_eq!(profile["daysSinceRegistration"], 0);
    assert_eq!(
        profile["referralLink"],
        "https://t.me/poizon_order_bot?startapp=ref_42"
    );
}

#[tokio::test]
async fn test_profile_counts_placed_orders() {
    let app = TestApp::new();
    let token = app.login(42, "buyer").await;
    for _ in 0..2 {
        let (status, _) = app
            .request(Method::POST, "/api/orders", Some(&token), Some(pickup_checkout()))
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, profile) = app
        .request(Method::GET, "/api/user/profile", Some(&token), None)
        .await;
    assert_eq!(profile["orderCount"], 2);
    assert_eq!(profile["totalSpent"], 5580);
    assert_eq!(profile["lastOrder"]["status"], "pending");
}

#[tokio::test]
async fn test_rate_and_calculate_are_public() {
    let app = TestApp::new();

    let (status, rate) = app.request(Method::GET, "/api/rate", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rate["rate"], 14.0);

    let (status, quote) = app
        .request(
            Method::POST,
            "/api/calculate",
            None,
            Some(json!({ "price": 100, "shipping": "standard" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["price"], 2390);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/calculate",
            None,
            Some(json!({ "price": -5, "shipping": "air" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_carrier_lookups_without_credentials() {
    let app = TestApp::new();

    let (status, _) = app
        .request(Method::GET, "/api/cdek/cities?q=%D0%9C%D0%BE%D1%81%D0%BA", None, None)
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
