use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use stock_fulfillment::adapter::driven::{ConsoleLogger, InMemoryStore};
use stock_fulfillment::adapter::driver::response_dto::{
    CreateOrderResponse, CreatedResponse, LedgerResponse, OrderResponse, ProductResponse,
    UserResponse,
};
use stock_fulfillment::adapter::driver::rest_api::{create_router, ApiError, AppState};
use stock_fulfillment::application::service::{OrderApplicationService, ProductApplicationService};
use stock_fulfillment::domain::model::{
    CreatedSource, DeliveryMethod, EntryType, OrderContact, OrderDraft, OrderLineRequest,
    ProductDetails, ShippingStatus, ShippingUpdate, UserId,
};
use stock_fulfillment::domain::port::{LedgerRepository, LogLevel, StockStore};
use stock_fulfillment::domain::retry::RetryPolicy;
use stock_fulfillment::domain::service::StockEngine;

// テスト用ヘルパー関数
fn test_server() -> TestServer {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(StockEngine::new(
        store.clone(),
        RetryPolicy::immediate(5).unwrap(),
        Arc::new(ConsoleLogger::with_min_level(LogLevel::Error)),
    ));
    let state = AppState::new(engine, store.clone(), store.clone(), store.clone(), store);
    TestServer::new(create_router().with_state(state)).unwrap()
}

async fn register_product(server: &TestServer, quantity: i64, cost_price: Option<&str>) -> Uuid {
    let response = server
        .post("/products")
        .json(&json!({
            "name": "木製トレイ",
            "description": "オーク材",
            "cost_price": cost_price,
            "quantity": quantity,
            "purchase_location": "工房",
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<CreatedResponse>().id
}

async fn get_product(server: &TestServer, product_id: Uuid) -> ProductResponse {
    let response = server.get(&format!("/products/{}", product_id)).await;
    response.assert_status_ok();
    response.json::<ProductResponse>()
}

async fn create_order(server: &TestServer, body: Value) -> axum_test::TestResponse {
    server.post("/orders").json(&body).await
}

fn order_body(uid: &str, method: &str, items: &[(Uuid, i64)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(product_id, quantity)| json!({"product_id": product_id, "quantity": quantity}))
        .collect();
    json!({
        "items": items,
        "requested_by": "田中 花子",
        "requested_address": "東京都千代田区1-1",
        "delivery_method": method,
        "created_by_uid": uid,
        "created_by_email": "hanako@example.com",
    })
}

#[tokio::test]
async fn test_health_check() {
    let server = test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "stock-fulfillment");
}

#[tokio::test]
async fn test_register_and_fetch_product() {
    let server = test_server();
    let product_id = register_product(&server, 10, Some("120.00")).await;

    let product = get_product(&server, product_id).await;
    assert_eq!(product.name, "木製トレイ");
    assert_eq!(product.quantity, 10);
    assert_eq!(product.reserved, 0);
    assert_eq!(product.initial_quantity, 10);
    assert_eq!(product.cost_price, Some(Decimal::new(12000, 2)));

    let ledger = server
        .get(&format!("/products/{}/ledger", product_id))
        .await
        .json::<LedgerResponse>();
    assert_eq!(ledger.entries.len(), 1);
    assert_eq!(ledger.entries[0].source, "admin_add");
    assert_eq!(ledger.summary.in_quantity, 10);
}

#[tokio::test]
async fn test_register_product_validation() {
    let server = test_server();

    let response = server
        .post("/products")
        .json(&json!({"name": "木製トレイ", "quantity": -3}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ApiError>().code, "INVALID_QUANTITY");

    let response = server
        .post("/products")
        .json(&json!({"name": "木製トレイ", "quantity": "many"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ApiError>().code, "INVALID_REQUEST");
}

#[tokio::test]
async fn test_cost_price_beyond_storage_precision_is_rejected() {
    let server = test_server();

    for cost_price in ["79228162514264337593543950335", "10000000000", "0.125"] {
        let response = server
            .post("/products")
            .json(&json!({"name": "木製トレイ", "cost_price": cost_price, "quantity": 10}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ApiError>().code, "INVALID_VALUE");
    }

    let products = server.get("/products").await.json::<Vec<ProductResponse>>();
    assert!(products.is_empty());
}

#[tokio::test]
async fn test_largest_cost_price_flows_through_orders_and_ledger() {
    let server = test_server();
    let product_id = register_product(&server, 10, Some("9999999999.99")).await;

    let response = create_order(&server, order_body("uid-1", "pickup", &[(product_id, 2)])).await;
    response.assert_status(StatusCode::CREATED);

    let orders = server
        .get("/users/uid-1/orders")
        .await
        .json::<Vec<OrderResponse>>();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].total, Decimal::new(1_999_999_999_998, 2));

    let response = server.get(&format!("/products/{}/ledger", product_id)).await;
    response.assert_status_ok();
    let ledger = response.json::<LedgerResponse>();
    assert_eq!(ledger.summary.in_value, Decimal::new(9_999_999_999_990, 2));
    assert_eq!(ledger.summary.out_value, Decimal::new(1_999_999_999_998, 2));
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let server = test_server();
    let response = server.get(&format!("/products/{}", Uuid::new_v4())).await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<ApiError>().code, "PRODUCT_NOT_FOUND");
}

#[tokio::test]
async fn test_shipping_order_reserves_then_finalizes_once() {
    let server = test_server();
    let product_id = register_product(&server, 10, Some("500")).await;

    let response = create_order(&server, order_body("uid-1", "shipping", &[(product_id, 3)])).await;
    response.assert_status(StatusCode::CREATED);
    let order_id = response.json::<CreateOrderResponse>().order_id;

    let product = get_product(&server, product_id).await;
    assert_eq!(product.quantity, 10);
    assert_eq!(product.reserved, 3);
    assert_eq!(product.available, 7);

    let shipping_url = format!("/users/uid-1/orders/{}/shipping", order_id);
    let response = server
        .put(&shipping_url)
        .json(&json!({"shipping_carrier": "ヤマト", "tracking_number": "1234-5678", "shipping_status": "shipping"}))
        .await;
    response.assert_status_ok();
    assert_eq!(get_product(&server, product_id).await.reserved, 3);

    let response = server
        .put(&shipping_url)
        .json(&json!({"shipping_status": "delivered"}))
        .await;
    response.assert_status_ok();
    let order = response.json::<OrderResponse>();
    assert_eq!(order.shipping_status, "delivered");
    assert_eq!(order.tracking_number.as_deref(), Some("1234-5678"));

    let product = get_product(&server, product_id).await;
    assert_eq!(product.quantity, 7);
    assert_eq!(product.reserved, 0);

    // 2回目の配送完了では在庫は変化しない
    server
        .put(&shipping_url)
        .json(&json!({"shipping_status": "delivered"}))
        .await
        .assert_status_ok();
    let product = get_product(&server, product_id).await;
    assert_eq!(product.quantity, 7);

    let ledger = server
        .get(&format!("/products/{}/ledger", product_id))
        .await
        .json::<LedgerResponse>();
    assert_eq!(ledger.summary.out_quantity, 3);
    assert_eq!(ledger.entries[0].source, "order_customer_ship_success");
    assert_eq!(ledger.entries[0].order_id, Some(order_id));
    assert_eq!(ledger.entries[0].actor_uid.as_deref(), Some("uid-1"));
}

#[tokio::test]
async fn test_pickup_order_deducts_immediately() {
    let server = test_server();
    let product_id = register_product(&server, 5, Some("80")).await;

    let response = create_order(&server, order_body("uid-2", "pickup", &[(product_id, 2)])).await;
    response.assert_status(StatusCode::CREATED);
    let order_id = response.json::<CreateOrderResponse>().order_id;

    let product = get_product(&server, product_id).await;
    assert_eq!(product.quantity, 3);
    assert_eq!(product.reserved, 0);

    let order = server
        .get(&format!("/users/uid-2/orders/{}", order_id))
        .await
        .json::<OrderResponse>();
    assert_eq!(order.shipping_status, "delivered");
    assert_eq!(order.total, Decimal::new(160, 0));
    assert_eq!(order.items[0].product_name, "木製トレイ");
}

#[tokio::test]
async fn test_insufficient_stock_rejects_whole_cart() {
    let server = test_server();
    let plenty = register_product(&server, 10, Some("100")).await;
    let scarce = register_product(&server, 1, Some("100")).await;

    let response = create_order(
        &server,
        order_body("uid-1", "shipping", &[(plenty, 2), (scarce, 4)]),
    )
    .await;
    response.assert_status(StatusCode::CONFLICT);
    let error = response.json::<ApiError>();
    assert_eq!(error.code, "INSUFFICIENT_STOCK");
    let details = error.details.unwrap();
    assert_eq!(details.product_id, scarce);
    assert_eq!(details.requested, 4);
    assert_eq!(details.available, 1);

    // 最初の商品も変化していない
    assert_eq!(get_product(&server, plenty).await.reserved, 0);
    let orders = server.get("/users/uid-1/orders").await.json::<Vec<OrderResponse>>();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_order_without_owner_is_rejected() {
    let server = test_server();
    let product_id = register_product(&server, 5, None).await;

    let mut body = order_body("uid-1", "shipping", &[(product_id, 1)]);
    body["created_by_uid"] = json!("   ");
    let response = create_order(&server, body).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ApiError>().code, "OWNERSHIP_REQUIRED");
    assert_eq!(get_product(&server, product_id).await.reserved, 0);
}

#[tokio::test]
async fn test_orders_are_scoped_to_owner() {
    let server = test_server();
    let product_id = register_product(&server, 10, None).await;

    let order_id = create_order(&server, order_body("uid-1", "shipping", &[(product_id, 1)]))
        .await
        .json::<CreateOrderResponse>()
        .order_id;

    let response = server
        .get(&format!("/users/uid-2/orders/{}", order_id))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .put(&format!("/users/uid-2/orders/{}/shipping", order_id))
        .json(&json!({"shipping_status": "delivered"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(get_product(&server, product_id).await.reserved, 1);
}

#[tokio::test]
async fn test_admin_order_listing_filters() {
    let server = test_server();
    let product_id = register_product(&server, 20, Some("10")).await;

    create_order(&server, order_body("uid-1", "shipping", &[(product_id, 1)]))
        .await
        .assert_status(StatusCode::CREATED);
    let mut staff_body = order_body("staff-1", "pickup", &[(product_id, 1)]);
    staff_body["created_source"] = json!("staff");
    staff_body["received_by"] = json!("受取人");
    create_order(&server, staff_body)
        .await
        .assert_status(StatusCode::CREATED);

    let all = server.get("/orders").await.json::<Vec<OrderResponse>>();
    assert_eq!(all.len(), 2);

    let staff = server
        .get("/orders")
        .add_query_param("source", "staff")
        .await
        .json::<Vec<OrderResponse>>();
    assert_eq!(staff.len(), 1);
    assert_eq!(staff[0].received_by.as_deref(), Some("受取人"));

    let pending = server
        .get("/orders")
        .add_query_param("status", "pending")
        .await
        .json::<Vec<OrderResponse>>();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].owner_uid, "uid-1");

    let response = server.get("/orders").add_query_param("status", "lost").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ApiError>().code, "INVALID_PARAMETER");
}

#[tokio::test]
async fn test_quantity_adjustment_and_low_stock() {
    let server = test_server();
    let product_id = register_product(&server, 10, Some("40")).await;
    let url = format!("/products/{}/quantity", product_id);

    let response = server
        .post(&url)
        .json(&json!({"delta": 9, "direction": "decrease"}))
        .await;
    response.assert_status_ok();
    let product = response.json::<ProductResponse>();
    assert_eq!(product.quantity, 1);
    assert!(product.low_stock);

    let low = server
        .get("/products/low-stock")
        .await
        .json::<Vec<ProductResponse>>();
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].id, product_id);

    let response = server
        .post(&url)
        .json(&json!({"delta": 5, "direction": "increase"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<ProductResponse>().quantity, 6);

    let response = server
        .post(&url)
        .json(&json!({"delta": 0, "direction": "increase"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<ApiError>().code, "INVALID_QUANTITY");

    let ledger = server
        .get(&format!("/products/{}/ledger", product_id))
        .await
        .json::<LedgerResponse>();
    assert_eq!(ledger.summary.in_quantity, 15);
    assert_eq!(ledger.summary.out_quantity, 9);
}

#[tokio::test]
async fn test_update_details_keeps_quantities() {
    let server = test_server();
    let product_id = register_product(&server, 8, Some("30")).await;

    let response = server
        .put(&format!("/products/{}", product_id))
        .json(&json!({
            "name": "木製トレイ（大）",
            "cost_price": "35",
            "purchase_date": "2024-04-01T00:00:00Z",
        }))
        .await;
    response.assert_status_ok();
    let product = response.json::<ProductResponse>();
    assert_eq!(product.name, "木製トレイ（大）");
    assert_eq!(product.cost_price, Some(Decimal::new(35, 0)));
    assert_eq!(product.quantity, 8);
    assert_eq!(product.initial_quantity, 8);

    let response = server
        .put(&format!("/products/{}", Uuid::new_v4()))
        .json(&json!({"name": "x", "purchase_date": "2024-04-01T00:00:00Z"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleted_product_keeps_ledger_and_orders() {
    let server = test_server();
    let product_id = register_product(&server, 6, Some("15")).await;
    let order_id = create_order(&server, order_body("uid-1", "shipping", &[(product_id, 2)]))
        .await
        .json::<CreateOrderResponse>()
        .order_id;

    server
        .delete(&format!("/products/{}", product_id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/products/{}", product_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // 削除済み商品を含む注文も配送完了にできる
    let response = server
        .put(&format!("/users/uid-1/orders/{}/shipping", order_id))
        .json(&json!({"shipping_status": "delivered"}))
        .await;
    response.assert_status_ok();

    let ledger = server
        .get(&format!("/products/{}/ledger", product_id))
        .await
        .json::<LedgerResponse>();
    assert_eq!(ledger.entries.len(), 1);
    assert_eq!(ledger.summary.in_quantity, 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_orders_never_oversell() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(StockEngine::new(
        store.clone(),
        RetryPolicy::immediate(50).unwrap(),
        Arc::new(ConsoleLogger::with_min_level(LogLevel::Error)),
    ));
    let products = ProductApplicationService::new(engine.clone(), store.clone());
    let orders = Arc::new(OrderApplicationService::new(engine));

    let details = ProductDetails {
        name: "木製トレイ".to_string(),
        description: String::new(),
        cost_price: None,
        image_ref: None,
        purchase_location: String::new(),
        purchase_date: Utc::now(),
    };
    let product_id = products.register_product(details, 5).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..12 {
        let orders = orders.clone();
        handles.push(tokio::spawn(async move {
            let draft = OrderDraft {
                lines: vec![OrderLineRequest {
                    product_id,
                    quantity: 1,
                }],
                contact: OrderContact::default(),
                withdraw_date: Utc::now(),
                delivery_method: DeliveryMethod::Shipping,
                shipping_carrier: None,
                tracking_number: None,
                created_by_uid: Some(UserId::new(format!("uid-{}", i)).unwrap()),
                created_by_email: None,
                created_source: CreatedSource::Customer,
            };
            orders.create_order(draft).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(err.is_insufficient_stock()),
        }
    }

    let product = store
        .load_products(&[product_id])
        .await
        .unwrap()
        .remove(&product_id)
        .unwrap();
    assert_eq!(created, 5);
    assert_eq!(product.reserved(), 5);
    assert_eq!(product.quantity(), 5);
}

#[tokio::test]
async fn test_user_registration_and_roles() {
    let server = test_server();

    let response = server
        .post("/users")
        .json(&json!({"uid": "uid-9", "email": "z@example.com", "display_name": "鈴木"}))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<UserResponse>().role, "customer");

    server
        .put("/users/uid-9/role")
        .json(&json!({"role": "staff"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    // 再登録しても役割は維持される
    let user = server
        .post("/users")
        .json(&json!({"uid": "uid-9", "email": "new@example.com"}))
        .await
        .json::<UserResponse>();
    assert_eq!(user.role, "staff");
    assert_eq!(user.email, "new@example.com");

    let users = server.get("/users").await.json::<Vec<UserResponse>>();
    assert_eq!(users.len(), 1);

    let response = server
        .put("/users/ghost/role")
        .json(&json!({"role": "admin"}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server
        .put("/users/uid-9/role")
        .json(&json!({"role": "owner"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_delivery_updates_finalize_once() {
    let store = Arc::new(InMemoryStore::new());
    let engine = Arc::new(StockEngine::new(
        store.clone(),
        RetryPolicy::immediate(50).unwrap(),
        Arc::new(ConsoleLogger::with_min_level(LogLevel::Error)),
    ));
    let products = ProductApplicationService::new(engine.clone(), store.clone());
    let orders = Arc::new(OrderApplicationService::new(engine));

    let details = ProductDetails {
        name: "木製トレイ".to_string(),
        description: String::new(),
        cost_price: None,
        image_ref: None,
        purchase_location: String::new(),
        purchase_date: Utc::now(),
    };
    let product_id = products.register_product(details, 10).await.unwrap();
    let owner = UserId::new("uid-1").unwrap();
    let order_id = orders
        .create_order(OrderDraft {
            lines: vec![OrderLineRequest {
                product_id,
                quantity: 4,
            }],
            contact: OrderContact::default(),
            withdraw_date: Utc::now(),
            delivery_method: DeliveryMethod::Shipping,
            shipping_carrier: None,
            tracking_number: None,
            created_by_uid: Some(owner.clone()),
            created_by_email: None,
            created_source: CreatedSource::Customer,
        })
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orders = orders.clone();
        let owner = owner.clone();
        handles.push(tokio::spawn(async move {
            let update = ShippingUpdate {
                shipping_status: Some(ShippingStatus::Delivered),
                ..ShippingUpdate::default()
            };
            orders.update_shipping(order_id, Some(owner), update).await
        }));
    }
    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        assert_eq!(order.shipping_status(), ShippingStatus::Delivered);
    }

    let product = store
        .load_products(&[product_id])
        .await
        .unwrap()
        .remove(&product_id)
        .unwrap();
    assert_eq!(product.quantity(), 6);
    assert_eq!(product.reserved(), 0);

    let outs = store
        .find_by_product(product_id)
        .await
        .unwrap()
        .into_iter()
        .filter(|entry| entry.entry_type() == EntryType::Out)
        .count();
    assert_eq!(outs, 1);
}
