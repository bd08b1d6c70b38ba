use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;
use stock_fulfillment::adapter::driven::{ConsoleLogger, InMemoryStore};
use stock_fulfillment::domain::model::{
    AdjustDirection, CreatedSource, DeliveryMethod, Money, Order, OrderContact, OrderDraft,
    OrderId, OrderItem, OrderLineRequest, Product, ProductDetails, ProductId, ShippingStatus,
    ShippingUpdate, UserId,
};
use stock_fulfillment::domain::port::{LedgerRepository, LogLevel, StockStore};
use stock_fulfillment::domain::retry::RetryPolicy;
use stock_fulfillment::domain::service::StockEngine;

fn details(cost: Option<i64>) -> ProductDetails {
    ProductDetails {
        name: "マグカップ".to_string(),
        description: String::new(),
        cost_price: cost.map(|c| Money::new(Decimal::new(c, 0)).unwrap()),
        image_ref: None,
        purchase_location: String::new(),
        purchase_date: Utc::now(),
    }
}

/// 商品に対する在庫操作
#[derive(Debug, Clone)]
enum StockOp {
    Restock(u32),
    AdjustDown(u32),
    Reserve(u32),
    Withdraw(u32),
    Fulfill(u32),
}

fn stock_op() -> impl Strategy<Value = StockOp> {
    prop_oneof![
        (1u32..50).prop_map(StockOp::Restock),
        (1u32..50).prop_map(StockOp::AdjustDown),
        (1u32..50).prop_map(StockOp::Reserve),
        (1u32..50).prop_map(StockOp::Withdraw),
        (1u32..50).prop_map(StockOp::Fulfill),
    ]
}

fn draft(owner: &str, lines: Vec<OrderLineRequest>, method: DeliveryMethod) -> OrderDraft {
    OrderDraft {
        lines,
        contact: OrderContact::default(),
        withdraw_date: Utc::now(),
        delivery_method: method,
        shipping_carrier: None,
        tracking_number: None,
        created_by_uid: Some(UserId::new(owner).unwrap()),
        created_by_email: None,
        created_source: CreatedSource::Customer,
    }
}

// 商品の不変条件のプロパティベーステスト
proptest! {
    /// どの操作の組み合わせでも 0 <= 予約数 <= 在庫数 が保たれる
    /// 失敗した操作は商品を変更しない
    #[test]
    fn test_reserved_never_exceeds_quantity(
        initial in 0u32..100,
        ops in prop::collection::vec(stock_op(), 0..40),
    ) {
        let mut product = Product::register(ProductId::new(), details(Some(100)), initial, Utc::now()).unwrap();

        for op in ops {
            let before = product.clone();
            let result = match op {
                StockOp::Restock(n) => product.restock(n, Utc::now()).map(|_| ()),
                StockOp::AdjustDown(n) => product.adjust_down(n, Utc::now()).map(|_| ()),
                StockOp::Reserve(n) => product.reserve(n, Utc::now()),
                StockOp::Withdraw(n) => product.withdraw(n, Utc::now()),
                StockOp::Fulfill(n) => {
                    product.fulfill_reservation(n, Utc::now());
                    Ok(())
                }
            };
            if result.is_err() {
                prop_assert_eq!(product.quantity(), before.quantity());
                prop_assert_eq!(product.reserved(), before.reserved());
            }
            prop_assert!(product.reserved() <= product.quantity());
            prop_assert_eq!(product.available(), product.quantity() - product.reserved());
            prop_assert_eq!(product.initial_quantity(), initial);
        }
    }

    /// 在庫僅少は「利用可能数 / 基準数量 < 0.2」と一致し、基準数量0では常にfalse
    #[test]
    fn test_low_stock_matches_ratio(
        initial in 0u32..500,
        reserve_ratio in 0.0f64..=1.0,
    ) {
        let mut product = Product::register(ProductId::new(), details(None), initial, Utc::now()).unwrap();
        let to_reserve = ((initial as f64) * reserve_ratio).floor() as u32;
        if to_reserve > 0 {
            product.reserve(to_reserve, Utc::now()).unwrap();
        }

        let expected = initial > 0 && u64::from(product.available()) * 5 < u64::from(initial);
        prop_assert_eq!(product.is_low_stock(), expected);
    }

    /// 注文合計は明細の小計の合計と一致する
    #[test]
    fn test_order_total_is_sum_of_subtotals(
        lines in prop::collection::vec((0i64..100_000, 1u32..20), 1..10),
    ) {
        let items: Vec<OrderItem> = lines
            .iter()
            .map(|(price, quantity)| {
                OrderItem::new(
                    ProductId::new(),
                    "マグカップ".to_string(),
                    Money::new(Decimal::new(*price, 2)).unwrap(),
                    *quantity,
                )
                .unwrap()
            })
            .collect();
        let expected: Decimal = lines
            .iter()
            .map(|(price, quantity)| Decimal::new(*price, 2) * Decimal::from(*quantity))
            .sum();

        let order = Order::create(
            OrderId::new(),
            UserId::new("uid-1").unwrap(),
            items,
            &draft("uid-1", Vec::new(), DeliveryMethod::Shipping),
            Utc::now(),
        )
        .unwrap();

        prop_assert_eq!(order.total().amount(), expected);
        for item in order.items() {
            prop_assert_eq!(item.subtotal(), item.unit_price().multiply(item.quantity()).unwrap());
        }
    }
}

/// エンジン経由の操作
#[derive(Debug, Clone)]
enum EngineOp {
    Adjust(u32, AdjustDirection),
    Pickup(u32),
    Ship(u32),
    Deliver,
}

fn engine_op() -> impl Strategy<Value = EngineOp> {
    prop_oneof![
        (1u32..30).prop_map(|n| EngineOp::Adjust(n, AdjustDirection::Increase)),
        (1u32..30).prop_map(|n| EngineOp::Adjust(n, AdjustDirection::Decrease)),
        (1u32..30).prop_map(EngineOp::Pickup),
        (1u32..30).prop_map(EngineOp::Ship),
        Just(EngineOp::Deliver),
    ]
}

// 台帳のプロパティベーステスト
proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// 仕入単価のある商品では「入庫合計 - 出庫合計 = 現在の在庫数」が常に成り立つ
    #[test]
    fn test_ledger_accounts_for_every_quantity_change(
        initial in 1u32..100,
        ops in prop::collection::vec(engine_op(), 0..20),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let store = Arc::new(InMemoryStore::new());
            let engine = StockEngine::new(
                store.clone(),
                RetryPolicy::immediate(3).unwrap(),
                Arc::new(ConsoleLogger::with_min_level(LogLevel::Error)),
            );
            let product_id = engine.register_product(details(Some(250)), initial).await.unwrap();
            let owner = UserId::new("uid-1").unwrap();
            let mut pending_orders = Vec::new();

            for op in ops {
                // 業務エラー（在庫不足など）は無視して次の操作へ
                match op {
                    EngineOp::Adjust(n, direction) => {
                        let _ = engine.adjust_quantity(product_id, n, direction).await;
                    }
                    EngineOp::Pickup(n) => {
                        let lines = vec![OrderLineRequest { product_id, quantity: n }];
                        let _ = engine.create_order(draft("uid-1", lines, DeliveryMethod::Pickup)).await;
                    }
                    EngineOp::Ship(n) => {
                        let lines = vec![OrderLineRequest { product_id, quantity: n }];
                        if let Ok(order_id) = engine.create_order(draft("uid-1", lines, DeliveryMethod::Shipping)).await {
                            pending_orders.push(order_id);
                        }
                    }
                    EngineOp::Deliver => {
                        if let Some(order_id) = pending_orders.pop() {
                            let update = ShippingUpdate {
                                shipping_status: Some(ShippingStatus::Delivered),
                                ..ShippingUpdate::default()
                            };
                            engine.update_shipping(order_id, Some(owner.clone()), update).await.unwrap();
                        }
                    }
                }
            }

            let product = store.load_products(&[product_id]).await.unwrap().remove(&product_id).unwrap();
            let entries = store.find_by_product(product_id).await.unwrap();
            let in_total: u64 = entries
                .iter()
                .filter(|e| e.entry_type().as_str() == "in")
                .map(|e| u64::from(e.quantity()))
                .sum();
            let out_total: u64 = entries
                .iter()
                .filter(|e| e.entry_type().as_str() == "out")
                .map(|e| u64::from(e.quantity()))
                .sum();

            assert_eq!(in_total - out_total, u64::from(product.quantity()));
            assert!(product.reserved() <= product.quantity());
        });
    }
}
