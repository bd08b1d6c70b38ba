use crate::domain::error::DomainError;
use crate::domain::model::{Money, MovementSource, OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;

/// 受け渡し方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    /// 配送（出荷完了まで在庫を予約する）
    Shipping,
    /// 店頭受け取り（作成時に即時払い出し）
    Pickup,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Shipping => "shipping",
            DeliveryMethod::Pickup => "pickup",
        }
    }

    /// 文字列からDeliveryMethodを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "shipping" => Ok(DeliveryMethod::Shipping),
            "pickup" => Ok(DeliveryMethod::Pickup),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な受け渡し方法: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 配送ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingStatus {
    /// 処理待ち
    Pending,
    /// 配送中
    Shipping,
    /// 配送完了（終端）
    Delivered,
}

impl ShippingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "pending",
            ShippingStatus::Shipping => "shipping",
            ShippingStatus::Delivered => "delivered",
        }
    }

    /// 文字列からShippingStatusを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(ShippingStatus::Pending),
            "shipping" => Ok(ShippingStatus::Shipping),
            "delivered" => Ok(ShippingStatus::Delivered),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な配送ステータス: {}",
                s
            ))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShippingStatus::Delivered)
    }
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 注文の作成元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatedSource {
    Customer,
    Staff,
}

impl CreatedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreatedSource::Customer => "customer",
            CreatedSource::Staff => "staff",
        }
    }

    /// 文字列からCreatedSourceを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "customer" => Ok(CreatedSource::Customer),
            "staff" => Ok(CreatedSource::Staff),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な注文作成元: {}",
                s
            ))),
        }
    }

    /// 店頭受け取り時の台帳の発生元
    pub fn pickup_source(&self) -> MovementSource {
        match self {
            CreatedSource::Customer => MovementSource::OrderCustomerPickup,
            CreatedSource::Staff => MovementSource::OrderStaffPickup,
        }
    }

    /// 配送完了時の台帳の発生元
    pub fn ship_success_source(&self) -> MovementSource {
        match self {
            CreatedSource::Customer => MovementSource::OrderCustomerShipSuccess,
            CreatedSource::Staff => MovementSource::OrderStaffShipSuccess,
        }
    }
}

impl fmt::Display for CreatedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 注文明細
/// 商品名と単価は注文時点のスナップショットで、後の商品編集の影響を受けない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    product_id: ProductId,
    product_name: String,
    unit_price: Money,
    quantity: u32,
    subtotal: Money,
}

impl OrderItem {
    /// 新しい注文明細を作成
    /// 数量は1以上である必要がある
    pub fn new(
        product_id: ProductId,
        product_name: String,
        unit_price: Money,
        quantity: u32,
    ) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity);
        }
        Ok(Self {
            product_id,
            product_name,
            unit_price,
            quantity,
            subtotal: unit_price.multiply(quantity)?,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }
}

/// 注文の依頼者・受取人情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderContact {
    pub requested_by: Option<String>,
    pub requested_address: String,
    /// スタッフ発行の受け取りで使う
    pub received_by: Option<String>,
    pub received_address: String,
}

/// カートの1行（商品IDと数量のみ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// 注文作成の入力
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub lines: Vec<OrderLineRequest>,
    pub contact: OrderContact,
    pub withdraw_date: DateTime<Utc>,
    pub delivery_method: DeliveryMethod,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub created_by_uid: Option<UserId>,
    pub created_by_email: Option<String>,
    pub created_source: CreatedSource,
}

impl OrderDraft {
    /// 全行の数量が1以上であることを確認
    pub fn validate_quantities(&self) -> Result<(), DomainError> {
        if self.lines.is_empty() {
            return Err(DomainError::InvalidValue(
                "注文明細が空です".to_string(),
            ));
        }
        if self.lines.iter().any(|line| line.quantity == 0) {
            return Err(DomainError::InvalidQuantity);
        }
        Ok(())
    }

    /// 商品ごとの合計要求数量（最初に現れた順）
    /// 同じ商品が複数行にあっても利用可能数を一度に判定するため
    pub fn requested_per_product(&self) -> Result<Vec<(ProductId, u32)>, DomainError> {
        let mut totals: Vec<(ProductId, u32)> = Vec::new();
        for line in &self.lines {
            match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, total)) => {
                    *total = total
                        .checked_add(line.quantity)
                        .ok_or(DomainError::InvalidQuantity)?;
                }
                None => totals.push((line.product_id, line.quantity)),
            }
        }
        Ok(totals)
    }
}

/// 配送情報の更新内容
/// Noneの項目は変更しない
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingUpdate {
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_status: Option<ShippingStatus>,
}

/// 配送情報更新の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingTransition {
    /// メタデータのみの更新（在庫への影響なし）
    MetadataOnly,
    /// 初めて配送完了になった（予約を確定的な在庫減に変換する）
    Fulfilled,
}

/// 永続化層から注文を再構築するための全項目
#[derive(Debug, Clone)]
pub struct OrderParts {
    pub id: OrderId,
    pub owner: UserId,
    pub items: Vec<OrderItem>,
    pub contact: OrderContact,
    pub withdraw_date: DateTime<Utc>,
    pub delivery_method: DeliveryMethod,
    pub shipping_status: ShippingStatus,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub created_by_email: Option<String>,
    pub created_source: CreatedSource,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// 注文集約
/// 作成後に変更されるのは配送情報のみ。作成したユーザーの名前空間に属する
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: OrderId,
    owner: UserId,
    items: Vec<OrderItem>,
    contact: OrderContact,
    withdraw_date: DateTime<Utc>,
    total: Money,
    delivery_method: DeliveryMethod,
    shipping_status: ShippingStatus,
    shipping_carrier: Option<String>,
    tracking_number: Option<String>,
    created_by_email: Option<String>,
    created_source: CreatedSource,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Order {
    /// 新しい注文を作成
    /// 店頭受け取りは作成時点で配送完了、配送は処理待ちから始まる
    pub fn create(
        id: OrderId,
        owner: UserId,
        items: Vec<OrderItem>,
        draft: &OrderDraft,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::InvalidValue(
                "注文明細が空です".to_string(),
            ));
        }

        let shipping_status = match draft.delivery_method {
            DeliveryMethod::Pickup => ShippingStatus::Delivered,
            DeliveryMethod::Shipping => ShippingStatus::Pending,
        };

        Ok(Self {
            id,
            owner,
            total: Self::sum_subtotals(&items)?,
            items,
            contact: draft.contact.clone(),
            withdraw_date: draft.withdraw_date,
            delivery_method: draft.delivery_method,
            shipping_status,
            shipping_carrier: draft.shipping_carrier.clone(),
            tracking_number: draft.tracking_number.clone(),
            created_by_email: draft.created_by_email.clone(),
            created_source: draft.created_source,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// 永続化されたデータから注文を再構築
    /// 合計金額は明細から再計算する
    pub fn reconstruct(parts: OrderParts) -> Result<Self, DomainError> {
        Ok(Self {
            id: parts.id,
            owner: parts.owner,
            total: Self::sum_subtotals(&parts.items)?,
            items: parts.items,
            contact: parts.contact,
            withdraw_date: parts.withdraw_date,
            delivery_method: parts.delivery_method,
            shipping_status: parts.shipping_status,
            shipping_carrier: parts.shipping_carrier,
            tracking_number: parts.tracking_number,
            created_by_email: parts.created_by_email,
            created_source: parts.created_source,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        })
    }

    fn sum_subtotals(items: &[OrderItem]) -> Result<Money, DomainError> {
        items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.add(&item.subtotal()))
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    /// 注文を作成したユーザー
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn contact(&self) -> &OrderContact {
        &self.contact
    }

    pub fn withdraw_date(&self) -> DateTime<Utc> {
        self.withdraw_date
    }

    /// 明細小計の合計
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn delivery_method(&self) -> DeliveryMethod {
        self.delivery_method
    }

    pub fn shipping_status(&self) -> ShippingStatus {
        self.shipping_status
    }

    pub fn shipping_carrier(&self) -> Option<&str> {
        self.shipping_carrier.as_deref()
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    pub fn created_by_email(&self) -> Option<&str> {
        self.created_by_email.as_deref()
    }

    pub fn created_source(&self) -> CreatedSource {
        self.created_source
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 楽観的ロック用のバージョン
    pub fn version(&self) -> u64 {
        self.version
    }

    /// 商品ごとの合計数量（最初に現れた順）
    pub fn quantities_per_product(&self) -> Vec<(ProductId, u32)> {
        let mut totals: Vec<(ProductId, u32)> = Vec::new();
        for item in &self.items {
            match totals.iter_mut().find(|(id, _)| *id == item.product_id()) {
                Some((_, total)) => *total = total.saturating_add(item.quantity()),
                None => totals.push((item.product_id(), item.quantity())),
            }
        }
        totals
    }

    /// 配送情報を更新する
    ///
    /// 配送完了は終端状態で、一度到達したら別のステータスには戻らない。
    /// 初めて配送完了へ遷移したときだけ `Fulfilled` を返すので、
    /// 同じ更新を繰り返しても在庫が二重に減ることはない。
    pub fn apply_shipping_update(
        &mut self,
        update: &ShippingUpdate,
        now: DateTime<Utc>,
    ) -> ShippingTransition {
        if let Some(carrier) = &update.shipping_carrier {
            self.shipping_carrier = Some(carrier.clone());
        }
        if let Some(tracking_number) = &update.tracking_number {
            self.tracking_number = Some(tracking_number.clone());
        }
        self.updated_at = now;

        let was_terminal = self.shipping_status.is_terminal();
        match update.shipping_status {
            Some(status) if !was_terminal => {
                self.shipping_status = status;
                if status.is_terminal() {
                    ShippingTransition::Fulfilled
                } else {
                    ShippingTransition::MetadataOnly
                }
            }
            _ => ShippingTransition::MetadataOnly,
        }
    }

    /// コミット後のバージョンを反映したコピーを返す
    pub(crate) fn committed(mut self) -> Self {
        self.version += 1;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::MONEY_MAX;
    use rust_decimal::Decimal;

    fn price(yen: i64) -> Money {
        Money::new(Decimal::new(yen, 0)).unwrap()
    }

    fn draft(method: DeliveryMethod, lines: Vec<OrderLineRequest>) -> OrderDraft {
        OrderDraft {
            lines,
            contact: OrderContact {
                requested_by: Some("山田 太郎".to_string()),
                requested_address: "東京都渋谷区道玄坂1-1-1".to_string(),
                ..OrderContact::default()
            },
            withdraw_date: Utc::now(),
            delivery_method: method,
            shipping_carrier: None,
            tracking_number: None,
            created_by_uid: Some(UserId::new("customer-1").unwrap()),
            created_by_email: Some("customer@example.com".to_string()),
            created_source: CreatedSource::Customer,
        }
    }

    fn order(method: DeliveryMethod) -> Order {
        let product_id = ProductId::new();
        let items = vec![
            OrderItem::new(product_id, "ボールペン".to_string(), price(120), 3).unwrap(),
            OrderItem::new(ProductId::new(), "ノート".to_string(), price(200), 2).unwrap(),
        ];
        let draft = draft(
            method,
            vec![OrderLineRequest {
                product_id,
                quantity: 3,
            }],
        );
        Order::create(
            OrderId::new(),
            UserId::new("customer-1").unwrap(),
            items,
            &draft,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn test_order_item_subtotal() {
        let item = OrderItem::new(ProductId::new(), "ボールペン".to_string(), price(120), 3).unwrap();
        assert_eq!(item.subtotal(), price(360));
    }

    #[test]
    fn test_order_item_zero_quantity_fails() {
        let result = OrderItem::new(ProductId::new(), "ボールペン".to_string(), price(120), 0);
        assert_eq!(result.unwrap_err(), DomainError::InvalidQuantity);
    }

    #[test]
    fn test_order_total_with_largest_price_does_not_overflow() {
        let top = Money::new(MONEY_MAX).unwrap();
        let items = vec![
            OrderItem::new(ProductId::new(), "高額品".to_string(), top, u32::MAX).unwrap(),
            OrderItem::new(ProductId::new(), "高額品".to_string(), top, u32::MAX).unwrap(),
        ];
        let draft = draft(DeliveryMethod::Shipping, Vec::new());
        let order = Order::create(
            OrderId::new(),
            UserId::new("customer-1").unwrap(),
            items,
            &draft,
            Utc::now(),
        )
        .unwrap();

        let expected = MONEY_MAX * Decimal::from(u32::MAX) * Decimal::from(2u32);
        assert_eq!(order.total().amount(), expected);
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let order = order(DeliveryMethod::Shipping);
        assert_eq!(order.total(), price(760));
    }

    #[test]
    fn test_shipping_order_starts_pending() {
        let order = order(DeliveryMethod::Shipping);
        assert_eq!(order.shipping_status(), ShippingStatus::Pending);
    }

    #[test]
    fn test_pickup_order_starts_delivered() {
        let order = order(DeliveryMethod::Pickup);
        assert_eq!(order.shipping_status(), ShippingStatus::Delivered);
    }

    #[test]
    fn test_draft_rejects_zero_quantity() {
        let draft = draft(
            DeliveryMethod::Shipping,
            vec![
                OrderLineRequest {
                    product_id: ProductId::new(),
                    quantity: 1,
                },
                OrderLineRequest {
                    product_id: ProductId::new(),
                    quantity: 0,
                },
            ],
        );
        assert_eq!(
            draft.validate_quantities().unwrap_err(),
            DomainError::InvalidQuantity
        );
    }

    #[test]
    fn test_draft_rejects_empty_cart() {
        let draft = draft(DeliveryMethod::Shipping, vec![]);
        assert!(draft.validate_quantities().is_err());
    }

    #[test]
    fn test_requested_per_product_merges_duplicates() {
        let a = ProductId::new();
        let b = ProductId::new();
        let draft = draft(
            DeliveryMethod::Shipping,
            vec![
                OrderLineRequest { product_id: a, quantity: 2 },
                OrderLineRequest { product_id: b, quantity: 1 },
                OrderLineRequest { product_id: a, quantity: 3 },
            ],
        );
        assert_eq!(draft.requested_per_product().unwrap(), vec![(a, 5), (b, 1)]);
    }

    #[test]
    fn test_update_to_delivered_is_fulfilled_once() {
        let mut order = order(DeliveryMethod::Shipping);
        let update = ShippingUpdate {
            shipping_carrier: Some("ヤマト運輸".to_string()),
            tracking_number: Some("1234-5678".to_string()),
            shipping_status: Some(ShippingStatus::Delivered),
        };

        assert_eq!(
            order.apply_shipping_update(&update, Utc::now()),
            ShippingTransition::Fulfilled
        );
        assert_eq!(order.shipping_status(), ShippingStatus::Delivered);
        assert_eq!(order.shipping_carrier(), Some("ヤマト運輸"));

        assert_eq!(
            order.apply_shipping_update(&update, Utc::now()),
            ShippingTransition::MetadataOnly
        );
    }

    #[test]
    fn test_non_terminal_update_is_metadata_only() {
        let mut order = order(DeliveryMethod::Shipping);
        let update = ShippingUpdate {
            shipping_status: Some(ShippingStatus::Shipping),
            ..ShippingUpdate::default()
        };
        assert_eq!(
            order.apply_shipping_update(&update, Utc::now()),
            ShippingTransition::MetadataOnly
        );
        assert_eq!(order.shipping_status(), ShippingStatus::Shipping);
    }

    #[test]
    fn test_delivered_status_is_sticky() {
        let mut order = order(DeliveryMethod::Pickup);
        let update = ShippingUpdate {
            tracking_number: Some("TRK-1".to_string()),
            shipping_status: Some(ShippingStatus::Pending),
            ..ShippingUpdate::default()
        };
        assert_eq!(
            order.apply_shipping_update(&update, Utc::now()),
            ShippingTransition::MetadataOnly
        );
        assert_eq!(order.shipping_status(), ShippingStatus::Delivered);
        assert_eq!(order.tracking_number(), Some("TRK-1"));
    }

    #[test]
    fn test_quantities_per_product() {
        let product_id = ProductId::new();
        let items = vec![
            OrderItem::new(product_id, "ボールペン".to_string(), price(120), 3).unwrap(),
            OrderItem::new(product_id, "ボールペン".to_string(), price(120), 4).unwrap(),
        ];
        let draft = draft(DeliveryMethod::Shipping, vec![]);
        let order = Order::create(
            OrderId::new(),
            UserId::new("customer-1").unwrap(),
            items,
            &draft,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(order.quantities_per_product(), vec![(product_id, 7)]);
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(
            ShippingStatus::from_string("delivered").unwrap(),
            ShippingStatus::Delivered
        );
        assert!(ShippingStatus::from_string("Delivered").is_err());
        assert_eq!(
            DeliveryMethod::from_string("pickup").unwrap(),
            DeliveryMethod::Pickup
        );
        assert_eq!(
            CreatedSource::from_string("staff").unwrap().pickup_source(),
            MovementSource::OrderStaffPickup
        );
    }
}
