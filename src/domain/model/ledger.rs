use crate::domain::error::DomainError;
use crate::domain::model::{Money, OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// 入出庫の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    In,
    Out,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::In => "in",
            EntryType::Out => "out",
        }
    }

    /// 文字列からEntryTypeを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "in" => Ok(EntryType::In),
            "out" => Ok(EntryType::Out),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な入出庫種別: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 在庫移動の発生元
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementSource {
    /// 商品登録時の初回入庫
    AdminAdd,
    /// 管理者による入庫
    AdminAdjustInc,
    /// 管理者による手動減算
    AdminAdjustDec,
    /// 顧客注文の店頭受け取り
    OrderCustomerPickup,
    /// スタッフ発行の店頭受け取り
    OrderStaffPickup,
    /// 顧客注文の配送完了
    OrderCustomerShipSuccess,
    /// スタッフ発行注文の配送完了
    OrderStaffShipSuccess,
}

impl MovementSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementSource::AdminAdd => "admin_add",
            MovementSource::AdminAdjustInc => "admin_adjust_inc",
            MovementSource::AdminAdjustDec => "admin_adjust_dec",
            MovementSource::OrderCustomerPickup => "order_customer_pickup",
            MovementSource::OrderStaffPickup => "order_staff_pickup",
            MovementSource::OrderCustomerShipSuccess => "order_customer_ship_success",
            MovementSource::OrderStaffShipSuccess => "order_staff_ship_success",
        }
    }

    /// 文字列からMovementSourceを作成
    pub fn from_string(s: &str) -> Result<Self, DomainError> {
        match s {
            "admin_add" => Ok(MovementSource::AdminAdd),
            "admin_adjust_inc" => Ok(MovementSource::AdminAdjustInc),
            "admin_adjust_dec" => Ok(MovementSource::AdminAdjustDec),
            "order_customer_pickup" => Ok(MovementSource::OrderCustomerPickup),
            "order_staff_pickup" => Ok(MovementSource::OrderStaffPickup),
            "order_customer_ship_success" => Ok(MovementSource::OrderCustomerShipSuccess),
            "order_staff_ship_success" => Ok(MovementSource::OrderStaffShipSuccess),
            _ => Err(DomainError::InvalidValue(format!(
                "無効な在庫移動元: {}",
                s
            ))),
        }
    }
}

impl fmt::Display for MovementSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 在庫台帳の1行
/// 書き込み後は変更も削除もされない
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: Uuid,
    product_id: ProductId,
    date: DateTime<Utc>,
    quantity: u32,
    entry_type: EntryType,
    cost_price: Option<Money>,
    source: MovementSource,
    order_id: Option<OrderId>,
    actor_uid: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// 入庫の台帳行を作成
    pub fn stock_in(
        product_id: ProductId,
        quantity: u32,
        cost_price: Option<Money>,
        source: MovementSource,
        date: DateTime<Utc>,
    ) -> Self {
        Self::new(product_id, EntryType::In, quantity, cost_price, source, date)
    }

    /// 出庫の台帳行を作成
    pub fn stock_out(
        product_id: ProductId,
        quantity: u32,
        cost_price: Option<Money>,
        source: MovementSource,
        date: DateTime<Utc>,
    ) -> Self {
        Self::new(product_id, EntryType::Out, quantity, cost_price, source, date)
    }

    fn new(
        product_id: ProductId,
        entry_type: EntryType,
        quantity: u32,
        cost_price: Option<Money>,
        source: MovementSource,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            date,
            quantity,
            entry_type,
            cost_price,
            source,
            order_id: None,
            actor_uid: None,
            created_at: Utc::now(),
        }
    }

    /// 注文への参照と操作者を設定
    pub fn for_order(mut self, order_id: OrderId, actor_uid: UserId) -> Self {
        self.order_id = Some(order_id);
        self.actor_uid = Some(actor_uid);
        self
    }

    /// 永続化されたデータから台帳行を再構築
    #[allow(clippy::too_many_arguments)]
    pub fn reconstruct(
        id: Uuid,
        product_id: ProductId,
        date: DateTime<Utc>,
        quantity: u32,
        entry_type: EntryType,
        cost_price: Option<Money>,
        source: MovementSource,
        order_id: Option<OrderId>,
        actor_uid: Option<UserId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            product_id,
            date,
            quantity,
            entry_type,
            cost_price,
            source,
            order_id,
            actor_uid,
            created_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    pub fn cost_price(&self) -> Option<Money> {
        self.cost_price
    }

    pub fn source(&self) -> MovementSource {
        self.source
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn actor_uid(&self) -> Option<&UserId> {
        self.actor_uid.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 単価 × 数量。原価が無い行はNone
    pub fn value(&self) -> Result<Option<Money>, DomainError> {
        self.cost_price
            .map(|price| price.multiply(self.quantity))
            .transpose()
    }
}

/// 商品ごとの在庫台帳（追記専用）
#[derive(Debug, Clone, Default)]
pub struct ProductLedger {
    entries: Vec<LedgerEntry>,
}

impl ProductLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 台帳行を追記する
    pub fn append(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 日付の降順で台帳行を返す
    /// 同じ日付の行は後から書いたものを先にする
    pub fn entries_newest_first(&self) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self.entries.iter().rev().cloned().collect();
        entries.sort_by(|a, b| b.date().cmp(&a.date()));
        entries
    }
}

/// 台帳の入出庫集計
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub in_quantity: u64,
    pub out_quantity: u64,
    /// 入庫金額の合計（原価なしの行は除外）
    pub in_value: Money,
    /// 出庫金額の合計（原価なしの行は除外）
    pub out_value: Money,
}

impl LedgerSummary {
    pub fn from_entries(entries: &[LedgerEntry]) -> Result<Self, DomainError> {
        let mut summary = Self {
            in_quantity: 0,
            out_quantity: 0,
            in_value: Money::zero(),
            out_value: Money::zero(),
        };

        for entry in entries {
            let value = entry.value()?;
            match entry.entry_type() {
                EntryType::In => {
                    summary.in_quantity += u64::from(entry.quantity());
                    if let Some(value) = value {
                        summary.in_value = summary.in_value.add(&value)?;
                    }
                }
                EntryType::Out => {
                    summary.out_quantity += u64::from(entry.quantity());
                    if let Some(value) = value {
                        summary.out_value = summary.out_value.add(&value)?;
                    }
                }
            }
        }

        Ok(summary)
    }
}
