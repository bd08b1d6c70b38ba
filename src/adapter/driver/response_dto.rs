use crate::domain::error::DomainError;
use crate::domain::model::{LedgerEntry, LedgerSummary, Order, OrderItem, Product, User};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 商品のレスポンスDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub cost_price: Option<Decimal>,
    pub image_ref: Option<String>,
    pub purchase_location: String,
    pub purchase_date: DateTime<Utc>,
    pub quantity: u32,
    pub reserved: u32,
    pub available: u32,
    pub initial_quantity: u32,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductResponse {
    pub fn from_product(product: &Product) -> Self {
        let details = product.details();
        Self {
            id: product.id().as_uuid(),
            name: details.name.clone(),
            description: details.description.clone(),
            cost_price: details.cost_price.map(|price| price.amount()),
            image_ref: details.image_ref.clone(),
            purchase_location: details.purchase_location.clone(),
            purchase_date: details.purchase_date,
            quantity: product.quantity(),
            reserved: product.reserved(),
            available: product.available(),
            initial_quantity: product.initial_quantity(),
            low_stock: product.is_low_stock(),
            created_at: product.created_at(),
            updated_at: product.updated_at(),
        }
    }
}

/// 作成されたリソースのID
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

/// 台帳行のレスポンスDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub date: DateTime<Utc>,
    pub quantity: u32,
    pub entry_type: String,
    pub cost_price: Option<Decimal>,
    pub source: String,
    pub order_id: Option<Uuid>,
    pub actor_uid: Option<String>,
}

impl LedgerEntryResponse {
    pub fn from_entry(entry: &LedgerEntry) -> Self {
        Self {
            id: entry.id(),
            product_id: entry.product_id().as_uuid(),
            date: entry.date(),
            quantity: entry.quantity(),
            entry_type: entry.entry_type().as_str().to_string(),
            cost_price: entry.cost_price().map(|price| price.amount()),
            source: entry.source().as_str().to_string(),
            order_id: entry.order_id().map(|id| id.as_uuid()),
            actor_uid: entry.actor_uid().map(|uid| uid.as_str().to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerSummaryResponse {
    pub in_quantity: u64,
    pub out_quantity: u64,
    pub in_value: Decimal,
    pub out_value: Decimal,
}

impl From<LedgerSummary> for LedgerSummaryResponse {
    fn from(summary: LedgerSummary) -> Self {
        Self {
            in_quantity: summary.in_quantity,
            out_quantity: summary.out_quantity,
            in_value: summary.in_value.amount(),
            out_value: summary.out_value.amount(),
        }
    }
}

/// 商品の在庫台帳（明細と集計）
#[derive(Debug, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub product_id: Uuid,
    pub entries: Vec<LedgerEntryResponse>,
    pub summary: LedgerSummaryResponse,
}

impl LedgerResponse {
    pub fn from_entries(product_id: Uuid, entries: &[LedgerEntry]) -> Result<Self, DomainError> {
        Ok(Self {
            product_id,
            entries: entries.iter().map(LedgerEntryResponse::from_entry).collect(),
            summary: LedgerSummary::from_entries(entries)?.into(),
        })
    }
}

/// 注文明細のレスポンスDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub subtotal: Decimal,
}

impl OrderItemResponse {
    pub fn from_item(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id().as_uuid(),
            product_name: item.product_name().to_string(),
            unit_price: item.unit_price().amount(),
            quantity: item.quantity(),
            subtotal: item.subtotal().amount(),
        }
    }
}

/// 注文のレスポンスDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub order_id: Uuid,
    pub owner_uid: String,
    pub items: Vec<OrderItemResponse>,
    pub total: Decimal,
    pub requested_by: Option<String>,
    pub requested_address: String,
    pub received_by: Option<String>,
    pub received_address: String,
    pub withdraw_date: DateTime<Utc>,
    pub delivery_method: String,
    pub shipping_status: String,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub created_by_email: Option<String>,
    pub created_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    pub fn from_order(order: &Order) -> Self {
        let contact = order.contact();
        Self {
            order_id: order.id().as_uuid(),
            owner_uid: order.owner().as_str().to_string(),
            items: order.items().iter().map(OrderItemResponse::from_item).collect(),
            total: order.total().amount(),
            requested_by: contact.requested_by.clone(),
            requested_address: contact.requested_address.clone(),
            received_by: contact.received_by.clone(),
            received_address: contact.received_address.clone(),
            withdraw_date: order.withdraw_date(),
            delivery_method: order.delivery_method().as_str().to_string(),
            shipping_status: order.shipping_status().as_str().to_string(),
            shipping_carrier: order.shipping_carrier().map(str::to_string),
            tracking_number: order.tracking_number().map(str::to_string),
            created_by_email: order.created_by_email().map(str::to_string),
            created_source: order.created_source().as_str().to_string(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// 注文作成のレスポンスDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: Uuid,
}

/// ユーザーのレスポンスDTO
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    pub role: String,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            uid: user.id.as_str().to_string(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role.as_str().to_string(),
        }
    }
}
