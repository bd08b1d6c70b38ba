use crate::application::service::OrderFilter;
use crate::domain::error::DomainError;
use crate::domain::model::{
    AdjustDirection, CreatedSource, DeliveryMethod, Money, OrderContact, OrderDraft,
    OrderLineRequest, ProductDetails, ProductId, Role, ShippingStatus, ShippingUpdate, UserId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 数量の入力を検証する
/// JSONでは負の値も受け付け、ここでInvalidQuantityにする
fn quantity(value: i64, allow_zero: bool) -> Result<u32, DomainError> {
    let min = if allow_zero { 0 } else { 1 };
    if value < min {
        return Err(DomainError::InvalidQuantity);
    }
    u32::try_from(value).map_err(|_| DomainError::InvalidQuantity)
}

fn optional_money(amount: Option<Decimal>) -> Result<Option<Money>, DomainError> {
    amount.map(Money::new).transpose()
}

/// 商品登録用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct RegisterProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost_price: Option<Decimal>,
    pub quantity: i64,
    pub image_ref: Option<String>,
    #[serde(default)]
    pub purchase_location: String,
    /// 省略時は登録時刻
    pub purchase_date: Option<DateTime<Utc>>,
}

impl RegisterProductRequest {
    pub fn into_domain(self, now: DateTime<Utc>) -> Result<(ProductDetails, u32), DomainError> {
        let quantity = quantity(self.quantity, true)?;
        let details = ProductDetails {
            name: self.name,
            description: self.description,
            cost_price: optional_money(self.cost_price)?,
            image_ref: self.image_ref,
            purchase_location: self.purchase_location,
            purchase_date: self.purchase_date.unwrap_or(now),
        };
        details.validate()?;
        Ok((details, quantity))
    }
}

/// 商品メタデータ更新用のリクエストDTO
/// 在庫数はここでは変更できない（数量調整を使う）
#[derive(Serialize, Deserialize)]
pub struct UpdateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cost_price: Option<Decimal>,
    pub image_ref: Option<String>,
    #[serde(default)]
    pub purchase_location: String,
    pub purchase_date: DateTime<Utc>,
}

impl UpdateProductRequest {
    pub fn into_details(self) -> Result<ProductDetails, DomainError> {
        Ok(ProductDetails {
            name: self.name,
            description: self.description,
            cost_price: optional_money(self.cost_price)?,
            image_ref: self.image_ref,
            purchase_location: self.purchase_location,
            purchase_date: self.purchase_date,
        })
    }
}

/// 数量調整用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct AdjustQuantityRequest {
    pub delta: i64,
    pub direction: AdjustDirection,
}

impl AdjustQuantityRequest {
    pub fn delta(&self) -> Result<u32, DomainError> {
        quantity(self.delta, false)
    }
}

/// 注文明細用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// 注文作成用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub requested_by: Option<String>,
    #[serde(default)]
    pub requested_address: String,
    pub received_by: Option<String>,
    #[serde(default)]
    pub received_address: String,
    /// 省略時は作成時刻
    pub withdraw_date: Option<DateTime<Utc>>,
    pub delivery_method: DeliveryMethod,
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub created_by_uid: Option<String>,
    pub created_by_email: Option<String>,
    pub created_source: Option<CreatedSource>,
}

impl CreateOrderRequest {
    pub fn into_draft(self, now: DateTime<Utc>) -> Result<OrderDraft, DomainError> {
        let lines = self
            .items
            .into_iter()
            .map(|item| {
                Ok(OrderLineRequest {
                    product_id: ProductId::from_uuid(item.product_id),
                    quantity: quantity(item.quantity, false)?,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(OrderDraft {
            lines,
            contact: OrderContact {
                requested_by: self.requested_by,
                requested_address: self.requested_address,
                received_by: self.received_by,
                received_address: self.received_address,
            },
            withdraw_date: self.withdraw_date.unwrap_or(now),
            delivery_method: self.delivery_method,
            shipping_carrier: self.shipping_carrier,
            tracking_number: self.tracking_number,
            created_by_uid: UserId::parse_optional(self.created_by_uid.as_deref()),
            created_by_email: self.created_by_email,
            created_source: self.created_source.unwrap_or(CreatedSource::Customer),
        })
    }
}

/// 配送情報更新用のリクエストDTO
#[derive(Serialize, Deserialize, Default)]
pub struct UpdateShippingRequest {
    pub shipping_carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub shipping_status: Option<ShippingStatus>,
}

impl From<UpdateShippingRequest> for ShippingUpdate {
    fn from(request: UpdateShippingRequest) -> Self {
        ShippingUpdate {
            shipping_carrier: request.shipping_carrier,
            tracking_number: request.tracking_number,
            shipping_status: request.shipping_status,
        }
    }
}

/// 注文一覧取得用のクエリパラメータ
#[derive(Deserialize, Default)]
pub struct OrdersQueryParams {
    pub source: Option<String>,
    pub status: Option<String>,
}

impl OrdersQueryParams {
    pub fn into_filter(self) -> Result<OrderFilter, DomainError> {
        Ok(OrderFilter {
            created_source: self
                .source
                .as_deref()
                .map(CreatedSource::from_string)
                .transpose()?,
            shipping_status: self
                .status
                .as_deref()
                .map(ShippingStatus::from_string)
                .transpose()?,
        })
    }
}

/// ユーザー登録用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct RegisterUserRequest {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// 役割変更用のリクエストDTO
#[derive(Serialize, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

impl SetRoleRequest {
    pub fn role(&self) -> Result<Role, DomainError> {
        Role::from_string(&self.role)
    }
}
