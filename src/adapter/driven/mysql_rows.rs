// MySQLの行からドメインオブジェクトを再構築する共通処理

use crate::domain::model::{
    CreatedSource, DeliveryMethod, EntryType, LedgerEntry, Money, MovementSource, Order,
    OrderContact, OrderId, OrderItem, OrderParts, Product, ProductDetails, ProductId, Role,
    ShippingStatus, User, UserId,
};
use crate::domain::port::RepositoryError;
use rust_decimal::Decimal;
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, Row};
use std::fmt::Display;
use uuid::Uuid;

pub(super) const PRODUCT_COLUMNS: &str = "id, name, description, cost_price, image_ref, \
     purchase_location, purchase_date, quantity, reserved, initial_quantity, version, \
     created_at, updated_at";

pub(super) const LEDGER_COLUMNS: &str = "id, product_id, entry_date, quantity, entry_type, \
     cost_price, source, order_id, actor_uid, created_at";

/// 注文と明細をJOINして取得するSELECT句
/// 呼び出し側でWHERE句と `ORDER BY o.created_at DESC, o.id, oi.line_no` を付ける
pub(super) const ORDER_SELECT: &str = r#"
    SELECT
        o.id, o.owner_uid, o.requested_by, o.requested_address, o.received_by,
        o.received_address, o.withdraw_date, o.delivery_method, o.shipping_status,
        o.shipping_carrier, o.tracking_number, o.created_by_email, o.created_source,
        o.version, o.created_at, o.updated_at,
        oi.line_no, oi.product_id, oi.product_name, oi.unit_price, oi.quantity
    FROM orders o
    LEFT JOIN order_items oi ON o.id = oi.order_id
"#;

pub(super) const ORDER_SORT: &str = " ORDER BY o.created_at DESC, o.id, oi.line_no";

fn column<'r, T>(row: &'r MySqlRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get(name).map_err(|e| {
        RepositoryError::FetchFailed(format!("{}列の読み取りに失敗しました: {}", name, e))
    })
}

fn parse<T, E: Display>(what: &str, result: Result<T, E>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::FetchFailed(format!("{}の解析に失敗しました: {}", what, e)))
}

fn money(amount: Decimal) -> Result<Money, RepositoryError> {
    parse("金額", Money::new(amount))
}

fn optional_money(amount: Option<Decimal>) -> Result<Option<Money>, RepositoryError> {
    amount.map(money).transpose()
}

pub(super) fn product_from_row(row: &MySqlRow) -> Result<Product, RepositoryError> {
    let id = parse("商品ID", ProductId::from_string(&column::<String>(row, "id")?))?;
    let details = ProductDetails {
        name: column(row, "name")?,
        description: column(row, "description")?,
        cost_price: optional_money(column(row, "cost_price")?)?,
        image_ref: column(row, "image_ref")?,
        purchase_location: column(row, "purchase_location")?,
        purchase_date: column(row, "purchase_date")?,
    };

    parse(
        "商品",
        Product::reconstruct(
            id,
            details,
            column(row, "quantity")?,
            column(row, "reserved")?,
            column(row, "initial_quantity")?,
            column(row, "version")?,
            column(row, "created_at")?,
            column(row, "updated_at")?,
        ),
    )
}

pub(super) fn ledger_entry_from_row(row: &MySqlRow) -> Result<LedgerEntry, RepositoryError> {
    let id = parse("台帳ID", Uuid::parse_str(&column::<String>(row, "id")?))?;
    let product_id = parse(
        "商品ID",
        ProductId::from_string(&column::<String>(row, "product_id")?),
    )?;
    let entry_type = parse(
        "入出庫区分",
        EntryType::from_string(&column::<String>(row, "entry_type")?),
    )?;
    let source = parse(
        "発生元",
        MovementSource::from_string(&column::<String>(row, "source")?),
    )?;
    let order_id = column::<Option<String>>(row, "order_id")?
        .map(|s| parse("注文ID", OrderId::from_string(&s)))
        .transpose()?;
    let actor_uid = UserId::parse_optional(column::<Option<String>>(row, "actor_uid")?.as_deref());

    Ok(LedgerEntry::reconstruct(
        id,
        product_id,
        column(row, "entry_date")?,
        column(row, "quantity")?,
        entry_type,
        optional_money(column(row, "cost_price")?)?,
        source,
        order_id,
        actor_uid,
        column(row, "created_at")?,
    ))
}

fn order_item_from_row(row: &MySqlRow) -> Result<Option<OrderItem>, RepositoryError> {
    // LEFT JOINで明細がない場合は全列NULL
    let Some(product_id) = column::<Option<String>>(row, "product_id")? else {
        return Ok(None);
    };
    let product_id = parse("商品ID", ProductId::from_string(&product_id))?;
    let product_name: Option<String> = column(row, "product_name")?;
    let unit_price: Option<Decimal> = column(row, "unit_price")?;
    let quantity: Option<u32> = column(row, "quantity")?;

    let (Some(product_name), Some(unit_price), Some(quantity)) = (product_name, unit_price, quantity)
    else {
        return Err(RepositoryError::FetchFailed(format!(
            "注文明細の列が欠けています: product_id={}",
            product_id
        )));
    };

    parse(
        "注文明細",
        OrderItem::new(product_id, product_name, money(unit_price)?, quantity),
    )
    .map(Some)
}

fn order_parts_from_row(row: &MySqlRow, id: OrderId) -> Result<OrderParts, RepositoryError> {
    let owner = parse("所有者ID", UserId::new(column::<String>(row, "owner_uid")?))?;

    Ok(OrderParts {
        id,
        owner,
        items: Vec::new(),
        contact: OrderContact {
            requested_by: column(row, "requested_by")?,
            requested_address: column(row, "requested_address")?,
            received_by: column(row, "received_by")?,
            received_address: column(row, "received_address")?,
        },
        withdraw_date: column(row, "withdraw_date")?,
        delivery_method: parse(
            "受け渡し方法",
            DeliveryMethod::from_string(&column::<String>(row, "delivery_method")?),
        )?,
        shipping_status: parse(
            "配送ステータス",
            ShippingStatus::from_string(&column::<String>(row, "shipping_status")?),
        )?,
        shipping_carrier: column(row, "shipping_carrier")?,
        tracking_number: column(row, "tracking_number")?,
        created_by_email: column(row, "created_by_email")?,
        created_source: parse(
            "注文作成元",
            CreatedSource::from_string(&column::<String>(row, "created_source")?),
        )?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        version: column(row, "version")?,
    })
}

/// `ORDER_SELECT` の結果から注文を再構築する
/// 同じ注文の行が連続していることを前提に、行の順序を保ったまま集約する
pub(super) fn orders_from_rows(rows: &[MySqlRow]) -> Result<Vec<Order>, RepositoryError> {
    let mut orders: Vec<OrderParts> = Vec::new();

    for row in rows {
        let id = parse("注文ID", OrderId::from_string(&column::<String>(row, "id")?))?;
        let continues_previous = orders.last().is_some_and(|parts| parts.id == id);
        if !continues_previous {
            orders.push(order_parts_from_row(row, id)?);
        }

        if let (Some(item), Some(parts)) = (order_item_from_row(row)?, orders.last_mut()) {
            parts.items.push(item);
        }
    }

    orders
        .into_iter()
        .map(|parts| parse("注文", Order::reconstruct(parts)))
        .collect()
}

pub(super) fn user_from_row(row: &MySqlRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: parse("ユーザーID", UserId::new(column::<String>(row, "id")?))?,
        email: column(row, "email")?,
        display_name: column(row, "display_name")?,
        role: parse("役割", Role::from_string(&column::<String>(row, "role")?))?,
    })
}
