use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_rows::{
    orders_from_rows, product_from_row, ORDER_SELECT, ORDER_SORT, PRODUCT_COLUMNS,
};
use crate::domain::model::{LedgerEntry, Order, OrderId, Product, ProductId, UserId};
use crate::domain::port::{
    OrderWrite, ProductWrite, RepositoryError, StockChangeSet, StockStore,
};
use async_trait::async_trait;
use sqlx::{MySql, Pool, QueryBuilder, Transaction};
use std::collections::HashMap;

/// MySQL在庫ストア
///
/// コミットは1つのSQLトランザクションで実行し、商品・注文の更新は
/// `WHERE id = ? AND version = ?` で読み込み時のバージョンを検証する。
/// 1件でも一致しなければロールバックして `RepositoryError::Conflict` を返す。
pub struct MySqlStockStore {
    pool: Pool<MySql>,
}

impl MySqlStockStore {
    /// 新しいMySQL在庫ストアを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }

    async fn write_product(
        tx: &mut Transaction<'_, MySql>,
        write: &ProductWrite,
    ) -> Result<(), RepositoryError> {
        match write {
            ProductWrite::Insert(product) => {
                let details = product.details();
                sqlx::query(
                    r#"
                    INSERT INTO products (
                        id, name, description, cost_price, image_ref, purchase_location,
                        purchase_date, quantity, reserved, initial_quantity, version,
                        created_at, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(product.id().to_string())
                .bind(&details.name)
                .bind(&details.description)
                .bind(details.cost_price.map(|price| price.amount()))
                .bind(&details.image_ref)
                .bind(&details.purchase_location)
                .bind(details.purchase_date)
                .bind(product.quantity())
                .bind(product.reserved())
                .bind(product.initial_quantity())
                .bind(product.version() + 1)
                .bind(product.created_at())
                .bind(product.updated_at())
                .execute(&mut **tx)
                .await
                .map_err(|e| DatabaseError::from_sqlx("商品の登録に失敗しました", e))?;
            }
            ProductWrite::Update(product) => {
                // 在庫数と予約数だけを書き換える。メタデータは別経路で更新される
                let result = sqlx::query(
                    r#"
                    UPDATE products
                    SET quantity = ?, reserved = ?, updated_at = ?, version = version + 1
                    WHERE id = ? AND version = ?
                    "#,
                )
                .bind(product.quantity())
                .bind(product.reserved())
                .bind(product.updated_at())
                .bind(product.id().to_string())
                .bind(product.version())
                .execute(&mut **tx)
                .await
                .map_err(|e| DatabaseError::from_sqlx("在庫の更新に失敗しました", e))?;

                if result.rows_affected() == 0 {
                    return Err(RepositoryError::Conflict(format!(
                        "商品が他のトランザクションで更新されました: {}",
                        product.id()
                    )));
                }
            }
        }
        Ok(())
    }

    async fn append_ledger(
        tx: &mut Transaction<'_, MySql>,
        entry: &LedgerEntry,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_ledger (
                id, product_id, entry_date, quantity, entry_type, cost_price, source,
                order_id, actor_uid, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id().to_string())
        .bind(entry.product_id().to_string())
        .bind(entry.date())
        .bind(entry.quantity())
        .bind(entry.entry_type().as_str())
        .bind(entry.cost_price().map(|price| price.amount()))
        .bind(entry.source().as_str())
        .bind(entry.order_id().map(|id| id.to_string()))
        .bind(entry.actor_uid().map(|uid| uid.as_str().to_string()))
        .bind(entry.created_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("台帳の書き込みに失敗しました", e))?;
        Ok(())
    }

    async fn insert_order(
        tx: &mut Transaction<'_, MySql>,
        order: &Order,
    ) -> Result<(), RepositoryError> {
        let contact = order.contact();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, owner_uid, requested_by, requested_address, received_by, received_address,
                withdraw_date, delivery_method, shipping_status, shipping_carrier,
                tracking_number, created_by_email, created_source, version, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(order.id().to_string())
        .bind(order.owner().as_str())
        .bind(&contact.requested_by)
        .bind(&contact.requested_address)
        .bind(&contact.received_by)
        .bind(&contact.received_address)
        .bind(order.withdraw_date())
        .bind(order.delivery_method().as_str())
        .bind(order.shipping_status().as_str())
        .bind(order.shipping_carrier())
        .bind(order.tracking_number())
        .bind(order.created_by_email())
        .bind(order.created_source().as_str())
        .bind(order.version() + 1)
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("注文の保存に失敗しました", e))?;

        for (line_no, item) in order.items().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, line_no, product_id, product_name, unit_price, quantity)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(order.id().to_string())
            .bind(line_no as u32)
            .bind(item.product_id().to_string())
            .bind(item.product_name())
            .bind(item.unit_price().amount())
            .bind(item.quantity())
            .execute(&mut **tx)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文明細の保存に失敗しました", e))?;
        }
        Ok(())
    }

    async fn update_order(
        tx: &mut Transaction<'_, MySql>,
        order: &Order,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET shipping_status = ?, shipping_carrier = ?, tracking_number = ?,
                updated_at = ?, version = version + 1
            WHERE id = ? AND owner_uid = ? AND version = ?
            "#,
        )
        .bind(order.shipping_status().as_str())
        .bind(order.shipping_carrier())
        .bind(order.tracking_number())
        .bind(order.updated_at())
        .bind(order.id().to_string())
        .bind(order.owner().as_str())
        .bind(order.version())
        .execute(&mut **tx)
        .await
        .map_err(|e| DatabaseError::from_sqlx("配送情報の更新に失敗しました", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "注文が他のトランザクションで更新されました: {}",
                order.id()
            )));
        }
        Ok(())
    }

    async fn apply(
        tx: &mut Transaction<'_, MySql>,
        change_set: &StockChangeSet,
    ) -> Result<(), RepositoryError> {
        for write in &change_set.products {
            Self::write_product(tx, write).await?;
        }
        for entry in &change_set.ledger_entries {
            Self::append_ledger(tx, entry).await?;
        }
        match &change_set.order {
            Some(OrderWrite::Insert(order)) => Self::insert_order(tx, order).await?,
            Some(OrderWrite::Update(order)) => Self::update_order(tx, order).await?,
            None => {}
        }
        Ok(())
    }
}

#[async_trait]
impl StockStore for MySqlStockStore {
    async fn load_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
            "SELECT {} FROM products WHERE id IN (",
            PRODUCT_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for product_id in product_ids {
            separated.push_bind(product_id.to_string());
        }
        separated.push_unseparated(")");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の取得に失敗しました", e))?;

        rows.iter()
            .map(|row| product_from_row(row).map(|product| (product.id(), product)))
            .collect()
    }

    async fn load_order(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "{} WHERE o.id = ? AND o.owner_uid = ?{}",
            ORDER_SELECT, ORDER_SORT
        );
        let rows = sqlx::query(&sql)
            .bind(order_id.to_string())
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文の取得に失敗しました", e))?;

        Ok(orders_from_rows(&rows)?.into_iter().next())
    }

    async fn commit(&self, change_set: StockChangeSet) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DatabaseError::ConnectionError(format!("トランザクション開始に失敗しました: {}", e))
        })?;

        // 失敗時はtxがドロップされてロールバックされる
        Self::apply(&mut tx, &change_set).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::from_sqlx("トランザクションのコミットに失敗しました", e))?;
        Ok(())
    }
}
