use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_rows::{orders_from_rows, ORDER_SELECT, ORDER_SORT};
use crate::domain::model::{Order, OrderId, UserId};
use crate::domain::port::{OrderRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::{MySql, Pool};

/// MySQL注文リポジトリ
/// 注文の作成と配送情報の更新は在庫ストアのコミットで行うため、ここでは読み取りのみ
pub struct MySqlOrderRepository {
    pool: Pool<MySql>,
}

impl MySqlOrderRepository {
    /// 新しいMySQL注文リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    ///
    /// # Returns
    /// * MySqlOrderRepositoryのインスタンス
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for MySqlOrderRepository {
    async fn find_by_id(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        // ordersテーブルとorder_itemsテーブルをJOINして取得
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

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        // 全ユーザーの注文を作成日時の降順で並べる
        let sql = format!("{}{}", ORDER_SELECT, ORDER_SORT);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("注文一覧の取得に失敗しました", e))?;

        orders_from_rows(&rows)
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!("{} WHERE o.owner_uid = ?{}", ORDER_SELECT, ORDER_SORT);
        let rows = sqlx::query(&sql)
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::from_sqlx("ユーザー別注文一覧の取得に失敗しました", e)
            })?;

        orders_from_rows(&rows)
    }
}
