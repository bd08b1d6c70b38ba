use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_rows::{product_from_row, PRODUCT_COLUMNS};
use crate::domain::model::{Product, ProductDetails, ProductId};
use crate::domain::port::{ProductRepository, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySql, Pool};

/// MySQL商品リポジトリ
/// 商品の読み取りとメタデータの更新・削除を行う（在庫数は書き換えない）
pub struct MySqlProductRepository {
    pool: Pool<MySql>,
}

impl MySqlProductRepository {
    /// 新しいMySQL商品リポジトリを作成
    ///
    /// # Arguments
    /// * `pool` - MySQLコネクションプール
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for MySqlProductRepository {
    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {} FROM products WHERE id = ?", PRODUCT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(product_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の取得に失敗しました", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        // 作成日時の降順で並べる
        let sql = format!(
            "SELECT {} FROM products ORDER BY created_at DESC",
            PRODUCT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品一覧の取得に失敗しました", e))?;

        rows.iter().map(product_from_row).collect()
    }

    async fn update_details(
        &self,
        product_id: ProductId,
        details: &ProductDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        // バージョンを進めて、読み込み済みの在庫トランザクションを競合させる
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = ?, description = ?, cost_price = ?, image_ref = ?,
                purchase_location = ?, purchase_date = ?, updated_at = ?,
                version = version + 1
            WHERE id = ?
            "#,
        )
        .bind(&details.name)
        .bind(&details.description)
        .bind(details.cost_price.map(|price| price.amount()))
        .bind(&details.image_ref)
        .bind(&details.purchase_location)
        .bind(details.purchase_date)
        .bind(updated_at)
        .bind(product_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_sqlx("商品情報の更新に失敗しました", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        // 台帳は監査記録として残す
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("商品の削除に失敗しました", e))?;

        Ok(result.rows_affected() > 0)
    }
}
