use crate::adapter::database_error::DatabaseError;
use crate::adapter::driven::mysql_rows::{ledger_entry_from_row, LEDGER_COLUMNS};
use crate::domain::model::{LedgerEntry, ProductId};
use crate::domain::port::{LedgerRepository, RepositoryError};
use async_trait::async_trait;
use sqlx::{MySql, Pool};

/// MySQL在庫台帳リポジトリ
/// 台帳への追記は在庫ストアのコミットで行うため、ここでは読み取りのみ
pub struct MySqlLedgerRepository {
    pool: Pool<MySql>,
}

impl MySqlLedgerRepository {
    pub fn new(pool: Pool<MySql>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerRepository for MySqlLedgerRepository {
    async fn find_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM inventory_ledger WHERE product_id = ? \
             ORDER BY entry_date DESC, created_at DESC",
            LEDGER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(product_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from_sqlx("台帳の取得に失敗しました", e))?;

        rows.iter().map(ledger_entry_from_row).collect()
    }
}
