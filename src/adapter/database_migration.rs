use crate::adapter::database_error::DatabaseError;
use crate::domain::port::Logger;
use sqlx::{MySql, Pool};
use std::sync::Arc;

const COMPONENT: &str = "DatabaseMigration";

/// マイグレーションファイル（適用順）
const MIGRATIONS: [(&str, &str); 5] = [
    (
        "001_create_products_table",
        include_str!("../../migrations/001_create_products_table.sql"),
    ),
    (
        "002_create_inventory_ledger_table",
        include_str!("../../migrations/002_create_inventory_ledger_table.sql"),
    ),
    (
        "003_create_orders_table",
        include_str!("../../migrations/003_create_orders_table.sql"),
    ),
    (
        "004_create_order_items_table",
        include_str!("../../migrations/004_create_order_items_table.sql"),
    ),
    (
        "005_create_users_table",
        include_str!("../../migrations/005_create_users_table.sql"),
    ),
];

/// データベースマイグレーションを管理する構造体
pub struct DatabaseMigration {
    pool: Pool<MySql>,
    logger: Arc<dyn Logger>,
}

impl DatabaseMigration {
    /// 新しいDatabaseMigrationインスタンスを作成
    pub fn new(pool: Pool<MySql>, logger: Arc<dyn Logger>) -> Self {
        Self { pool, logger }
    }

    /// マイグレーションを実行
    /// べき等性を保証（CREATE TABLE IF NOT EXISTS）
    pub async fn run(&self) -> Result<(), DatabaseError> {
        for (name, migration_sql) in MIGRATIONS {
            sqlx::query(migration_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| DatabaseError::MigrationError(format!("{} failed: {}", name, e)))?;
            self.logger
                .debug(COMPONENT, &format!("{} applied", name), None, None);
        }

        self.logger.info(
            COMPONENT,
            &format!("All {} migrations completed successfully", MIGRATIONS.len()),
            None,
            None,
        );
        Ok(())
    }
}
