// 駆動される側アダプター（ストア・リポジトリ・ロガーの実装）

mod console_logger;
mod in_memory_store;
mod ledger_repository;
mod mysql_rows;
mod order_repository;
mod product_repository;
mod stock_store;
mod user_repository;

pub use console_logger::{ConsoleLogger, LogEntry};
pub use in_memory_store::InMemoryStore;
pub use ledger_repository::MySqlLedgerRepository;
pub use order_repository::MySqlOrderRepository;
pub use product_repository::MySqlProductRepository;
pub use stock_store::MySqlStockStore;
pub use user_repository::MySqlUserRepository;
