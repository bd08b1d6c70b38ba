use stock_fulfillment::adapter::driven::{
    ConsoleLogger, InMemoryStore, MySqlLedgerRepository, MySqlOrderRepository,
    MySqlProductRepository, MySqlStockStore, MySqlUserRepository,
};
use stock_fulfillment::adapter::driver::rest_api::{create_router, AppState};
use stock_fulfillment::adapter::{Backend, DatabaseConfig, DatabaseMigration, ServerConfig};
use stock_fulfillment::domain::port::Logger;
use stock_fulfillment::domain::service::StockEngine;

use sqlx::mysql::MySqlPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

const COMPONENT: &str = "Server";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== 在庫予約・出荷管理システム REST API ===");
    println!();

    // .envファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    let server_config = ServerConfig::from_env()?;
    let logger: Arc<dyn Logger> = Arc::new(ConsoleLogger::with_min_level(server_config.log_level));

    let app_state = match server_config.backend {
        Backend::MySql => {
            // データベース設定を読み込む
            let config = DatabaseConfig::from_env()?;
            logger.info(
                COMPONENT,
                "データベース設定を読み込みました",
                None,
                Some(HashMap::from([
                    ("host".to_string(), config.host.clone()),
                    ("port".to_string(), config.port.to_string()),
                ])),
            );

            // 接続プールを作成
            let pool = MySqlPoolOptions::new()
                .max_connections(config.max_connections)
                .connect(&config.connection_string())
                .await?;

            // マイグレーションを実行
            DatabaseMigration::new(pool.clone(), logger.clone())
                .run()
                .await?;

            let engine = Arc::new(StockEngine::new(
                Arc::new(MySqlStockStore::new(pool.clone())),
                server_config.retry_policy,
                logger.clone(),
            ));
            AppState::new(
                engine,
                Arc::new(MySqlProductRepository::new(pool.clone())),
                Arc::new(MySqlLedgerRepository::new(pool.clone())),
                Arc::new(MySqlOrderRepository::new(pool.clone())),
                Arc::new(MySqlUserRepository::new(pool)),
            )
        }
        Backend::Memory => {
            logger.warn(
                COMPONENT,
                "インメモリストアで起動します（再起動でデータは消えます）",
                None,
                None,
            );
            let store = Arc::new(InMemoryStore::new());
            let engine = Arc::new(StockEngine::new(
                store.clone(),
                server_config.retry_policy,
                logger.clone(),
            ));
            AppState::new(engine, store.clone(), store.clone(), store.clone(), store)
        }
    };

    // REST APIルーターを作成
    let app = create_router()
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(app_state);

    // サーバーを起動
    let listener = tokio::net::TcpListener::bind(&server_config.bind_address).await?;
    logger.info(
        COMPONENT,
        &format!(
            "REST APIサーバーが起動しました: http://{}",
            server_config.bind_address
        ),
        None,
        Some(HashMap::from([
            ("backend".to_string(), format!("{:?}", server_config.backend)),
            (
                "max_attempts".to_string(),
                server_config.retry_policy.max_attempts().to_string(),
            ),
        ])),
    );
    println!("API仕様:");
    println!("  GET    /health - ヘルスチェック");
    println!("  POST   /products - 商品登録");
    println!("  GET    /products - 商品一覧");
    println!("  GET    /products/low-stock - 在庫が少ない商品");
    println!("  GET    /products/:id - 商品詳細");
    println!("  PUT    /products/:id - 商品メタデータ更新");
    println!("  DELETE /products/:id - 商品削除");
    println!("  POST   /products/:id/quantity - 在庫数の手動調整");
    println!("  GET    /products/:id/ledger - 在庫台帳");
    println!("  POST   /orders - 注文作成");
    println!("  GET    /orders?source=&status= - 全注文一覧");
    println!("  GET    /users - ユーザー一覧");
    println!("  POST   /users - ユーザー登録");
    println!("  PUT    /users/:uid/role - 役割変更");
    println!("  GET    /users/:uid/orders - ユーザーの注文一覧");
    println!("  GET    /users/:uid/orders/:order_id - 注文詳細");
    println!("  PUT    /users/:uid/orders/:order_id/shipping - 配送情報更新");
    println!();

    axum::serve(listener, app).await?;

    Ok(())
}
