use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::adapter::driver::request_dto::{
    AdjustQuantityRequest, CreateOrderRequest, OrdersQueryParams, RegisterProductRequest,
    RegisterUserRequest, SetRoleRequest, UpdateProductRequest, UpdateShippingRequest,
};
use crate::adapter::driver::response_dto::{
    CreateOrderResponse, CreatedResponse, LedgerResponse, OrderResponse, ProductResponse,
    UserResponse,
};
use crate::application::service::{
    OrderApplicationService, OrderQueryService, ProductApplicationService, ProductQueryService,
    UserService,
};
use crate::application::ApplicationError;
use crate::domain::error::DomainError;
use crate::domain::model::{OrderId, ProductId, ShippingUpdate, UserId};
use crate::domain::port::{LedgerRepository, OrderRepository, ProductRepository, UserRepository};
use crate::domain::service::StockEngine;

/// 在庫不足時にUIへ返す数量情報
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StockShortage {
    pub product_id: Uuid,
    pub requested: u32,
    pub available: u32,
}

#[derive(Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<StockShortage>,
}

impl ApiError {
    fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            details: None,
        }
    }
}

type ApiFailure = (StatusCode, Json<ApiError>);

// アプリケーションサービスを含む状態
#[derive(Clone)]
pub struct AppState {
    pub product_service: Arc<ProductApplicationService>,
    pub order_service: Arc<OrderApplicationService>,
    pub product_query_service: Arc<ProductQueryService>,
    pub order_query_service: Arc<OrderQueryService>,
    pub user_service: Arc<UserService>,
}

impl AppState {
    /// 在庫エンジンと読み取り用リポジトリからサービス一式を組み立てる
    pub fn new(
        engine: Arc<StockEngine>,
        product_repository: Arc<dyn ProductRepository>,
        ledger_repository: Arc<dyn LedgerRepository>,
        order_repository: Arc<dyn OrderRepository>,
        user_repository: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            product_service: Arc::new(ProductApplicationService::new(
                engine.clone(),
                product_repository.clone(),
            )),
            order_service: Arc::new(OrderApplicationService::new(engine)),
            product_query_service: Arc::new(ProductQueryService::new(
                product_repository,
                ledger_repository,
            )),
            order_query_service: Arc::new(OrderQueryService::new(order_repository)),
            user_service: Arc::new(UserService::new(user_repository)),
        }
    }
}

// REST APIルーターを作成
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/products", post(register_product).get(get_products))
        .route("/products/low-stock", get(get_low_stock_products))
        .route(
            "/products/:product_id",
            get(get_product_by_id)
                .put(update_product)
                .delete(delete_product),
        )
        .route("/products/:product_id/quantity", post(adjust_quantity))
        .route("/products/:product_id/ledger", get(get_ledger))
        .route("/orders", post(create_order).get(get_orders))
        .route("/users", get(get_users).post(register_user))
        .route("/users/:uid/role", put(set_user_role))
        .route("/users/:uid/orders", get(get_orders_for_user))
        .route("/users/:uid/orders/:order_id", get(get_order))
        .route("/users/:uid/orders/:order_id/shipping", put(update_shipping))
}

// ヘルスチェックエンドポイント
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stock-fulfillment",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiFailure> {
    payload.map(|Json(request)| request).map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                format!("無効なリクエストです: {}", rejection.body_text()),
                "INVALID_REQUEST",
            )),
        )
    })
}

// パス上のuidは空白のみなら所有者なしとして扱う
fn owner_from_path(uid: &str) -> Option<UserId> {
    UserId::parse_optional(Some(uid))
}

fn require_owner(uid: &str) -> Result<UserId, ApiFailure> {
    owner_from_path(uid).ok_or_else(|| map_domain_error(DomainError::OwnershipRequired))
}

// 商品登録エンドポイント
async fn register_product(
    State(state): State<AppState>,
    payload: Result<Json<RegisterProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiFailure> {
    let (details, quantity) = body(payload)?
        .into_domain(Utc::now())
        .map_err(map_domain_error)?;

    match state.product_service.register_product(details, quantity).await {
        Ok(product_id) => Ok((
            StatusCode::CREATED,
            Json(CreatedResponse {
                id: product_id.as_uuid(),
            }),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 商品一覧取得エンドポイント
async fn get_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ApiFailure> {
    let products = state
        .product_query_service
        .get_all_products()
        .await
        .map_err(map_application_error)?;

    Ok(Json(
        products.iter().map(ProductResponse::from_product).collect(),
    ))
}

// 在庫が少ない商品の一覧
async fn get_low_stock_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductResponse>>, ApiFailure> {
    let products = state
        .product_query_service
        .get_low_stock_products()
        .await
        .map_err(map_application_error)?;

    Ok(Json(
        products.iter().map(ProductResponse::from_product).collect(),
    ))
}

// 商品詳細取得エンドポイント
async fn get_product_by_id(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ApiFailure> {
    match state
        .product_query_service
        .get_product_by_id(ProductId::from_uuid(product_id))
        .await
    {
        Ok(Some(product)) => Ok(Json(ProductResponse::from_product(&product))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                "指定された商品が見つかりません",
                "PRODUCT_NOT_FOUND",
            )),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 商品メタデータ更新エンドポイント
async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    payload: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiFailure> {
    let details = body(payload)?.into_details().map_err(map_domain_error)?;

    match state
        .product_service
        .update_product_details(ProductId::from_uuid(product_id), details)
        .await
    {
        Ok(product) => Ok(Json(ProductResponse::from_product(&product))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 商品削除エンドポイント
async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<StatusCode, ApiFailure> {
    match state
        .product_service
        .delete_product(ProductId::from_uuid(product_id))
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫数の手動調整エンドポイント
async fn adjust_quantity(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    payload: Result<Json<AdjustQuantityRequest>, JsonRejection>,
) -> Result<Json<ProductResponse>, ApiFailure> {
    let request = body(payload)?;
    let delta = request.delta().map_err(map_domain_error)?;

    match state
        .product_service
        .adjust_quantity(ProductId::from_uuid(product_id), delta, request.direction)
        .await
    {
        Ok(product) => Ok(Json(ProductResponse::from_product(&product))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 在庫台帳取得エンドポイント
// 削除済みの商品でも参照できる
async fn get_ledger(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<LedgerResponse>, ApiFailure> {
    let entries = state
        .product_query_service
        .get_ledger(ProductId::from_uuid(product_id))
        .await
        .map_err(map_application_error)?;

    LedgerResponse::from_entries(product_id, &entries)
        .map(Json)
        .map_err(map_domain_error)
}

// 注文作成エンドポイント
async fn create_order(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiFailure> {
    let draft = body(payload)?
        .into_draft(Utc::now())
        .map_err(map_domain_error)?;

    match state.order_service.create_order(draft).await {
        Ok(order_id) => Ok((
            StatusCode::CREATED,
            Json(CreateOrderResponse {
                order_id: order_id.as_uuid(),
            }),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 全ユーザーの注文一覧（管理者向け）
async fn get_orders(
    State(state): State<AppState>,
    query: Result<Query<OrdersQueryParams>, QueryRejection>,
) -> Result<Json<Vec<OrderResponse>>, ApiFailure> {
    let Query(params) = query.map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "無効なクエリパラメータです",
                "INVALID_PARAMETER",
            )),
        )
    })?;
    let filter = params.into_filter().map_err(|err| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(err.to_string(), "INVALID_PARAMETER")),
        )
    })?;

    let orders = state
        .order_query_service
        .get_all_orders(filter)
        .await
        .map_err(map_application_error)?;

    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

// 指定ユーザーの注文一覧
async fn get_orders_for_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiFailure> {
    let owner = require_owner(&uid)?;
    let orders = state
        .order_query_service
        .get_orders_for_user(&owner)
        .await
        .map_err(map_application_error)?;

    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

// 注文詳細取得エンドポイント
async fn get_order(
    State(state): State<AppState>,
    Path((uid, order_id)): Path<(String, Uuid)>,
) -> Result<Json<OrderResponse>, ApiFailure> {
    let owner = require_owner(&uid)?;

    match state
        .order_query_service
        .get_order(&owner, OrderId::from_uuid(order_id))
        .await
    {
        Ok(Some(order)) => Ok(Json(OrderResponse::from_order(&order))),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError::new(
                "指定された注文が見つかりません",
                "ORDER_NOT_FOUND",
            )),
        )),
        Err(err) => Err(map_application_error(err)),
    }
}

// 配送情報更新エンドポイント
async fn update_shipping(
    State(state): State<AppState>,
    Path((uid, order_id)): Path<(String, Uuid)>,
    payload: Result<Json<UpdateShippingRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiFailure> {
    let update: ShippingUpdate = body(payload)?.into();

    match state
        .order_service
        .update_shipping(OrderId::from_uuid(order_id), owner_from_path(&uid), update)
        .await
    {
        Ok(order) => Ok(Json(OrderResponse::from_order(&order))),
        Err(err) => Err(map_application_error(err)),
    }
}

// ユーザー一覧取得エンドポイント
async fn get_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, ApiFailure> {
    let users = state
        .user_service
        .get_users()
        .await
        .map_err(map_application_error)?;

    Ok(Json(users.iter().map(UserResponse::from_user).collect()))
}

// ユーザー登録エンドポイント（初回ログイン時の登録・再登録）
async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiFailure> {
    let request = body(payload)?;
    let uid = UserId::new(request.uid).map_err(map_domain_error)?;

    match state
        .user_service
        .register_user(uid, request.email, request.display_name)
        .await
    {
        Ok(user) => Ok(Json(UserResponse::from_user(&user))),
        Err(err) => Err(map_application_error(err)),
    }
}

// 役割変更エンドポイント
async fn set_user_role(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    payload: Result<Json<SetRoleRequest>, JsonRejection>,
) -> Result<StatusCode, ApiFailure> {
    let owner = require_owner(&uid)?;
    let role = body(payload)?.role().map_err(map_domain_error)?;

    match state.user_service.set_user_role(&owner, role).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => Err(map_application_error(err)),
    }
}

// アプリケーションエラーをHTTPエラーにマッピング
fn map_application_error(err: ApplicationError) -> ApiFailure {
    match err {
        ApplicationError::DomainError(domain_err) => map_domain_error(domain_err),
        ApplicationError::RepositoryError(repo_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(repo_err.to_string(), "REPOSITORY_ERROR")),
        ),
        ApplicationError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(msg, "NOT_FOUND")),
        ),
    }
}

// ドメインエラーを適切なHTTPステータスコードとエラーコードにマッピング
fn map_domain_error(domain_err: DomainError) -> ApiFailure {
    match domain_err {
        DomainError::NotFound(msg) => (
            StatusCode::NOT_FOUND,
            Json(ApiError::new(msg, "NOT_FOUND")),
        ),
        DomainError::InvalidQuantity => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new("無効な数量です", "INVALID_QUANTITY")),
        ),
        DomainError::InvalidValue(msg) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(msg, "INVALID_VALUE")),
        ),
        DomainError::OwnershipRequired => (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(
                "注文の所有者が指定されていません",
                "OWNERSHIP_REQUIRED",
            )),
        ),
        DomainError::InsufficientStock {
            product_id,
            requested,
            available,
        } => (
            StatusCode::CONFLICT,
            Json(ApiError {
                error: format!(
                    "在庫が不足しています（要求 {}、利用可能 {}）",
                    requested, available
                ),
                code: "INSUFFICIENT_STOCK".to_string(),
                details: Some(StockShortage {
                    product_id: product_id.as_uuid(),
                    requested,
                    available,
                }),
            }),
        ),
        DomainError::TransactionFailed { attempts } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::new(
                format!(
                    "在庫の更新が競合し、{}回試行しても完了しませんでした",
                    attempts
                ),
                "TRANSACTION_FAILED",
            )),
        ),
        DomainError::Repository(repo_err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(repo_err.to_string(), "REPOSITORY_ERROR")),
        ),
    }
}

#[cfg(test)]
mod error_handling_tests {
    use super::*;
    use crate::domain::port::RepositoryError;

    #[test]
    fn test_map_application_error_not_found() {
        let app_error = ApplicationError::NotFound("リソースが見つかりません".to_string());
        let (status, Json(api_error)) = map_application_error(app_error);

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(api_error.code, "NOT_FOUND");
        assert_eq!(api_error.error, "リソースが見つかりません");
        assert!(api_error.details.is_none());
    }

    #[test]
    fn test_insufficient_stock_carries_quantities() {
        let product_id = ProductId::new();
        let app_error = ApplicationError::DomainError(DomainError::InsufficientStock {
            product_id,
            requested: 5,
            available: 2,
        });
        let (status, Json(api_error)) = map_application_error(app_error);

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(api_error.code, "INSUFFICIENT_STOCK");
        assert_eq!(
            api_error.details,
            Some(StockShortage {
                product_id: product_id.as_uuid(),
                requested: 5,
                available: 2,
            })
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        let cases = [
            (DomainError::InvalidQuantity, StatusCode::BAD_REQUEST),
            (DomainError::OwnershipRequired, StatusCode::BAD_REQUEST),
            (
                DomainError::TransactionFailed { attempts: 4 },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                DomainError::Repository(RepositoryError::OperationFailed("x".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let (status, _) = map_domain_error(err);
            assert_eq!(status, expected);
        }
    }

    #[test]
    fn test_api_error_structure() {
        let api_error = ApiError::new("テストエラー", "TEST_ERROR");

        // 在庫不足以外ではdetailsを出力しない
        let json = serde_json::to_string(&api_error).unwrap();
        assert!(json.contains("テストエラー"));
        assert!(json.contains("TEST_ERROR"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.error, "テストエラー");
        assert_eq!(deserialized.code, "TEST_ERROR");
    }

    #[test]
    fn test_blank_path_uid_is_missing_owner() {
        assert!(owner_from_path("   ").is_none());
        assert_eq!(owner_from_path("uid-1").unwrap().as_str(), "uid-1");
    }
}
