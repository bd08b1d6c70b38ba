use crate::domain::model::{
    LedgerEntry, Order, OrderId, Product, ProductDetails, ProductId, ProductLedger, Role, User,
    UserId,
};
use crate::domain::port::{
    LedgerRepository, OrderRepository, OrderWrite, ProductRepository, ProductWrite,
    RepositoryError, StockChangeSet, StockStore, UserRepository,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    products: HashMap<ProductId, Product>,
    ledgers: HashMap<ProductId, ProductLedger>,
    orders: HashMap<UserId, HashMap<OrderId, Order>>,
    users: HashMap<UserId, User>,
}

impl State {
    /// 変更セットの期待バージョンがすべて一致するか確認する
    fn check_versions(&self, change_set: &StockChangeSet) -> Result<(), RepositoryError> {
        for write in &change_set.products {
            match write {
                ProductWrite::Insert(product) => {
                    if self.products.contains_key(&product.id()) {
                        return Err(RepositoryError::Conflict(format!(
                            "商品が既に存在します: {}",
                            product.id()
                        )));
                    }
                }
                ProductWrite::Update(product) => {
                    let stored = self.products.get(&product.id()).map(Product::version);
                    if stored != Some(product.version()) {
                        return Err(RepositoryError::Conflict(format!(
                            "商品が他のトランザクションで更新されました: {}",
                            product.id()
                        )));
                    }
                }
            }
        }

        match &change_set.order {
            Some(OrderWrite::Insert(order)) => {
                if self.find_order(order.owner(), order.id()).is_some() {
                    return Err(RepositoryError::Conflict(format!(
                        "注文が既に存在します: {}",
                        order.id()
                    )));
                }
            }
            Some(OrderWrite::Update(order)) => {
                let stored = self.find_order(order.owner(), order.id()).map(Order::version);
                if stored != Some(order.version()) {
                    return Err(RepositoryError::Conflict(format!(
                        "注文が他のトランザクションで更新されました: {}",
                        order.id()
                    )));
                }
            }
            None => {}
        }

        Ok(())
    }

    fn find_order(&self, owner: &UserId, order_id: OrderId) -> Option<&Order> {
        self.orders.get(owner).and_then(|orders| orders.get(&order_id))
    }

    fn apply(&mut self, change_set: StockChangeSet) {
        for write in change_set.products {
            let product = match write {
                ProductWrite::Insert(product) | ProductWrite::Update(product) => product,
            };
            self.products.insert(product.id(), product.committed());
        }

        for entry in change_set.ledger_entries {
            self.ledgers
                .entry(entry.product_id())
                .or_default()
                .append(entry);
        }

        if let Some(write) = change_set.order {
            let order = match write {
                OrderWrite::Insert(order) | OrderWrite::Update(order) => order,
            };
            self.orders
                .entry(order.owner().clone())
                .or_default()
                .insert(order.id(), order.committed());
        }
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    orders
}

/// インメモリストア
///
/// すべての状態を1つの `RwLock` で保持する。コミットは書き込みロックの中で
/// バージョンを検証してから適用するので、MySQL実装と同じ競合検出の挙動になる。
/// デモと自動テスト用。
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStore {
    async fn load_products(
        &self,
        product_ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(product_ids
            .iter()
            .filter_map(|id| state.products.get(id).map(|p| (*id, p.clone())))
            .collect())
    }

    async fn load_order(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.find_order(owner, order_id).cloned())
    }

    async fn commit(&self, change_set: StockChangeSet) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.check_versions(&change_set)?;
        state.apply(change_set);
        Ok(())
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.products.get(&product_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(products)
    }

    async fn update_details(
        &self,
        product_id: ProductId,
        details: &ProductDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(stored) = state.products.get_mut(&product_id) else {
            return Ok(false);
        };

        let mut updated = stored.clone();
        updated
            .update_details(details.clone(), updated_at)
            .map_err(|e| RepositoryError::OperationFailed(e.to_string()))?;
        // 読み込み済みの在庫トランザクションを競合させるためバージョンを進める
        *stored = updated.committed();
        Ok(true)
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.products.remove(&product_id).is_some())
    }
}

#[async_trait]
impl LedgerRepository for InMemoryStore {
    async fn find_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .ledgers
            .get(&product_id)
            .map(ProductLedger::entries_newest_first)
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn find_by_id(
        &self,
        owner: &UserId,
        order_id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.find_order(owner, order_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .orders
                .values()
                .flat_map(|orders| orders.values().cloned())
                .collect(),
        ))
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(newest_first(
            state
                .orders
                .get(owner)
                .map(|orders| orders.values().cloned().collect())
                .unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn save(&self, user: &User) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, user_id: &UserId) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(user_id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.read().await;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn update_role(&self, user_id: &UserId, role: Role) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.users.get_mut(user_id) {
            Some(user) => {
                user.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
