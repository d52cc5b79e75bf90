//! In-memory store fixtures for exercising the sync core end to end.
//!
//! Both fixtures hold their collections behind a mutex and implement the
//! same matching and no-op-delete contracts as the production adapters, so
//! orchestrator tests observe realistic store behaviour without a database
//! or a network.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::model::{
    Category, Product, ProductStock, SaleLine, ShopConfig, Transaction, User,
};
use crate::domain::ports::{
    LocalStore, RemoteCategory, RemoteProduct, RemoteProductStock, RemoteSaleLine,
    RemoteShopConfig, RemoteStore, RemoteTransaction, RemoteUser, StoreError,
};

#[derive(Debug, Default)]
struct LocalState {
    users: BTreeMap<String, User>,
    categories: BTreeMap<String, Category>,
    product_stocks: BTreeMap<String, ProductStock>,
    products: BTreeMap<String, Product>,
    transactions: BTreeMap<String, Transaction>,
    sale_lines: BTreeMap<String, SaleLine>,
    shop_config: Option<ShopConfig>,
}

/// In-memory [`LocalStore`] fixture.
#[derive(Debug, Default)]
pub struct InMemoryLocalStore {
    state: Mutex<LocalState>,
}

impl InMemoryLocalStore {
    /// Empty store, as a freshly installed terminal would have.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LocalState) -> T) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::query("local fixture mutex poisoned".to_owned()))?;
        Ok(f(&mut state))
    }

    /// Seed a user without going through the trait.
    pub fn seed_user(&self, user: User) {
        if let Ok(mut state) = self.state.lock() {
            state.users.insert(user.id.clone(), user);
        }
    }

    /// Seed a category without going through the trait.
    pub fn seed_category(&self, category: Category) {
        if let Ok(mut state) = self.state.lock() {
            state.categories.insert(category.id.clone(), category);
        }
    }

    /// Seed a stock record without going through the trait.
    pub fn seed_product_stock(&self, stock: ProductStock) {
        if let Ok(mut state) = self.state.lock() {
            state.product_stocks.insert(stock.id.clone(), stock);
        }
    }

    /// Seed a product without going through the trait.
    pub fn seed_product(&self, product: Product) {
        if let Ok(mut state) = self.state.lock() {
            state.products.insert(product.id.clone(), product);
        }
    }

    /// Seed a transaction without going through the trait.
    pub fn seed_transaction(&self, transaction: Transaction) {
        if let Ok(mut state) = self.state.lock() {
            state.transactions.insert(transaction.id.clone(), transaction);
        }
    }

    /// Seed a line item without going through the trait.
    pub fn seed_sale_line(&self, line: SaleLine) {
        if let Ok(mut state) = self.state.lock() {
            state.sale_lines.insert(line.id.clone(), line);
        }
    }

    /// Seed the shop configuration without going through the trait.
    pub fn seed_shop_config(&self, config: ShopConfig) {
        if let Ok(mut state) = self.state.lock() {
            state.shop_config = Some(config);
        }
    }

    /// Remove a transaction, as a checkout rollback or admin action would.
    pub fn remove_transaction(&self, id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.transactions.remove(id);
            state.sale_lines.retain(|_, line| line.transaction_id != id);
        }
    }
}

#[async_trait]
impl LocalStore for InMemoryLocalStore {
    async fn count_transactions(&self) -> Result<i64, StoreError> {
        self.with_state(|s| s.transactions.len() as i64)
    }

    async fn count_products(&self) -> Result<i64, StoreError> {
        self.with_state(|s| s.products.len() as i64)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        self.with_state(|s| s.users.values().cloned().collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        self.with_state(|s| s.categories.values().cloned().collect())
    }

    async fn list_product_stocks(&self) -> Result<Vec<ProductStock>, StoreError> {
        self.with_state(|s| s.product_stocks.values().cloned().collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.with_state(|s| s.products.values().cloned().collect())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        self.with_state(|s| s.transactions.values().cloned().collect())
    }

    async fn list_sale_lines(&self) -> Result<Vec<SaleLine>, StoreError> {
        self.with_state(|s| s.sale_lines.values().cloned().collect())
    }

    async fn get_shop_config(&self) -> Result<Option<ShopConfig>, StoreError> {
        self.with_state(|s| s.shop_config.clone())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.with_state(|s| s.users.get(id).cloned())
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>, StoreError> {
        self.with_state(|s| s.categories.get(id).cloned())
    }

    async fn get_product_stock(&self, id: &str) -> Result<Option<ProductStock>, StoreError> {
        self.with_state(|s| s.product_stocks.get(id).cloned())
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        self.with_state(|s| s.products.get(id).cloned())
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        self.with_state(|s| s.transactions.get(id).cloned())
    }

    async fn get_sale_line(&self, id: &str) -> Result<Option<SaleLine>, StoreError> {
        self.with_state(|s| s.sale_lines.get(id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.with_state(|s| s.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        self.with_state(|s| s.categories.values().find(|c| c.name == name).cloned())
    }

    async fn find_product_stock_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProductStock>, StoreError> {
        self.with_state(|s| s.product_stocks.values().find(|p| p.name == name).cloned())
    }

    async fn find_product_by_stock(
        &self,
        product_stock_id: &str,
    ) -> Result<Option<Product>, StoreError> {
        self.with_state(|s| {
            s.products
                .values()
                .find(|p| p.product_stock_id == product_stock_id)
                .cloned()
        })
    }

    async fn find_sale_line_for(
        &self,
        product_id: &str,
        transaction_id: &str,
    ) -> Result<Option<SaleLine>, StoreError> {
        self.with_state(|s| {
            s.sale_lines
                .values()
                .find(|l| l.product_id == product_id && l.transaction_id == transaction_id)
                .cloned()
        })
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.users.insert(user.id.clone(), user.clone());
        })
    }

    async fn upsert_category(&self, category: &Category) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.categories.insert(category.id.clone(), category.clone());
        })
    }

    async fn upsert_product_stock(&self, stock: &ProductStock) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.product_stocks.insert(stock.id.clone(), stock.clone());
        })
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.products.insert(product.id.clone(), product.clone());
        })
    }

    async fn upsert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.transactions.insert(transaction.id.clone(), transaction.clone());
        })
    }

    async fn upsert_sale_line(&self, line: &SaleLine) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.sale_lines.insert(line.id.clone(), line.clone());
        })
    }

    async fn upsert_shop_config(&self, config: &ShopConfig) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.shop_config = Some(config.clone());
        })
    }

    async fn adjust_stock(&self, product_stock_id: &str, delta: i32) -> Result<i32, StoreError> {
        self.with_state(|s| {
            let Some(stock) = s.product_stocks.get_mut(product_stock_id) else {
                return Err(StoreError::not_found(format!(
                    "product stock `{product_stock_id}`"
                )));
            };
            let next = stock.stock + delta;
            if next < 0 {
                return Err(StoreError::conflict(format!(
                    "stock for `{product_stock_id}` cannot go below zero"
                )));
            }
            stock.stock = next;
            Ok(next)
        })?
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    users: BTreeMap<Uuid, RemoteUser>,
    categories: BTreeMap<Uuid, RemoteCategory>,
    product_stocks: BTreeMap<Uuid, RemoteProductStock>,
    products: BTreeMap<Uuid, RemoteProduct>,
    transactions: BTreeMap<Uuid, RemoteTransaction>,
    sale_lines: BTreeMap<Uuid, RemoteSaleLine>,
    shop_config: Option<RemoteShopConfig>,
}

/// In-memory [`RemoteStore`] fixture.
#[derive(Debug, Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<RemoteState>,
}

impl InMemoryRemoteStore {
    /// Empty store, as a freshly provisioned remote project would have.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut RemoteState) -> T) -> Result<T, StoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::query("remote fixture mutex poisoned".to_owned()))?;
        Ok(f(&mut state))
    }

    /// Seed a category row without going through the trait.
    pub fn seed_category(&self, row: RemoteCategory) {
        if let Ok(mut state) = self.state.lock() {
            state.categories.insert(row.id, row);
        }
    }

    /// Seed a transaction row without going through the trait.
    pub fn seed_transaction(&self, row: RemoteTransaction) {
        if let Ok(mut state) = self.state.lock() {
            state.transactions.insert(row.id, row);
        }
    }

    /// Seed a line-item row without going through the trait.
    pub fn seed_sale_line(&self, row: RemoteSaleLine) {
        if let Ok(mut state) = self.state.lock() {
            state.sale_lines.insert(row.id, row);
        }
    }

    /// Seed a product row without going through the trait.
    pub fn seed_product(&self, row: RemoteProduct) {
        if let Ok(mut state) = self.state.lock() {
            state.products.insert(row.id, row);
        }
    }

    /// Seed a stock row without going through the trait.
    pub fn seed_product_stock(&self, row: RemoteProductStock) {
        if let Ok(mut state) = self.state.lock() {
            state.product_stocks.insert(row.id, row);
        }
    }

    /// Seed a user row without going through the trait.
    pub fn seed_user(&self, row: RemoteUser) {
        if let Ok(mut state) = self.state.lock() {
            state.users.insert(row.id, row);
        }
    }

    /// Current number of rows in the `transactions` collection.
    pub fn transaction_count(&self) -> usize {
        self.state.lock().map(|s| s.transactions.len()).unwrap_or(0)
    }

    /// Current number of rows in the `on_sale_products` collection.
    pub fn sale_line_count(&self) -> usize {
        self.state.lock().map(|s| s.sale_lines.len()).unwrap_or(0)
    }

    /// Current number of rows in the `products` collection.
    pub fn product_count(&self) -> usize {
        self.state.lock().map(|s| s.products.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn list_users(&self) -> Result<Vec<RemoteUser>, StoreError> {
        self.with_state(|s| s.users.values().cloned().collect())
    }

    async fn list_categories(&self) -> Result<Vec<RemoteCategory>, StoreError> {
        self.with_state(|s| s.categories.values().cloned().collect())
    }

    async fn list_product_stocks(&self) -> Result<Vec<RemoteProductStock>, StoreError> {
        self.with_state(|s| s.product_stocks.values().cloned().collect())
    }

    async fn list_products(&self) -> Result<Vec<RemoteProduct>, StoreError> {
        self.with_state(|s| s.products.values().cloned().collect())
    }

    async fn list_transactions(&self) -> Result<Vec<RemoteTransaction>, StoreError> {
        self.with_state(|s| s.transactions.values().cloned().collect())
    }

    async fn list_sale_lines(&self) -> Result<Vec<RemoteSaleLine>, StoreError> {
        self.with_state(|s| s.sale_lines.values().cloned().collect())
    }

    async fn find_shop_config(&self) -> Result<Option<RemoteShopConfig>, StoreError> {
        self.with_state(|s| s.shop_config.clone())
    }

    async fn find_user(
        &self,
        source_id: &str,
        username: &str,
    ) -> Result<Option<RemoteUser>, StoreError> {
        self.with_state(|s| {
            s.users
                .values()
                .find(|r| r.source_id.as_deref() == Some(source_id))
                .or_else(|| {
                    s.users
                        .values()
                        .find(|r| r.username.as_deref() == Some(username))
                })
                .cloned()
        })
    }

    async fn find_category(
        &self,
        source_id: &str,
        name: &str,
    ) -> Result<Option<RemoteCategory>, StoreError> {
        self.with_state(|s| {
            s.categories
                .values()
                .find(|r| r.source_id.as_deref() == Some(source_id))
                .or_else(|| s.categories.values().find(|r| r.name.as_deref() == Some(name)))
                .cloned()
        })
    }

    async fn find_product_stock(
        &self,
        source_id: &str,
        name: &str,
    ) -> Result<Option<RemoteProductStock>, StoreError> {
        self.with_state(|s| {
            s.product_stocks
                .values()
                .find(|r| r.source_id.as_deref() == Some(source_id))
                .or_else(|| {
                    s.product_stocks
                        .values()
                        .find(|r| r.name.as_deref() == Some(name))
                })
                .cloned()
        })
    }

    async fn find_product(
        &self,
        source_id: &str,
        product_stock_id: &str,
    ) -> Result<Option<RemoteProduct>, StoreError> {
        self.with_state(|s| {
            s.products
                .values()
                .find(|r| r.source_id.as_deref() == Some(source_id))
                .or_else(|| {
                    s.products
                        .values()
                        .find(|r| r.product_id.as_deref() == Some(product_stock_id))
                })
                .cloned()
        })
    }

    async fn find_transaction(
        &self,
        source_id: &str,
    ) -> Result<Option<RemoteTransaction>, StoreError> {
        self.with_state(|s| {
            s.transactions
                .values()
                .find(|r| r.source_id.as_deref() == Some(source_id))
                .cloned()
        })
    }

    async fn find_sale_line(
        &self,
        source_id: &str,
        product_id: &str,
        transaction_id: &str,
    ) -> Result<Option<RemoteSaleLine>, StoreError> {
        self.with_state(|s| {
            s.sale_lines
                .values()
                .find(|r| r.source_id.as_deref() == Some(source_id))
                .or_else(|| {
                    s.sale_lines.values().find(|r| {
                        r.product_id.as_deref() == Some(product_id)
                            && r.transaction_id.as_deref() == Some(transaction_id)
                    })
                })
                .cloned()
        })
    }

    async fn upsert_user(&self, row: &RemoteUser) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.users.insert(row.id, row.clone());
        })
    }

    async fn upsert_category(&self, row: &RemoteCategory) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.categories.insert(row.id, row.clone());
        })
    }

    async fn upsert_product_stock(&self, row: &RemoteProductStock) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.product_stocks.insert(row.id, row.clone());
        })
    }

    async fn upsert_product(&self, row: &RemoteProduct) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.products.insert(row.id, row.clone());
        })
    }

    async fn upsert_transaction(&self, row: &RemoteTransaction) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.transactions.insert(row.id, row.clone());
        })
    }

    async fn upsert_sale_line(&self, row: &RemoteSaleLine) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.sale_lines.insert(row.id, row.clone());
        })
    }

    async fn upsert_shop_config(&self, row: &RemoteShopConfig) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.shop_config = Some(row.clone());
        })
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.users.remove(&id);
        })
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.categories.remove(&id);
        })
    }

    async fn delete_product_stock(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.product_stocks.remove(&id);
        })
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.products.remove(&id);
        })
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.transactions.remove(&id);
        })
    }

    async fn delete_sale_line(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.sale_lines.remove(&id);
        })
    }

    async fn delete_shop_config(&self, id: Uuid) -> Result<(), StoreError> {
        self.with_state(|s| {
            if s.shop_config.as_ref().is_some_and(|c| c.id == id) {
                s.shop_config = None;
            }
        })
    }

    async fn delete_sale_lines_for_transaction(
        &self,
        transaction_source_id: &str,
    ) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.sale_lines
                .retain(|_, l| l.transaction_id.as_deref() != Some(transaction_source_id));
        })
    }

    async fn delete_sale_lines_for_product(
        &self,
        product_source_id: &str,
    ) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.sale_lines
                .retain(|_, l| l.product_id.as_deref() != Some(product_source_id));
        })
    }

    async fn list_products_for_stock(
        &self,
        product_stock_source_id: &str,
    ) -> Result<Vec<RemoteProduct>, StoreError> {
        self.with_state(|s| {
            s.products
                .values()
                .filter(|p| p.product_id.as_deref() == Some(product_stock_source_id))
                .cloned()
                .collect()
        })
    }

    async fn list_product_stocks_for_category(
        &self,
        category_name: &str,
    ) -> Result<Vec<RemoteProductStock>, StoreError> {
        self.with_state(|s| {
            s.product_stocks
                .values()
                .filter(|p| p.cat.as_deref() == Some(category_name))
                .cloned()
                .collect()
        })
    }
}
