//! Port for the embedded local store.
//!
//! The [`LocalStore`] trait is the typed accessor the sync core and its
//! collaborators use in place of raw queries. Adapters implement it over the
//! embedded relational database; tests substitute mocks or the in-memory
//! fixture store.

use async_trait::async_trait;

use crate::domain::model::{
    Category, Product, ProductStock, SaleLine, ShopConfig, Transaction, User,
};

use super::StoreError;

/// Typed accessor over the embedded local database.
///
/// Every mutation is an individually atomic single-row write, so concurrent
/// readers never observe a partially constructed row. Relation includes are
/// folded into the returned domain types (`ProductStock` carries its
/// category name).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Number of transactions recorded locally. Zero together with a zero
    /// product count marks an unbootstrapped store.
    async fn count_transactions(&self) -> Result<i64, StoreError>;

    /// Number of sellable products recorded locally.
    async fn count_products(&self) -> Result<i64, StoreError>;

    /// All users.
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    /// All categories.
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;

    /// All stock records, with the owning category name included.
    async fn list_product_stocks(&self) -> Result<Vec<ProductStock>, StoreError>;

    /// All sellable products.
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;

    /// All transactions.
    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    /// All order line items.
    async fn list_sale_lines(&self) -> Result<Vec<SaleLine>, StoreError>;

    /// The singleton shop configuration, when one has been recorded.
    async fn get_shop_config(&self) -> Result<Option<ShopConfig>, StoreError>;

    /// Look up one user by primary key.
    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Look up one category by primary key.
    async fn get_category(&self, id: &str) -> Result<Option<Category>, StoreError>;

    /// Look up one stock record by primary key.
    async fn get_product_stock(&self, id: &str) -> Result<Option<ProductStock>, StoreError>;

    /// Look up one product by primary key.
    async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError>;

    /// Look up one transaction by primary key.
    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError>;

    /// Look up one line item by primary key.
    async fn get_sale_line(&self, id: &str) -> Result<Option<SaleLine>, StoreError>;

    /// Natural-key lookup: user by unique username.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Natural-key lookup: category by unique name.
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError>;

    /// Natural-key lookup: stock record by unique product name.
    async fn find_product_stock_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProductStock>, StoreError>;

    /// Natural-key lookup: the product selling a given stock record.
    async fn find_product_by_stock(
        &self,
        product_stock_id: &str,
    ) -> Result<Option<Product>, StoreError>;

    /// The unique line item for a (product, transaction) pair, if present.
    async fn find_sale_line_for(
        &self,
        product_id: &str,
        transaction_id: &str,
    ) -> Result<Option<SaleLine>, StoreError>;

    /// Insert or update one user, keyed by primary key.
    async fn upsert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Insert or update one category, keyed by primary key.
    async fn upsert_category(&self, category: &Category) -> Result<(), StoreError>;

    /// Insert or update one stock record, keyed by primary key.
    async fn upsert_product_stock(&self, stock: &ProductStock) -> Result<(), StoreError>;

    /// Insert or update one product, keyed by primary key.
    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Insert or update one transaction, keyed by primary key.
    async fn upsert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Insert or update one line item, keyed by primary key.
    async fn upsert_sale_line(&self, line: &SaleLine) -> Result<(), StoreError>;

    /// Insert or update the singleton shop configuration.
    async fn upsert_shop_config(&self, config: &ShopConfig) -> Result<(), StoreError>;

    /// Adjust a stock level by `delta`, refusing adjustments that would take
    /// the level below zero. Returns the new level.
    async fn adjust_stock(&self, product_stock_id: &str, delta: i32) -> Result<i32, StoreError>;
}
