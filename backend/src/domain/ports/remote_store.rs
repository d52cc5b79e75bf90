//! Port for the networked remote store, and the remote row shapes.
//!
//! Remote rows are keyed by a remote UUID and additionally carry a
//! `source_id` column holding the local primary key, which is how rows are
//! matched across stores. Reference columns (`product_id`,
//! `transaction_id`) carry local identifiers; referential integrity across
//! collections is the orchestrator's responsibility, enforced by dependency
//! ordering and placeholder synthesis rather than by remote constraints.
//!
//! Field values are optional on the read side: rows written by other
//! clients may be sparse, and the mapper reports missing required fields as
//! mapping failures instead of panicking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;

/// Remote row in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteUser {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Unique login name.
    pub username: Option<String>,
    /// Contact address.
    pub email: Option<String>,
    /// RFC 3339 verification timestamp.
    pub email_verified: Option<String>,
    /// Avatar reference.
    pub image: Option<String>,
    /// Password hash.
    pub password_hash: Option<String>,
    /// Role label.
    pub role: Option<String>,
}

/// Remote row in the `categories` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCategory {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Unique category name.
    pub name: Option<String>,
}

/// Remote row in the `product_stocks` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProductStock {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Unique product name.
    pub name: Option<String>,
    /// Product image reference.
    pub image: Option<String>,
    /// Purchase price.
    pub price: Option<f64>,
    /// Quantity on hand.
    pub stock: Option<i32>,
    /// Owning category, linked by name.
    pub cat: Option<String>,
}

/// Remote row in the `products` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Local id of the stock record this product sells.
    pub product_id: Option<String>,
    /// Selling price.
    pub sellprice: Option<f64>,
    /// RFC 3339 creation timestamp.
    pub created_at: Option<String>,
}

/// Remote row in the `transactions` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTransaction {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Final order total.
    pub total_amount: Option<f64>,
    /// RFC 3339 creation timestamp.
    pub created_at: Option<String>,
    /// Completion flag.
    pub is_complete: Option<bool>,
    /// Order channel.
    pub order_type: Option<String>,
    /// Payment method.
    pub payment_method: Option<String>,
}

/// Remote row in the `on_sale_products` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSaleLine {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Local id of the product sold.
    pub product_id: Option<String>,
    /// Quantity sold.
    pub quantity: Option<i32>,
    /// RFC 3339 sale timestamp.
    pub saledate: Option<String>,
    /// Local id of the owning transaction.
    pub transaction_id: Option<String>,
}

/// Remote row in the `shop_data` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteShopConfig {
    /// Remote primary key.
    pub id: Uuid,
    /// Local primary key of the record this row mirrors.
    pub source_id: Option<String>,
    /// Shop display name.
    pub name: Option<String>,
    /// Sales tax rate.
    pub tax: Option<f64>,
}

/// Typed accessor over the remote store's row API.
///
/// `find_*` operations resolve an existing remote row for a local record:
/// by `source_id` first, then by the entity's natural key, returning `None`
/// when neither matches. Deletes of absent rows are no-ops.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// All rows in the `users` collection.
    async fn list_users(&self) -> Result<Vec<RemoteUser>, StoreError>;

    /// All rows in the `categories` collection.
    async fn list_categories(&self) -> Result<Vec<RemoteCategory>, StoreError>;

    /// All rows in the `product_stocks` collection.
    async fn list_product_stocks(&self) -> Result<Vec<RemoteProductStock>, StoreError>;

    /// All rows in the `products` collection.
    async fn list_products(&self) -> Result<Vec<RemoteProduct>, StoreError>;

    /// All rows in the `transactions` collection.
    async fn list_transactions(&self) -> Result<Vec<RemoteTransaction>, StoreError>;

    /// All rows in the `on_sale_products` collection.
    async fn list_sale_lines(&self) -> Result<Vec<RemoteSaleLine>, StoreError>;

    /// The singleton `shop_data` row, when present.
    async fn find_shop_config(&self) -> Result<Option<RemoteShopConfig>, StoreError>;

    /// Resolve a user row by source id, falling back to username.
    async fn find_user(
        &self,
        source_id: &str,
        username: &str,
    ) -> Result<Option<RemoteUser>, StoreError>;

    /// Resolve a category row by source id, falling back to name.
    async fn find_category(
        &self,
        source_id: &str,
        name: &str,
    ) -> Result<Option<RemoteCategory>, StoreError>;

    /// Resolve a stock row by source id, falling back to product name.
    async fn find_product_stock(
        &self,
        source_id: &str,
        name: &str,
    ) -> Result<Option<RemoteProductStock>, StoreError>;

    /// Resolve a product row by source id, falling back to its stock link.
    async fn find_product(
        &self,
        source_id: &str,
        product_stock_id: &str,
    ) -> Result<Option<RemoteProduct>, StoreError>;

    /// Resolve a transaction row by source id. Transactions have no natural
    /// key.
    async fn find_transaction(
        &self,
        source_id: &str,
    ) -> Result<Option<RemoteTransaction>, StoreError>;

    /// Resolve a line-item row by source id, falling back to its
    /// (product, transaction) pair.
    async fn find_sale_line(
        &self,
        source_id: &str,
        product_id: &str,
        transaction_id: &str,
    ) -> Result<Option<RemoteSaleLine>, StoreError>;

    /// Insert or update one user row, keyed by remote id.
    async fn upsert_user(&self, row: &RemoteUser) -> Result<(), StoreError>;

    /// Insert or update one category row, keyed by remote id.
    async fn upsert_category(&self, row: &RemoteCategory) -> Result<(), StoreError>;

    /// Insert or update one stock row, keyed by remote id.
    async fn upsert_product_stock(&self, row: &RemoteProductStock) -> Result<(), StoreError>;

    /// Insert or update one product row, keyed by remote id.
    async fn upsert_product(&self, row: &RemoteProduct) -> Result<(), StoreError>;

    /// Insert or update one transaction row, keyed by remote id.
    async fn upsert_transaction(&self, row: &RemoteTransaction) -> Result<(), StoreError>;

    /// Insert or update one line-item row, keyed by remote id.
    async fn upsert_sale_line(&self, row: &RemoteSaleLine) -> Result<(), StoreError>;

    /// Insert or update the singleton shop configuration row.
    async fn upsert_shop_config(&self, row: &RemoteShopConfig) -> Result<(), StoreError>;

    /// Delete one user row by remote id.
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete one category row by remote id.
    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete one stock row by remote id.
    async fn delete_product_stock(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete one product row by remote id.
    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete one transaction row by remote id.
    async fn delete_transaction(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete one line-item row by remote id.
    async fn delete_sale_line(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete one shop configuration row by remote id.
    async fn delete_shop_config(&self, id: Uuid) -> Result<(), StoreError>;

    /// Delete every line item belonging to a transaction (by local id).
    async fn delete_sale_lines_for_transaction(
        &self,
        transaction_source_id: &str,
    ) -> Result<(), StoreError>;

    /// Delete every line item referencing a product (by local id).
    async fn delete_sale_lines_for_product(
        &self,
        product_source_id: &str,
    ) -> Result<(), StoreError>;

    /// All product rows selling a given stock record (by local id).
    async fn list_products_for_stock(
        &self,
        product_stock_source_id: &str,
    ) -> Result<Vec<RemoteProduct>, StoreError>;

    /// All stock rows linked to a category name.
    async fn list_product_stocks_for_category(
        &self,
        category_name: &str,
    ) -> Result<Vec<RemoteProductStock>, StoreError>;
}
