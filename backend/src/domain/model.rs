//! Point-of-sale entity types shared by the sync core and its collaborators.
//!
//! Identifiers are store-local opaque strings. The same value identifies a
//! record in both stores once it has been synchronised; the remote store
//! additionally keys rows by a remote UUID (see the remote DTOs in the
//! outbound layer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The seven entity types participating in synchronisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Registered operator accounts.
    User,
    /// Product categories.
    Category,
    /// Sales transactions (orders).
    Transaction,
    /// Stock-keeping records.
    ProductStock,
    /// Sellable records, one per stock entry.
    Product,
    /// Order line items.
    SaleLine,
    /// Singleton shop configuration.
    ShopConfig,
}

impl EntityKind {
    /// Stable lowercase name used in logs and summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Category => "category",
            Self::Transaction => "transaction",
            Self::ProductStock => "product_stock",
            Self::Product => "product",
            Self::SaleLine => "sale_line",
            Self::ShopConfig => "shop_config",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Foreign-key-respecting processing order.
///
/// Writes to a dependent type must not be attempted before its dependencies
/// have been reconciled. Sync passes and backup import both iterate this
/// constant; it is the single ordering contract between the two paths.
pub const ENTITY_SYNC_ORDER: [EntityKind; 7] = [
    EntityKind::User,
    EntityKind::Category,
    EntityKind::Transaction,
    EntityKind::ProductStock,
    EntityKind::Product,
    EntityKind::SaleLine,
    EntityKind::ShopConfig,
];

/// Operator account. Matched across stores by id, falling back to the
/// unique username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Primary key, stable across stores.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique login name; the natural key.
    pub username: String,
    /// Optional contact address.
    pub email: Option<String>,
    /// When the address was verified, if ever.
    pub email_verified: Option<DateTime<Utc>>,
    /// Optional avatar reference.
    pub image: Option<String>,
    /// Password hash; never a plaintext password.
    pub password_hash: String,
    /// Coarse role label, e.g. `admin` or `cashier`.
    pub role: String,
}

/// Product category. Matched across stores by unique name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Primary key.
    pub id: String,
    /// Unique category name; the natural key.
    pub name: String,
}

/// Stock-keeping record for one product. Matched across stores by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductStock {
    /// Primary key.
    pub id: String,
    /// Unique product name; the natural key.
    pub name: String,
    /// Optional product image reference.
    pub image: Option<String>,
    /// Purchase price.
    pub price: f64,
    /// Integer quantity on hand; never negative.
    pub stock: i32,
    /// Owning category.
    pub category_id: String,
    /// Category name carried from the relation include; the remote store
    /// links stock to category by name.
    pub category_name: String,
}

/// Sellable record for one stock entry (1:1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Primary key.
    pub id: String,
    /// The stock entry this product sells; unique per product.
    pub product_stock_id: String,
    /// Selling price.
    pub sell_price: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A sales transaction. Has no natural key; cross-store matching uses the
/// source id carried on the remote row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Primary key.
    pub id: String,
    /// Final order total; unset while the order is in progress.
    pub total_amount: Option<f64>,
    /// When the order was started.
    pub created_at: DateTime<Utc>,
    /// True once checkout has finalised the order.
    pub is_complete: bool,
    /// Order channel, e.g. `dine_in` or `takeaway`.
    pub order_type: String,
    /// Payment method recorded at checkout.
    pub payment_method: String,
}

/// Order line item: one row per (product, transaction) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    /// Primary key.
    pub id: String,
    /// The product sold.
    pub product_id: String,
    /// Quantity sold; re-adding a product to the same transaction updates
    /// this rather than inserting a second row.
    pub quantity: i32,
    /// When the line was recorded.
    pub sale_date: DateTime<Utc>,
    /// The owning transaction.
    pub transaction_id: String,
}

/// Singleton shop configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    /// Primary key.
    pub id: String,
    /// Shop display name.
    pub name: String,
    /// Sales tax rate applied at checkout.
    pub tax: f64,
}

/// Mint a line-item id in the original application's `ONSALE-` convention.
pub fn mint_sale_line_id() -> String {
    format!("ONSALE-{}", short_suffix())
}

/// Mint a transaction id for new orders and for placeholder rows
/// synthesised during sync.
pub fn mint_transaction_id() -> String {
    format!("TRX-{}", short_suffix())
}

/// Mint a stock id in the original application's `PRD-` convention.
pub fn mint_product_stock_id() -> String {
    format!("PRD-{}", short_suffix())
}

/// Mint a product id in the original application's `PRODUCT-` convention.
pub fn mint_product_id() -> String {
    format!("PRODUCT-{}", short_suffix())
}

fn short_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn sync_order_places_dependencies_first() {
        let position = |kind: EntityKind| {
            ENTITY_SYNC_ORDER
                .iter()
                .position(|k| *k == kind)
                .expect("kind present in order")
        };

        assert!(position(EntityKind::Category) < position(EntityKind::ProductStock));
        assert!(position(EntityKind::ProductStock) < position(EntityKind::Product));
        assert!(position(EntityKind::Product) < position(EntityKind::SaleLine));
        assert!(position(EntityKind::Transaction) < position(EntityKind::SaleLine));
    }

    #[rstest]
    fn sync_order_covers_every_kind_once() {
        let mut seen = std::collections::BTreeSet::new();
        for kind in ENTITY_SYNC_ORDER {
            assert!(seen.insert(kind), "{kind} listed twice");
        }
        assert_eq!(seen.len(), 7);
    }

    #[rstest]
    fn minted_line_ids_use_the_onsale_prefix() {
        let id = mint_sale_line_id();
        assert!(id.starts_with("ONSALE-"));
        assert_eq!(id.len(), "ONSALE-".len() + 8);
    }

    #[rstest]
    fn minted_ids_are_unique() {
        assert_ne!(mint_sale_line_id(), mint_sale_line_id());
        assert_ne!(mint_transaction_id(), mint_transaction_id());
        assert_ne!(mint_product_id(), mint_product_stock_id());
    }
}
