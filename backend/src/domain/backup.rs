//! Operator-triggered export and import of the local store.
//!
//! Import replays a snapshot through the same dependency order the sync
//! pass uses, so a restored store never holds a row whose parent has not
//! been written yet.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::model::{
    Category, ENTITY_SYNC_ORDER, EntityKind, Product, ProductStock, SaleLine, ShopConfig,
    Transaction, User,
};
use crate::domain::ports::{LocalStore, StoreError};

/// Serialisable dump of every local collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// All operator accounts.
    pub users: Vec<User>,
    /// All categories.
    pub categories: Vec<Category>,
    /// All transactions.
    pub transactions: Vec<Transaction>,
    /// All stock records.
    pub product_stocks: Vec<ProductStock>,
    /// All sellable products.
    pub products: Vec<Product>,
    /// All order line items.
    pub sale_lines: Vec<SaleLine>,
    /// The shop configuration, when one exists.
    pub shop_config: Option<ShopConfig>,
}

/// Export and restore the local store as a whole.
pub struct BackupService<L> {
    local: Arc<L>,
}

impl<L> BackupService<L>
where
    L: LocalStore,
{
    /// Build a service over an injected store handle.
    pub fn new(local: Arc<L>) -> Self {
        Self { local }
    }

    /// Dump every collection.
    pub async fn export(&self) -> Result<Snapshot, StoreError> {
        let snapshot = Snapshot {
            users: self.local.list_users().await?,
            categories: self.local.list_categories().await?,
            transactions: self.local.list_transactions().await?,
            product_stocks: self.local.list_product_stocks().await?,
            products: self.local.list_products().await?,
            sale_lines: self.local.list_sale_lines().await?,
            shop_config: self.local.get_shop_config().await?,
        };
        info!(
            transactions = snapshot.transactions.len(),
            products = snapshot.products.len(),
            "snapshot exported"
        );
        Ok(snapshot)
    }

    /// Replay a snapshot into the store, dependencies first.
    pub async fn import(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        for kind in ENTITY_SYNC_ORDER {
            match kind {
                EntityKind::User => {
                    for user in &snapshot.users {
                        self.local.upsert_user(user).await?;
                    }
                }
                EntityKind::Category => {
                    for category in &snapshot.categories {
                        self.local.upsert_category(category).await?;
                    }
                }
                EntityKind::Transaction => {
                    for transaction in &snapshot.transactions {
                        self.local.upsert_transaction(transaction).await?;
                    }
                }
                EntityKind::ProductStock => {
                    for stock in &snapshot.product_stocks {
                        self.local.upsert_product_stock(stock).await?;
                    }
                }
                EntityKind::Product => {
                    for product in &snapshot.products {
                        self.local.upsert_product(product).await?;
                    }
                }
                EntityKind::SaleLine => {
                    for line in &snapshot.sale_lines {
                        self.local.upsert_sale_line(line).await?;
                    }
                }
                EntityKind::ShopConfig => {
                    if let Some(config) = &snapshot.shop_config {
                        self.local.upsert_shop_config(config).await?;
                    }
                }
            }
        }
        info!(
            transactions = snapshot.transactions.len(),
            products = snapshot.products.len(),
            "snapshot imported"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::test_support::InMemoryLocalStore;

    fn populated_store() -> Arc<InMemoryLocalStore> {
        let local = Arc::new(InMemoryLocalStore::new());
        local.seed_category(Category {
            id: "CAT-1".into(),
            name: "Drinks".into(),
        });
        local.seed_product_stock(ProductStock {
            id: "PRD-1".into(),
            name: "Cola".into(),
            image: None,
            price: 2.0,
            stock: 5,
            category_id: "CAT-1".into(),
            category_name: "Drinks".into(),
        });
        local.seed_product(Product {
            id: "PRODUCT-1".into(),
            product_stock_id: "PRD-1".into(),
            sell_price: 5.0,
            created_at: Utc::now(),
        });
        local.seed_shop_config(ShopConfig {
            id: "SHOP-1".into(),
            name: "Corner Till".into(),
            tax: 0.1,
        });
        local
    }

    #[tokio::test]
    async fn export_then_import_restores_an_empty_store() {
        let source = populated_store();
        let service = BackupService::new(Arc::clone(&source));
        let snapshot = service.export().await.expect("export works");

        let restored = Arc::new(InMemoryLocalStore::new());
        BackupService::new(Arc::clone(&restored))
            .import(&snapshot)
            .await
            .expect("import works");

        let again = BackupService::new(restored)
            .export()
            .await
            .expect("re-export works");
        assert_eq!(again, snapshot);
    }

    #[tokio::test]
    async fn snapshot_serialises_to_json_and_back() {
        let service = BackupService::new(populated_store());
        let snapshot = service.export().await.expect("export works");

        let json = serde_json::to_string(&snapshot).expect("serialises");
        let parsed: Snapshot = serde_json::from_str(&json).expect("parses");
        assert_eq!(parsed, snapshot);
    }
}
