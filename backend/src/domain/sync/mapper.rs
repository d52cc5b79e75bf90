//! Pure translation between local and remote row shapes.
//!
//! Nothing here touches a store. Identifier resolution context (the remote
//! id to reuse, the local id to key by, the category id matching a remote
//! `cat` name) is passed in by the orchestrator, keeping every function a
//! total, side-effect-free mapping over well-formed input. Malformed input
//! fails with a [`MappingError`] naming the entity and field.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::model::{
    Category, EntityKind, Product, ProductStock, SaleLine, ShopConfig, Transaction, User,
};
use crate::domain::ports::{
    RemoteCategory, RemoteProduct, RemoteProductStock, RemoteSaleLine, RemoteShopConfig,
    RemoteTransaction, RemoteUser,
};

/// A remote or local row could not be translated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot map {entity} row: missing or invalid field `{field}`")]
pub struct MappingError {
    /// Entity type of the offending row.
    pub entity: EntityKind,
    /// Name of the missing or malformed field.
    pub field: &'static str,
}

impl MappingError {
    fn new(entity: EntityKind, field: &'static str) -> Self {
        Self { entity, field }
    }
}

/// Reuse the id of a matched remote row; mint a fresh one only when no row
/// matched. Minting unconditionally is how the original application grew
/// duplicate remote rows on every pass.
pub fn resolve_remote_id(existing: Option<Uuid>) -> Uuid {
    existing.unwrap_or_else(Uuid::new_v4)
}

fn serialise_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339()
}

fn parse_date(
    value: Option<&str>,
    entity: EntityKind,
    field: &'static str,
) -> Result<DateTime<Utc>, MappingError> {
    let raw = value.ok_or_else(|| MappingError::new(entity, field))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| MappingError::new(entity, field))
}

fn require<T: Clone>(
    value: Option<&T>,
    entity: EntityKind,
    field: &'static str,
) -> Result<T, MappingError> {
    value.cloned().ok_or_else(|| MappingError::new(entity, field))
}

/// Build the remote payload for a user.
pub fn user_to_remote(user: &User, remote_id: Uuid) -> RemoteUser {
    RemoteUser {
        id: remote_id,
        source_id: Some(user.id.clone()),
        name: Some(user.name.clone()),
        username: Some(user.username.clone()),
        email: user.email.clone(),
        email_verified: user.email_verified.map(serialise_date),
        image: user.image.clone(),
        password_hash: Some(user.password_hash.clone()),
        role: Some(user.role.clone()),
    }
}

/// Translate a remote user row to local shape, keyed by `local_id`.
pub fn user_to_local(row: &RemoteUser, local_id: String) -> Result<User, MappingError> {
    const ENTITY: EntityKind = EntityKind::User;
    let email_verified = match row.email_verified.as_deref() {
        None => None,
        some => Some(parse_date(some, ENTITY, "email_verified")?),
    };
    Ok(User {
        id: local_id,
        name: require(row.name.as_ref(), ENTITY, "name")?,
        username: require(row.username.as_ref(), ENTITY, "username")?,
        email: row.email.clone(),
        email_verified,
        image: row.image.clone(),
        password_hash: require(row.password_hash.as_ref(), ENTITY, "password_hash")?,
        role: require(row.role.as_ref(), ENTITY, "role")?,
    })
}

/// Build the remote payload for a category.
pub fn category_to_remote(category: &Category, remote_id: Uuid) -> RemoteCategory {
    RemoteCategory {
        id: remote_id,
        source_id: Some(category.id.clone()),
        name: Some(category.name.clone()),
    }
}

/// Translate a remote category row to local shape, keyed by `local_id`.
pub fn category_to_local(row: &RemoteCategory, local_id: String) -> Result<Category, MappingError> {
    Ok(Category {
        id: local_id,
        name: require(row.name.as_ref(), EntityKind::Category, "name")?,
    })
}

/// Build the remote payload for a stock record. The category linkage
/// travels by name in the remote `cat` column.
pub fn product_stock_to_remote(stock: &ProductStock, remote_id: Uuid) -> RemoteProductStock {
    RemoteProductStock {
        id: remote_id,
        source_id: Some(stock.id.clone()),
        name: Some(stock.name.clone()),
        image: stock.image.clone(),
        price: Some(stock.price),
        stock: Some(stock.stock),
        cat: Some(stock.category_name.clone()),
    }
}

/// Translate a remote stock row to local shape. `category_id` is the local
/// category matching the row's `cat` name, resolved by the caller.
pub fn product_stock_to_local(
    row: &RemoteProductStock,
    local_id: String,
    category_id: String,
) -> Result<ProductStock, MappingError> {
    const ENTITY: EntityKind = EntityKind::ProductStock;
    Ok(ProductStock {
        id: local_id,
        name: require(row.name.as_ref(), ENTITY, "name")?,
        image: row.image.clone(),
        price: require(row.price.as_ref(), ENTITY, "price")?,
        stock: require(row.stock.as_ref(), ENTITY, "stock")?,
        category_id,
        category_name: require(row.cat.as_ref(), ENTITY, "cat")?,
    })
}

/// Build the remote payload for a product. `sell_price` becomes the
/// remote `sellprice` column; the stock link travels in `product_id`.
pub fn product_to_remote(product: &Product, remote_id: Uuid) -> RemoteProduct {
    RemoteProduct {
        id: remote_id,
        source_id: Some(product.id.clone()),
        product_id: Some(product.product_stock_id.clone()),
        sellprice: Some(product.sell_price),
        created_at: Some(serialise_date(product.created_at)),
    }
}

/// Translate a remote product row to local shape, keyed by `local_id`.
pub fn product_to_local(row: &RemoteProduct, local_id: String) -> Result<Product, MappingError> {
    const ENTITY: EntityKind = EntityKind::Product;
    Ok(Product {
        id: local_id,
        product_stock_id: require(row.product_id.as_ref(), ENTITY, "product_id")?,
        sell_price: require(row.sellprice.as_ref(), ENTITY, "sellprice")?,
        created_at: parse_date(row.created_at.as_deref(), ENTITY, "created_at")?,
    })
}

/// Build the remote payload for a transaction.
pub fn transaction_to_remote(transaction: &Transaction, remote_id: Uuid) -> RemoteTransaction {
    RemoteTransaction {
        id: remote_id,
        source_id: Some(transaction.id.clone()),
        total_amount: transaction.total_amount,
        created_at: Some(serialise_date(transaction.created_at)),
        is_complete: Some(transaction.is_complete),
        order_type: Some(transaction.order_type.clone()),
        payment_method: Some(transaction.payment_method.clone()),
    }
}

/// Translate a remote transaction row to local shape, keyed by `local_id`.
pub fn transaction_to_local(
    row: &RemoteTransaction,
    local_id: String,
) -> Result<Transaction, MappingError> {
    const ENTITY: EntityKind = EntityKind::Transaction;
    Ok(Transaction {
        id: local_id,
        total_amount: row.total_amount,
        created_at: parse_date(row.created_at.as_deref(), ENTITY, "created_at")?,
        is_complete: require(row.is_complete.as_ref(), ENTITY, "is_complete")?,
        order_type: require(row.order_type.as_ref(), ENTITY, "order_type")?,
        payment_method: require(row.payment_method.as_ref(), ENTITY, "payment_method")?,
    })
}

/// Minimal stub transaction satisfying a line item's foreign key until the
/// full record arrives.
pub fn placeholder_transaction(transaction_source_id: &str, now: DateTime<Utc>) -> RemoteTransaction {
    RemoteTransaction {
        id: Uuid::new_v4(),
        source_id: Some(transaction_source_id.to_owned()),
        total_amount: None,
        created_at: Some(serialise_date(now)),
        is_complete: Some(false),
        order_type: Some("unknown".to_owned()),
        payment_method: Some("unknown".to_owned()),
    }
}

/// Local counterpart of [`placeholder_transaction`], for a pulled line item
/// whose owning transaction is missing on both sides.
pub fn placeholder_local_transaction(transaction_id: &str, now: DateTime<Utc>) -> Transaction {
    Transaction {
        id: transaction_id.to_owned(),
        total_amount: None,
        created_at: now,
        is_complete: false,
        order_type: "unknown".to_owned(),
        payment_method: "unknown".to_owned(),
    }
}

/// Build the remote payload for a line item. `sale_date` becomes the
/// remote `saledate` column.
pub fn sale_line_to_remote(line: &SaleLine, remote_id: Uuid) -> RemoteSaleLine {
    RemoteSaleLine {
        id: remote_id,
        source_id: Some(line.id.clone()),
        product_id: Some(line.product_id.clone()),
        quantity: Some(line.quantity),
        saledate: Some(serialise_date(line.sale_date)),
        transaction_id: Some(line.transaction_id.clone()),
    }
}

/// Translate a remote line-item row to local shape, keyed by `local_id`.
pub fn sale_line_to_local(row: &RemoteSaleLine, local_id: String) -> Result<SaleLine, MappingError> {
    const ENTITY: EntityKind = EntityKind::SaleLine;
    Ok(SaleLine {
        id: local_id,
        product_id: require(row.product_id.as_ref(), ENTITY, "product_id")?,
        quantity: require(row.quantity.as_ref(), ENTITY, "quantity")?,
        sale_date: parse_date(row.saledate.as_deref(), ENTITY, "saledate")?,
        transaction_id: require(row.transaction_id.as_ref(), ENTITY, "transaction_id")?,
    })
}

/// Build the remote payload for the shop configuration.
pub fn shop_config_to_remote(config: &ShopConfig, remote_id: Uuid) -> RemoteShopConfig {
    RemoteShopConfig {
        id: remote_id,
        source_id: Some(config.id.clone()),
        name: Some(config.name.clone()),
        tax: Some(config.tax),
    }
}

/// Translate the remote shop configuration row to local shape.
pub fn shop_config_to_local(
    row: &RemoteShopConfig,
    local_id: String,
) -> Result<ShopConfig, MappingError> {
    const ENTITY: EntityKind = EntityKind::ShopConfig;
    Ok(ShopConfig {
        id: local_id,
        name: require(row.name.as_ref(), ENTITY, "name")?,
        tax: require(row.tax.as_ref(), ENTITY, "tax")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn sample_product() -> Product {
        Product {
            id: "PRODUCT-1a2b3c4d".to_owned(),
            product_stock_id: "PRD-9f8e7d6c".to_owned(),
            sell_price: 5.0,
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).single().expect("valid date"),
        }
    }

    #[rstest]
    fn product_field_names_are_renamed_on_push() {
        let remote_id = Uuid::new_v4();
        let row = product_to_remote(&sample_product(), remote_id);

        assert_eq!(row.id, remote_id);
        assert_eq!(row.source_id.as_deref(), Some("PRODUCT-1a2b3c4d"));
        assert_eq!(row.product_id.as_deref(), Some("PRD-9f8e7d6c"));
        assert_eq!(row.sellprice, Some(5.0));
        assert_eq!(row.created_at.as_deref(), Some("2026-03-14T09:30:00+00:00"));
    }

    #[rstest]
    fn product_round_trips_through_remote_shape() {
        let product = sample_product();
        let row = product_to_remote(&product, Uuid::new_v4());
        let back = product_to_local(&row, product.id.clone()).expect("maps back");
        assert_eq!(back, product);
    }

    #[rstest]
    fn missing_required_field_names_entity_and_field() {
        let row = RemoteProduct {
            id: Uuid::new_v4(),
            source_id: Some("PRODUCT-1".to_owned()),
            product_id: None,
            sellprice: Some(5.0),
            created_at: Some("2026-03-14T09:30:00+00:00".to_owned()),
        };

        let err = product_to_local(&row, "PRODUCT-1".to_owned()).expect_err("missing stock link");
        assert_eq!(err.entity, EntityKind::Product);
        assert_eq!(err.field, "product_id");
        assert!(err.to_string().contains("product_id"));
    }

    #[rstest]
    fn malformed_dates_are_mapping_errors_not_panics() {
        let row = RemoteTransaction {
            id: Uuid::new_v4(),
            source_id: Some("TRX-1".to_owned()),
            total_amount: Some(10.0),
            created_at: Some("not-a-date".to_owned()),
            is_complete: Some(true),
            order_type: Some("dine_in".to_owned()),
            payment_method: Some("cash".to_owned()),
        };

        let err = transaction_to_local(&row, "TRX-1".to_owned()).expect_err("bad date");
        assert_eq!(err.field, "created_at");
    }

    #[rstest]
    fn remote_id_is_reused_when_a_row_matched() {
        let existing = Uuid::new_v4();
        assert_eq!(resolve_remote_id(Some(existing)), existing);
    }

    #[rstest]
    fn remote_id_is_minted_only_without_a_match() {
        let a = resolve_remote_id(None);
        let b = resolve_remote_id(None);
        assert_ne!(a, b);
    }

    #[rstest]
    fn stock_category_linkage_travels_by_name() {
        let stock = ProductStock {
            id: "PRD-1".to_owned(),
            name: "Kopi Susu".to_owned(),
            image: None,
            price: 2.5,
            stock: 40,
            category_id: "CAT-1".to_owned(),
            category_name: "Drinks".to_owned(),
        };

        let row = product_stock_to_remote(&stock, Uuid::new_v4());
        assert_eq!(row.cat.as_deref(), Some("Drinks"));

        let back = product_stock_to_local(&row, "PRD-1".to_owned(), "CAT-1".to_owned())
            .expect("maps back");
        assert_eq!(back, stock);
    }

    #[rstest]
    fn placeholder_transaction_is_minimal_and_incomplete() {
        let row = placeholder_transaction("TRX-77", Utc::now());
        assert_eq!(row.source_id.as_deref(), Some("TRX-77"));
        assert_eq!(row.is_complete, Some(false));
        assert_eq!(row.total_amount, None);
    }

    #[rstest]
    fn user_without_verified_email_maps_cleanly() {
        let row = RemoteUser {
            id: Uuid::new_v4(),
            source_id: Some("USR-1".to_owned()),
            name: Some("Ana".to_owned()),
            username: Some("ana".to_owned()),
            email: None,
            email_verified: None,
            image: None,
            password_hash: Some("argon2id$...".to_owned()),
            role: Some("cashier".to_owned()),
        };

        let user = user_to_local(&row, "USR-1".to_owned()).expect("maps");
        assert_eq!(user.email_verified, None);
        assert_eq!(user.username, "ana");
    }
}
