//! Row types bridging Diesel and the domain model.
//!
//! Each row type derives both query and insert support so upserts reuse one
//! struct. `ProductStock` is the only asymmetric case: its domain type
//! carries the category name, which lives in the `categories` table and is
//! joined in at read time.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::model::{
    Category, Product, ProductStock, SaleLine, ShopConfig, Transaction, User,
};

use super::schema::{
    categories, product_stocks, products, sale_lines, shop_configs, transactions, users,
};

/// Row in `users`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserRow {
    /// Primary key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Unique login name.
    pub username: String,
    /// Optional contact address.
    pub email: Option<String>,
    /// When the address was verified, if ever.
    pub email_verified: Option<DateTime<Utc>>,
    /// Optional avatar reference.
    pub image: Option<String>,
    /// Password hash.
    pub password_hash: String,
    /// Coarse role label.
    pub role: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            username: row.username,
            email: row.email,
            email_verified: row.email_verified,
            image: row.image,
            password_hash: row.password_hash,
            role: row.role,
        }
    }
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            email_verified: user.email_verified,
            image: user.image.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role.clone(),
        }
    }
}

/// Row in `categories`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = categories)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CategoryRow {
    /// Primary key.
    pub id: String,
    /// Unique category name.
    pub name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

impl From<&Category> for CategoryRow {
    fn from(category: &Category) -> Self {
        Self {
            id: category.id.clone(),
            name: category.name.clone(),
        }
    }
}

/// Row in `product_stocks`. The owning category name is joined in at read
/// time; see [`stock_from_joined`].
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = product_stocks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductStockRow {
    /// Primary key.
    pub id: String,
    /// Unique product name.
    pub name: String,
    /// Optional product image reference.
    pub image: Option<String>,
    /// Purchase price.
    pub price: f64,
    /// Units on hand.
    pub stock: i32,
    /// Owning category.
    pub category_id: String,
}

impl From<&ProductStock> for ProductStockRow {
    fn from(stock: &ProductStock) -> Self {
        Self {
            id: stock.id.clone(),
            name: stock.name.clone(),
            image: stock.image.clone(),
            price: stock.price,
            stock: stock.stock,
            category_id: stock.category_id.clone(),
        }
    }
}

/// Fold a joined (stock row, category name) pair into the domain type.
pub fn stock_from_joined(row: ProductStockRow, category_name: String) -> ProductStock {
    ProductStock {
        id: row.id,
        name: row.name,
        image: row.image,
        price: row.price,
        stock: row.stock,
        category_id: row.category_id,
        category_name,
    }
}

/// Row in `products`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductRow {
    /// Primary key.
    pub id: String,
    /// The stock entry this product sells.
    pub product_stock_id: String,
    /// Selling price.
    pub sell_price: f64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            product_stock_id: row.product_stock_id,
            sell_price: row.sell_price,
            created_at: row.created_at,
        }
    }
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            product_stock_id: product.product_stock_id.clone(),
            sell_price: product.sell_price,
            created_at: product.created_at,
        }
    }
}

/// Row in `transactions`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransactionRow {
    /// Primary key.
    pub id: String,
    /// Final order total.
    pub total_amount: Option<f64>,
    /// When the order was started.
    pub created_at: DateTime<Utc>,
    /// True once checkout has finalised the order.
    pub is_complete: bool,
    /// Order channel.
    pub order_type: String,
    /// Payment method recorded at checkout.
    pub payment_method: String,
}

impl From<TransactionRow> for Transaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            total_amount: row.total_amount,
            created_at: row.created_at,
            is_complete: row.is_complete,
            order_type: row.order_type,
            payment_method: row.payment_method,
        }
    }
}

impl From<&Transaction> for TransactionRow {
    fn from(transaction: &Transaction) -> Self {
        Self {
            id: transaction.id.clone(),
            total_amount: transaction.total_amount,
            created_at: transaction.created_at,
            is_complete: transaction.is_complete,
            order_type: transaction.order_type.clone(),
            payment_method: transaction.payment_method.clone(),
        }
    }
}

/// Row in `sale_lines`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = sale_lines)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SaleLineRow {
    /// Primary key.
    pub id: String,
    /// The product sold.
    pub product_id: String,
    /// Quantity sold.
    pub quantity: i32,
    /// When the line was recorded.
    pub sale_date: DateTime<Utc>,
    /// The owning transaction.
    pub transaction_id: String,
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            sale_date: row.sale_date,
            transaction_id: row.transaction_id,
        }
    }
}

impl From<&SaleLine> for SaleLineRow {
    fn from(line: &SaleLine) -> Self {
        Self {
            id: line.id.clone(),
            product_id: line.product_id.clone(),
            quantity: line.quantity,
            sale_date: line.sale_date,
            transaction_id: line.transaction_id.clone(),
        }
    }
}

/// Row in `shop_configs`.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = shop_configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ShopConfigRow {
    /// Primary key.
    pub id: String,
    /// Shop display name.
    pub name: String,
    /// Sales tax rate.
    pub tax: f64,
}

impl From<ShopConfigRow> for ShopConfig {
    fn from(row: ShopConfigRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            tax: row.tax,
        }
    }
}

impl From<&ShopConfig> for ShopConfigRow {
    fn from(config: &ShopConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            tax: config.tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn stock_join_folds_category_name_into_the_domain_type() {
        let row = ProductStockRow {
            id: "PRD-1".into(),
            name: "Cola".into(),
            image: None,
            price: 2.0,
            stock: 6,
            category_id: "CAT-1".into(),
        };
        let stock = stock_from_joined(row, "Drinks".into());
        assert_eq!(stock.category_name, "Drinks");
        assert_eq!(stock.category_id, "CAT-1");
    }

    #[test]
    fn transaction_round_trips_through_its_row() {
        let transaction = Transaction {
            id: "TRX-1".into(),
            total_amount: Some(12.5),
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).single().expect("valid"),
            is_complete: true,
            order_type: "takeaway".into(),
            payment_method: "card".into(),
        };
        let row = TransactionRow::from(&transaction);
        assert_eq!(Transaction::from(row), transaction);
    }
}
