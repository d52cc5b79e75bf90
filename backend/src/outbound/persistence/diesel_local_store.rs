//! PostgreSQL-backed `LocalStore` implementation using Diesel.
//!
//! Every mutation is a single-row statement, keyed upsert or guarded
//! update, so the atomicity the port promises falls out of the database
//! rather than application-level locking.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::debug;

use crate::domain::model::{
    Category, Product, ProductStock, SaleLine, ShopConfig, Transaction, User,
};
use crate::domain::ports::{LocalStore, StoreError};

use super::models::{
    CategoryRow, ProductRow, ProductStockRow, SaleLineRow, ShopConfigRow, TransactionRow, UserRow,
    stock_from_joined,
};
use super::pool::{DbPool, PoolError};
use super::schema::{
    categories, product_stocks, products, sale_lines, shop_configs, transactions, users,
};

/// Diesel-backed implementation of the `LocalStore` port.
#[derive(Clone)]
pub struct DieselLocalStore {
    pool: DbPool,
}

impl DieselLocalStore {
    /// Create a store over the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Map pool errors to store errors. A pool that cannot hand out
/// connections means the local store is unreachable.
fn map_pool_error(error: PoolError) -> StoreError {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            StoreError::unavailable(message)
        }
    }
}

/// Map Diesel errors to store errors.
fn map_diesel_error(error: diesel::result::Error) -> StoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => StoreError::not_found("record"),
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            StoreError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            StoreError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
            StoreError::conflict(info.message().to_owned())
        }
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            StoreError::unavailable("database connection closed")
        }
        _ => StoreError::query("database error"),
    }
}

#[async_trait]
impl LocalStore for DieselLocalStore {
    async fn count_transactions(&self) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        transactions::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn count_products(&self) -> Result<i64, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        products::table
            .count()
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserRow> = users::table
            .select(UserRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<CategoryRow> = categories::table
            .select(CategoryRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn list_product_stocks(&self) -> Result<Vec<ProductStock>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<(ProductStockRow, String)> = product_stocks::table
            .inner_join(categories::table)
            .select((ProductStockRow::as_select(), categories::name))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows
            .into_iter()
            .map(|(row, category_name)| stock_from_joined(row, category_name))
            .collect())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<ProductRow> = products::table
            .select(ProductRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<TransactionRow> = transactions::table
            .select(TransactionRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Transaction::from).collect())
    }

    async fn list_sale_lines(&self) -> Result<Vec<SaleLine>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<SaleLineRow> = sale_lines::table
            .select(SaleLineRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(SaleLine::from).collect())
    }

    async fn get_shop_config(&self) -> Result<Option<ShopConfig>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ShopConfigRow> = shop_configs::table
            .select(ShopConfigRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(ShopConfig::from))
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .find(id)
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(User::from))
    }

    async fn get_category(&self, id: &str) -> Result<Option<Category>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CategoryRow> = categories::table
            .find(id)
            .select(CategoryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Category::from))
    }

    async fn get_product_stock(&self, id: &str) -> Result<Option<ProductStock>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<(ProductStockRow, String)> = product_stocks::table
            .inner_join(categories::table)
            .filter(product_stocks::id.eq(id))
            .select((ProductStockRow::as_select(), categories::name))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|(stock, category_name)| stock_from_joined(stock, category_name)))
    }

    async fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ProductRow> = products::table
            .find(id)
            .select(ProductRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Product::from))
    }

    async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<TransactionRow> = transactions::table
            .find(id)
            .select(TransactionRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Transaction::from))
    }

    async fn get_sale_line(&self, id: &str) -> Result<Option<SaleLine>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SaleLineRow> = sale_lines::table
            .find(id)
            .select(SaleLineRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(SaleLine::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::username.eq(username))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(User::from))
    }

    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<CategoryRow> = categories::table
            .filter(categories::name.eq(name))
            .select(CategoryRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Category::from))
    }

    async fn find_product_stock_by_name(
        &self,
        name: &str,
    ) -> Result<Option<ProductStock>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<(ProductStockRow, String)> = product_stocks::table
            .inner_join(categories::table)
            .filter(product_stocks::name.eq(name))
            .select((ProductStockRow::as_select(), categories::name))
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(|(stock, category_name)| stock_from_joined(stock, category_name)))
    }

    async fn find_product_by_stock(
        &self,
        product_stock_id: &str,
    ) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<ProductRow> = products::table
            .filter(products::product_stock_id.eq(product_stock_id))
            .select(ProductRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Product::from))
    }

    async fn find_sale_line_for(
        &self,
        product_id: &str,
        transaction_id: &str,
    ) -> Result<Option<SaleLine>, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<SaleLineRow> = sale_lines::table
            .filter(sale_lines::product_id.eq(product_id))
            .filter(sale_lines::transaction_id.eq(transaction_id))
            .select(SaleLineRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(SaleLine::from))
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = UserRow::from(user);
        diesel::insert_into(users::table)
            .values(&row)
            .on_conflict(users::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn upsert_category(&self, category: &Category) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = CategoryRow::from(category);
        diesel::insert_into(categories::table)
            .values(&row)
            .on_conflict(categories::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn upsert_product_stock(&self, stock: &ProductStock) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = ProductStockRow::from(stock);
        diesel::insert_into(product_stocks::table)
            .values(&row)
            .on_conflict(product_stocks::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = ProductRow::from(product);
        diesel::insert_into(products::table)
            .values(&row)
            .on_conflict(products::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn upsert_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = TransactionRow::from(transaction);
        diesel::insert_into(transactions::table)
            .values(&row)
            .on_conflict(transactions::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn upsert_sale_line(&self, line: &SaleLine) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = SaleLineRow::from(line);
        diesel::insert_into(sale_lines::table)
            .values(&row)
            .on_conflict(sale_lines::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn upsert_shop_config(&self, config: &ShopConfig) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = ShopConfigRow::from(config);
        diesel::insert_into(shop_configs::table)
            .values(&row)
            .on_conflict(shop_configs::id)
            .do_update()
            .set(&row)
            .execute(&mut conn)
            .await
            .map(|_| ())
            .map_err(map_diesel_error)
    }

    async fn adjust_stock(&self, product_stock_id: &str, delta: i32) -> Result<i32, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;

        // The guard rides in the WHERE clause so two concurrent checkouts
        // cannot both take the last unit.
        let updated: Option<i32> = diesel::update(
            product_stocks::table
                .filter(product_stocks::id.eq(product_stock_id))
                .filter((product_stocks::stock + delta).ge(0)),
        )
        .set(product_stocks::stock.eq(product_stocks::stock + delta))
        .returning(product_stocks::stock)
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

        if let Some(stock) = updated {
            return Ok(stock);
        }

        let exists: Option<String> = product_stocks::table
            .find(product_stock_id)
            .select(product_stocks::id)
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        match exists {
            Some(_) => Err(StoreError::conflict(format!(
                "stock for `{product_stock_id}` cannot go below zero"
            ))),
            None => Err(StoreError::not_found(format!(
                "product stock `{product_stock_id}`"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_report_an_unreachable_store() {
        let error = map_pool_error(PoolError::checkout("timed out"));
        assert!(error.is_unavailable());
    }

    #[test]
    fn unique_violations_map_to_conflict() {
        let error = map_diesel_error(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_owned()),
        ));
        assert!(matches!(error, StoreError::Conflict { .. }));
    }

    #[test]
    fn not_found_and_misc_errors_map_to_their_variants() {
        assert!(matches!(
            map_diesel_error(diesel::result::Error::NotFound),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            map_diesel_error(diesel::result::Error::RollbackTransaction),
            StoreError::Query { .. }
        ));
    }
}
