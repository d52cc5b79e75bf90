//! Order placement over the local store.
//!
//! The stock invariant lives here: adding a product to an order is checked
//! against the quantity the order already holds, and an over-limit add is
//! rejected before anything is written. Checkout decrements stock through
//! the store's guarded adjustment, so stock can never go below zero even
//! if two terminals race.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::model::{
    SaleLine, Transaction, mint_sale_line_id, mint_transaction_id,
};
use crate::domain::ports::{LocalStore, StoreError};

/// Order placement failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// The referenced transaction does not exist.
    #[error("unknown transaction `{id}`")]
    UnknownTransaction {
        /// Requested transaction id.
        id: String,
    },
    /// The transaction has already been completed.
    #[error("transaction `{id}` is already complete")]
    TransactionComplete {
        /// Requested transaction id.
        id: String,
    },
    /// The referenced product does not exist.
    #[error("unknown product `{id}`")]
    UnknownProduct {
        /// Requested product id.
        id: String,
    },
    /// The add would exceed the available stock.
    #[error("insufficient stock for `{product_id}`: {available} available, {requested} requested")]
    InsufficientStock {
        /// Product whose stock ran out.
        product_id: String,
        /// Units currently on hand.
        available: i32,
        /// Units the order would hold after the add.
        requested: i32,
    },
    /// The local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coordinates in-progress orders against the local store.
pub struct OrderService<L> {
    local: Arc<L>,
}

impl<L> OrderService<L>
where
    L: LocalStore,
{
    /// Build a service over an injected store handle.
    pub fn new(local: Arc<L>) -> Self {
        Self { local }
    }

    /// Open a new order.
    pub async fn start_order(
        &self,
        order_type: &str,
        payment_method: &str,
    ) -> Result<Transaction, OrderError> {
        let transaction = Transaction {
            id: mint_transaction_id(),
            total_amount: None,
            created_at: Utc::now(),
            is_complete: false,
            order_type: order_type.to_owned(),
            payment_method: payment_method.to_owned(),
        };
        self.local.upsert_transaction(&transaction).await?;
        info!(transaction = %transaction.id, order_type, "order started");
        Ok(transaction)
    }

    /// Add `quantity` units of a product to an in-progress order.
    ///
    /// Re-adding a product already on the order raises that line's quantity
    /// rather than inserting a second line. The accumulated quantity is
    /// checked against stock before any write; a rejected add leaves both
    /// the order and the stock untouched.
    pub async fn add_item(
        &self,
        transaction_id: &str,
        product_id: &str,
        quantity: i32,
    ) -> Result<SaleLine, OrderError> {
        let transaction = self
            .local
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| OrderError::UnknownTransaction {
                id: transaction_id.to_owned(),
            })?;
        if transaction.is_complete {
            return Err(OrderError::TransactionComplete {
                id: transaction_id.to_owned(),
            });
        }

        let product = self
            .local
            .get_product(product_id)
            .await?
            .ok_or_else(|| OrderError::UnknownProduct {
                id: product_id.to_owned(),
            })?;
        let stock = self
            .local
            .get_product_stock(&product.product_stock_id)
            .await?
            .ok_or_else(|| OrderError::UnknownProduct {
                id: product.product_stock_id.clone(),
            })?;

        let existing = self
            .local
            .find_sale_line_for(product_id, transaction_id)
            .await?;
        let accumulated = existing.as_ref().map_or(0, |l| l.quantity) + quantity;
        if accumulated > stock.stock {
            return Err(OrderError::InsufficientStock {
                product_id: product_id.to_owned(),
                available: stock.stock,
                requested: accumulated,
            });
        }

        let line = SaleLine {
            id: existing.map_or_else(mint_sale_line_id, |l| l.id),
            product_id: product_id.to_owned(),
            quantity: accumulated,
            sale_date: Utc::now(),
            transaction_id: transaction_id.to_owned(),
        };
        self.local.upsert_sale_line(&line).await?;
        Ok(line)
    }

    /// Finalise an order: set its total, mark it complete and decrement
    /// stock for every line.
    pub async fn complete_transaction(
        &self,
        transaction_id: &str,
        payment_method: &str,
    ) -> Result<Transaction, OrderError> {
        let transaction = self
            .local
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| OrderError::UnknownTransaction {
                id: transaction_id.to_owned(),
            })?;
        if transaction.is_complete {
            return Err(OrderError::TransactionComplete {
                id: transaction_id.to_owned(),
            });
        }

        let lines: Vec<_> = self
            .local
            .list_sale_lines()
            .await?
            .into_iter()
            .filter(|l| l.transaction_id == transaction_id)
            .collect();

        let mut total = 0.0;
        let mut applied: Vec<(String, i32)> = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = match self.local.get_product(&line.product_id).await? {
                Some(product) => product,
                None => {
                    self.restore_stock(&applied).await;
                    return Err(OrderError::UnknownProduct {
                        id: line.product_id.clone(),
                    });
                }
            };
            total += product.sell_price * f64::from(line.quantity);
            if let Err(error) = self
                .local
                .adjust_stock(&product.product_stock_id, -line.quantity)
                .await
            {
                // A concurrent sale starved this line; put the earlier
                // decrements back so a retry starts from a clean slate.
                self.restore_stock(&applied).await;
                return Err(error.into());
            }
            applied.push((product.product_stock_id, line.quantity));
        }

        let completed = Transaction {
            total_amount: Some(total),
            is_complete: true,
            payment_method: payment_method.to_owned(),
            ..transaction
        };
        self.local.upsert_transaction(&completed).await?;
        info!(
            transaction = %completed.id,
            total,
            lines = lines.len(),
            "order completed"
        );
        Ok(completed)
    }

    /// Undo stock decrements from a checkout that failed partway.
    async fn restore_stock(&self, applied: &[(String, i32)]) {
        for (stock_id, quantity) in applied {
            if let Err(error) = self.local.adjust_stock(stock_id, *quantity).await {
                warn!(
                    stock = %stock_id,
                    quantity,
                    error = %error,
                    "stock restore failed after aborted checkout"
                );
            }
        }
    }
}
