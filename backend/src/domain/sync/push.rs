//! Push reconciliation: propagate local rows and deletions to the remote.
//!
//! Each entity type runs in two phases. Deletion reconciliation first:
//! remote rows whose `source_id` no longer exists locally are removed,
//! cascading to dependants so the remote never holds a dangling reference.
//! Then upserts: every local row is matched against the remote (source id
//! first, natural key second), its remote id reused when a match exists,
//! and written only when the content differs. Row writes within one entity
//! type are dispatched concurrently up to the configured worker limit.

use std::collections::HashSet;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream;
use tracing::warn;

use crate::domain::model::{
    Category, EntityKind, Product, ProductStock, SaleLine, Transaction, User,
};
use crate::domain::ports::{
    LocalStore, RemoteCategory, RemoteProduct, RemoteProductStock, RemoteStore, StoreError,
};

use super::{RowError, RowOutcome, SyncError, SyncOrchestrator, SyncSummary, mapper};

impl<L, R> SyncOrchestrator<L, R>
where
    L: LocalStore,
    R: RemoteStore,
{
    pub(super) async fn push_entity(
        &self,
        kind: EntityKind,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        match kind {
            EntityKind::User => self.push_users(first_remote_contact, summary).await,
            EntityKind::Category => self.push_categories(first_remote_contact, summary).await,
            EntityKind::Transaction => self.push_transactions(first_remote_contact, summary).await,
            EntityKind::ProductStock => {
                self.push_product_stocks(first_remote_contact, summary).await
            }
            EntityKind::Product => self.push_products(first_remote_contact, summary).await,
            EntityKind::SaleLine => self.push_sale_lines(first_remote_contact, summary).await,
            EntityKind::ShopConfig => self.push_shop_config(first_remote_contact, summary).await,
        }
    }

    fn tally_push(kind: EntityKind, outcome: RowOutcome, summary: &mut SyncSummary) {
        let counts = summary.counts_mut(kind);
        match outcome {
            RowOutcome::Written => counts.pushed += 1,
            RowOutcome::Unchanged => counts.unchanged += 1,
        }
    }

    /// Deletes of already-absent rows are successes: the end state holds.
    fn settle_delete(
        kind: EntityKind,
        id: &str,
        result: Result<(), StoreError>,
        summary: &mut SyncSummary,
    ) {
        match result {
            Ok(()) | Err(StoreError::NotFound { .. }) => summary.counts_mut(kind).deleted += 1,
            Err(error) => Self::record_row_failure(kind, id, &error.into(), summary),
        }
    }

    async fn push_users(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::User;
        let remote_rows = match self.remote.list_users().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let locals = match self.local.list_users().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        let local_ids: HashSet<&str> = locals.iter().map(|u| u.id.as_str()).collect();
        for row in &remote_rows {
            let claimed = match row.source_id.as_deref() {
                Some(source_id) => local_ids.contains(source_id),
                // Legacy rows carry no source id; a natural-key match keeps
                // them alive for upsert adoption.
                None => row
                    .username
                    .as_deref()
                    .is_some_and(|username| locals.iter().any(|u| u.username == username)),
            };
            if claimed {
                continue;
            }
            let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
            let result = self.remote.delete_user(row.id).await;
            Self::settle_delete(KIND, &label, result, summary);
        }

        let results: Vec<_> = stream::iter(locals)
            .map(|user| async move { (user.id.clone(), self.push_user_row(&user).await) })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;
        for (id, result) in results {
            match result {
                Ok(outcome) => Self::tally_push(KIND, outcome, summary),
                Err(error) => Self::record_row_failure(KIND, &id, &error, summary),
            }
        }
        Ok(())
    }

    async fn push_user_row(&self, user: &User) -> Result<RowOutcome, RowError> {
        let existing = self.remote.find_user(&user.id, &user.username).await?;
        let candidate =
            mapper::user_to_remote(user, mapper::resolve_remote_id(existing.as_ref().map(|r| r.id)));
        if existing.as_ref() == Some(&candidate) {
            return Ok(RowOutcome::Unchanged);
        }
        match self.remote.upsert_user(&candidate).await {
            Ok(()) => Ok(RowOutcome::Written),
            Err(StoreError::Conflict { .. }) => {
                // Another writer landed the row first; adopt its id and
                // retry exactly once.
                let refreshed = self.remote.find_user(&user.id, &user.username).await?;
                let retry = mapper::user_to_remote(
                    user,
                    mapper::resolve_remote_id(refreshed.as_ref().map(|r| r.id)),
                );
                self.remote.upsert_user(&retry).await?;
                Ok(RowOutcome::Written)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn push_categories(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::Category;
        let remote_rows = match self.remote.list_categories().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let locals = match self.local.list_categories().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        let local_ids: HashSet<&str> = locals.iter().map(|c| c.id.as_str()).collect();
        for row in &remote_rows {
            let claimed = match row.source_id.as_deref() {
                Some(source_id) => local_ids.contains(source_id),
                None => row
                    .name
                    .as_deref()
                    .is_some_and(|name| locals.iter().any(|c| c.name == name)),
            };
            if claimed {
                continue;
            }
            let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
            let result = self.cascade_delete_category(row).await;
            Self::settle_delete(KIND, &label, result, summary);
        }

        let results: Vec<_> = stream::iter(locals)
            .map(|category| async move {
                (category.id.clone(), self.push_category_row(&category).await)
            })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;
        for (id, result) in results {
            match result {
                Ok(outcome) => Self::tally_push(KIND, outcome, summary),
                Err(error) => Self::record_row_failure(KIND, &id, &error, summary),
            }
        }
        Ok(())
    }

    /// Removing a category takes its stock rows, their products and their
    /// line items with it.
    async fn cascade_delete_category(&self, row: &RemoteCategory) -> Result<(), StoreError> {
        if let Some(name) = row.name.as_deref() {
            for stock in self.remote.list_product_stocks_for_category(name).await? {
                self.cascade_delete_product_stock(&stock).await?;
            }
        }
        self.remote.delete_category(row.id).await
    }

    async fn push_category_row(&self, category: &Category) -> Result<RowOutcome, RowError> {
        let existing = self.remote.find_category(&category.id, &category.name).await?;
        let candidate = mapper::category_to_remote(
            category,
            mapper::resolve_remote_id(existing.as_ref().map(|r| r.id)),
        );
        if existing.as_ref() == Some(&candidate) {
            return Ok(RowOutcome::Unchanged);
        }
        match self.remote.upsert_category(&candidate).await {
            Ok(()) => Ok(RowOutcome::Written),
            Err(StoreError::Conflict { .. }) => {
                let refreshed = self.remote.find_category(&category.id, &category.name).await?;
                let retry = mapper::category_to_remote(
                    category,
                    mapper::resolve_remote_id(refreshed.as_ref().map(|r| r.id)),
                );
                self.remote.upsert_category(&retry).await?;
                Ok(RowOutcome::Written)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn push_transactions(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::Transaction;
        let remote_rows = match self.remote.list_transactions().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let locals = match self.local.list_transactions().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        let local_ids: HashSet<&str> = locals.iter().map(|t| t.id.as_str()).collect();
        for row in &remote_rows {
            // Transactions have no natural key: a row without a source id
            // can never be claimed by a local record, so it is swept too.
            if row
                .source_id
                .as_deref()
                .is_some_and(|source_id| local_ids.contains(source_id))
            {
                continue;
            }
            // Line items reference the transaction by local id; take them
            // down first so the remote never dangles.
            let result = async {
                if let Some(source_id) = row.source_id.as_deref() {
                    self.remote
                        .delete_sale_lines_for_transaction(source_id)
                        .await?;
                }
                self.remote.delete_transaction(row.id).await
            }
            .await;
            let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
            Self::settle_delete(KIND, &label, result, summary);
        }

        let results: Vec<_> = stream::iter(locals)
            .map(|transaction| async move {
                (
                    transaction.id.clone(),
                    self.push_transaction_row(&transaction).await,
                )
            })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;
        for (id, result) in results {
            match result {
                Ok(outcome) => Self::tally_push(KIND, outcome, summary),
                Err(error) => Self::record_row_failure(KIND, &id, &error, summary),
            }
        }
        Ok(())
    }

    async fn push_transaction_row(
        &self,
        transaction: &Transaction,
    ) -> Result<RowOutcome, RowError> {
        let existing = self.remote.find_transaction(&transaction.id).await?;
        let candidate = mapper::transaction_to_remote(
            transaction,
            mapper::resolve_remote_id(existing.as_ref().map(|r| r.id)),
        );
        if existing.as_ref() == Some(&candidate) {
            return Ok(RowOutcome::Unchanged);
        }
        match self.remote.upsert_transaction(&candidate).await {
            Ok(()) => Ok(RowOutcome::Written),
            Err(StoreError::Conflict { .. }) => {
                let refreshed = self.remote.find_transaction(&transaction.id).await?;
                let retry = mapper::transaction_to_remote(
                    transaction,
                    mapper::resolve_remote_id(refreshed.as_ref().map(|r| r.id)),
                );
                self.remote.upsert_transaction(&retry).await?;
                Ok(RowOutcome::Written)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn push_product_stocks(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::ProductStock;
        let remote_rows = match self.remote.list_product_stocks().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let locals = match self.local.list_product_stocks().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        let local_ids: HashSet<&str> = locals.iter().map(|s| s.id.as_str()).collect();
        for row in &remote_rows {
            let claimed = match row.source_id.as_deref() {
                Some(source_id) => local_ids.contains(source_id),
                None => row
                    .name
                    .as_deref()
                    .is_some_and(|name| locals.iter().any(|s| s.name == name)),
            };
            if claimed {
                continue;
            }
            let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
            let result = self.cascade_delete_product_stock(row).await;
            Self::settle_delete(KIND, &label, result, summary);
        }

        let results: Vec<_> = stream::iter(locals)
            .map(|stock| async move { (stock.id.clone(), self.push_product_stock_row(&stock).await) })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;
        for (id, result) in results {
            match result {
                Ok(outcome) => Self::tally_push(KIND, outcome, summary),
                Err(error) => Self::record_row_failure(KIND, &id, &error, summary),
            }
        }
        Ok(())
    }

    /// Removing a stock row takes its products and their line items with it.
    async fn cascade_delete_product_stock(
        &self,
        row: &RemoteProductStock,
    ) -> Result<(), StoreError> {
        if let Some(source_id) = row.source_id.as_deref() {
            for product in self.remote.list_products_for_stock(source_id).await? {
                self.cascade_delete_product(&product).await?;
            }
        }
        self.remote.delete_product_stock(row.id).await
    }

    async fn push_product_stock_row(&self, stock: &ProductStock) -> Result<RowOutcome, RowError> {
        let existing = self.remote.find_product_stock(&stock.id, &stock.name).await?;
        let candidate = mapper::product_stock_to_remote(
            stock,
            mapper::resolve_remote_id(existing.as_ref().map(|r| r.id)),
        );
        if existing.as_ref() == Some(&candidate) {
            return Ok(RowOutcome::Unchanged);
        }
        match self.remote.upsert_product_stock(&candidate).await {
            Ok(()) => Ok(RowOutcome::Written),
            Err(StoreError::Conflict { .. }) => {
                let refreshed = self.remote.find_product_stock(&stock.id, &stock.name).await?;
                let retry = mapper::product_stock_to_remote(
                    stock,
                    mapper::resolve_remote_id(refreshed.as_ref().map(|r| r.id)),
                );
                self.remote.upsert_product_stock(&retry).await?;
                Ok(RowOutcome::Written)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn push_products(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::Product;
        let remote_rows = match self.remote.list_products().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let locals = match self.local.list_products().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        let local_ids: HashSet<&str> = locals.iter().map(|p| p.id.as_str()).collect();
        for row in &remote_rows {
            let claimed = match row.source_id.as_deref() {
                Some(source_id) => local_ids.contains(source_id),
                // The remote `product_id` column carries the local stock id.
                None => row
                    .product_id
                    .as_deref()
                    .is_some_and(|stock_id| locals.iter().any(|p| p.product_stock_id == stock_id)),
            };
            if claimed {
                continue;
            }
            let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
            let result = self.cascade_delete_product(row).await;
            Self::settle_delete(KIND, &label, result, summary);
        }

        let results: Vec<_> = stream::iter(locals)
            .map(|product| async move { (product.id.clone(), self.push_product_row(&product).await) })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;
        for (id, result) in results {
            match result {
                Ok(outcome) => Self::tally_push(KIND, outcome, summary),
                Err(error) => Self::record_row_failure(KIND, &id, &error, summary),
            }
        }
        Ok(())
    }

    /// Removing a product takes its line items with it.
    async fn cascade_delete_product(&self, row: &RemoteProduct) -> Result<(), StoreError> {
        if let Some(source_id) = row.source_id.as_deref() {
            self.remote.delete_sale_lines_for_product(source_id).await?;
        }
        self.remote.delete_product(row.id).await
    }

    async fn push_product_row(&self, product: &Product) -> Result<RowOutcome, RowError> {
        let existing = self
            .remote
            .find_product(&product.id, &product.product_stock_id)
            .await?;
        let candidate = mapper::product_to_remote(
            product,
            mapper::resolve_remote_id(existing.as_ref().map(|r| r.id)),
        );
        if existing.as_ref() == Some(&candidate) {
            return Ok(RowOutcome::Unchanged);
        }
        match self.remote.upsert_product(&candidate).await {
            Ok(()) => Ok(RowOutcome::Written),
            Err(StoreError::Conflict { .. }) => {
                let refreshed = self
                    .remote
                    .find_product(&product.id, &product.product_stock_id)
                    .await?;
                let retry = mapper::product_to_remote(
                    product,
                    mapper::resolve_remote_id(refreshed.as_ref().map(|r| r.id)),
                );
                self.remote.upsert_product(&retry).await?;
                Ok(RowOutcome::Written)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn push_sale_lines(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::SaleLine;
        let remote_rows = match self.remote.list_sale_lines().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let locals = match self.local.list_sale_lines().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        let local_ids: HashSet<&str> = locals.iter().map(|l| l.id.as_str()).collect();
        for row in &remote_rows {
            let claimed = match row.source_id.as_deref() {
                Some(source_id) => local_ids.contains(source_id),
                None => row
                    .product_id
                    .as_deref()
                    .zip(row.transaction_id.as_deref())
                    .is_some_and(|(product_id, transaction_id)| {
                        locals.iter().any(|l| {
                            l.product_id == product_id && l.transaction_id == transaction_id
                        })
                    }),
            };
            if claimed {
                continue;
            }
            let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
            let result = self.remote.delete_sale_line(row.id).await;
            Self::settle_delete(KIND, &label, result, summary);
        }

        // Owning transactions are verified once, before the pool dispatches,
        // so concurrent line writes cannot race to mint duplicate
        // placeholders for the same missing transaction.
        let mut transaction_ids: Vec<&str> =
            locals.iter().map(|l| l.transaction_id.as_str()).collect();
        transaction_ids.sort_unstable();
        transaction_ids.dedup();
        for transaction_id in transaction_ids {
            if let Err(error) = self.ensure_remote_transaction(transaction_id).await {
                warn!(
                    entity = %KIND,
                    id = %transaction_id,
                    error = %error,
                    "placeholder transaction synthesis failed"
                );
            }
        }

        let results: Vec<_> = stream::iter(locals)
            .map(|line| async move { (line.id.clone(), self.push_sale_line_row(&line).await) })
            .buffer_unordered(self.config.worker_limit)
            .collect()
            .await;
        for (id, result) in results {
            match result {
                Ok(outcome) => Self::tally_push(KIND, outcome, summary),
                Err(error) => Self::record_row_failure(KIND, &id, &error, summary),
            }
        }
        Ok(())
    }

    /// The owning transaction is pushed earlier in the pass, but its row
    /// write may have failed. A minimal placeholder keeps the line items'
    /// reference satisfiable until the full record lands.
    async fn ensure_remote_transaction(&self, transaction_id: &str) -> Result<(), StoreError> {
        if self.remote.find_transaction(transaction_id).await?.is_some() {
            return Ok(());
        }
        let placeholder = mapper::placeholder_transaction(transaction_id, Utc::now());
        self.remote.upsert_transaction(&placeholder).await
    }

    async fn push_sale_line_row(&self, line: &SaleLine) -> Result<RowOutcome, RowError> {
        let existing = self
            .remote
            .find_sale_line(&line.id, &line.product_id, &line.transaction_id)
            .await?;
        let candidate = mapper::sale_line_to_remote(
            line,
            mapper::resolve_remote_id(existing.as_ref().map(|r| r.id)),
        );
        if existing.as_ref() == Some(&candidate) {
            return Ok(RowOutcome::Unchanged);
        }
        match self.remote.upsert_sale_line(&candidate).await {
            Ok(()) => Ok(RowOutcome::Written),
            Err(StoreError::Conflict { .. }) => {
                let refreshed = self
                    .remote
                    .find_sale_line(&line.id, &line.product_id, &line.transaction_id)
                    .await?;
                let retry = mapper::sale_line_to_remote(
                    line,
                    mapper::resolve_remote_id(refreshed.as_ref().map(|r| r.id)),
                );
                self.remote.upsert_sale_line(&retry).await?;
                Ok(RowOutcome::Written)
            }
            Err(error) => Err(error.into()),
        }
    }

    async fn push_shop_config(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::ShopConfig;
        let remote_row = match self.remote.find_shop_config().await {
            Ok(row) => row,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        let local = match self.local.get_shop_config().await {
            Ok(config) => config,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };

        match (local, remote_row) {
            (None, None) => Ok(()),
            (None, Some(row)) => {
                let label = row.source_id.clone().unwrap_or_else(|| row.id.to_string());
                let result = self.remote.delete_shop_config(row.id).await;
                Self::settle_delete(KIND, &label, result, summary);
                Ok(())
            }
            (Some(config), remote_row) => {
                let candidate = mapper::shop_config_to_remote(
                    &config,
                    mapper::resolve_remote_id(remote_row.as_ref().map(|r| r.id)),
                );
                if remote_row.as_ref() == Some(&candidate) {
                    Self::tally_push(KIND, RowOutcome::Unchanged, summary);
                    return Ok(());
                }
                match self.remote.upsert_shop_config(&candidate).await {
                    Ok(()) => Self::tally_push(KIND, RowOutcome::Written, summary),
                    Err(error) => {
                        Self::record_row_failure(KIND, &config.id, &error.into(), summary);
                    }
                }
                Ok(())
            }
        }
    }
}
