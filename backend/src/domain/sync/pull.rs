//! Pull reconciliation: hydrate an empty local store from the remote.
//!
//! Each entity type is fetched as a full remote collection and replayed row
//! by row. The local id for a row is resolved in a fixed chain: the
//! `source_id` the remote row carries, then a local natural-key match, and
//! only then a freshly minted id. Rows whose local content already matches
//! are counted as unchanged and not rewritten, so repeated pulls converge.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::model::{self, EntityKind};
use crate::domain::ports::{
    LocalStore, RemoteCategory, RemoteProduct, RemoteProductStock, RemoteSaleLine,
    RemoteShopConfig, RemoteStore, RemoteTransaction, RemoteUser, StoreError,
};

use super::{RowError, RowOutcome, SyncError, SyncOrchestrator, SyncSummary, mapper};

impl<L, R> SyncOrchestrator<L, R>
where
    L: LocalStore,
    R: RemoteStore,
{
    pub(super) async fn pull_entity(
        &self,
        kind: EntityKind,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        match kind {
            EntityKind::User => self.pull_users(first_remote_contact, summary).await,
            EntityKind::Category => self.pull_categories(first_remote_contact, summary).await,
            EntityKind::Transaction => self.pull_transactions(first_remote_contact, summary).await,
            EntityKind::ProductStock => {
                self.pull_product_stocks(first_remote_contact, summary).await
            }
            EntityKind::Product => self.pull_products(first_remote_contact, summary).await,
            EntityKind::SaleLine => self.pull_sale_lines(first_remote_contact, summary).await,
            EntityKind::ShopConfig => self.pull_shop_config(first_remote_contact, summary).await,
        }
    }

    fn tally_pull(kind: EntityKind, outcome: RowOutcome, summary: &mut SyncSummary) {
        let counts = summary.counts_mut(kind);
        match outcome {
            RowOutcome::Written => counts.pulled += 1,
            RowOutcome::Unchanged => counts.unchanged += 1,
        }
    }

    async fn pull_users(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::User;
        let rows = match self.remote.list_users().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        for row in rows {
            match self.pull_user_row(&row).await {
                Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
                Err(error) => {
                    Self::record_row_failure(KIND, &row.id.to_string(), &error, summary);
                }
            }
        }
        Ok(())
    }

    async fn pull_user_row(&self, row: &RemoteUser) -> Result<RowOutcome, RowError> {
        let local_id = match row.source_id.clone() {
            Some(id) => id,
            None => {
                let matched = match row.username.as_deref() {
                    Some(username) => self
                        .local
                        .find_user_by_username(username)
                        .await?
                        .map(|u| u.id),
                    None => None,
                };
                matched.unwrap_or_else(|| Uuid::new_v4().to_string())
            }
        };
        let user = mapper::user_to_local(row, local_id)?;
        if self.local.get_user(&user.id).await?.as_ref() == Some(&user) {
            return Ok(RowOutcome::Unchanged);
        }
        self.local.upsert_user(&user).await?;
        Ok(RowOutcome::Written)
    }

    async fn pull_categories(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::Category;
        let rows = match self.remote.list_categories().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        for row in rows {
            match self.pull_category_row(&row).await {
                Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
                Err(error) => {
                    Self::record_row_failure(KIND, &row.id.to_string(), &error, summary);
                }
            }
        }
        Ok(())
    }

    async fn pull_category_row(&self, row: &RemoteCategory) -> Result<RowOutcome, RowError> {
        let local_id = match row.source_id.clone() {
            Some(id) => id,
            None => {
                let matched = match row.name.as_deref() {
                    Some(name) => self.local.find_category_by_name(name).await?.map(|c| c.id),
                    None => None,
                };
                matched.unwrap_or_else(|| Uuid::new_v4().to_string())
            }
        };
        let category = mapper::category_to_local(row, local_id)?;
        if self.local.get_category(&category.id).await?.as_ref() == Some(&category) {
            return Ok(RowOutcome::Unchanged);
        }
        self.local.upsert_category(&category).await?;
        Ok(RowOutcome::Written)
    }

    async fn pull_transactions(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::Transaction;
        let rows = match self.remote.list_transactions().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        for row in rows {
            match self.pull_transaction_row(&row).await {
                Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
                Err(error) => {
                    Self::record_row_failure(KIND, &row.id.to_string(), &error, summary);
                }
            }
        }
        Ok(())
    }

    async fn pull_transaction_row(&self, row: &RemoteTransaction) -> Result<RowOutcome, RowError> {
        // Transactions carry no natural key, so a row without a source id
        // can only become a new local record.
        let local_id = row
            .source_id
            .clone()
            .unwrap_or_else(model::mint_transaction_id);
        let transaction = mapper::transaction_to_local(row, local_id)?;
        if self.local.get_transaction(&transaction.id).await?.as_ref() == Some(&transaction) {
            return Ok(RowOutcome::Unchanged);
        }
        self.local.upsert_transaction(&transaction).await?;
        Ok(RowOutcome::Written)
    }

    async fn pull_product_stocks(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::ProductStock;
        let rows = match self.remote.list_product_stocks().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        for row in rows {
            match self.pull_product_stock_row(&row).await {
                Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
                Err(error) => {
                    Self::record_row_failure(KIND, &row.id.to_string(), &error, summary);
                }
            }
        }
        Ok(())
    }

    async fn pull_product_stock_row(
        &self,
        row: &RemoteProductStock,
    ) -> Result<RowOutcome, RowError> {
        let local_id = match row.source_id.clone() {
            Some(id) => id,
            None => {
                let matched = match row.name.as_deref() {
                    Some(name) => self
                        .local
                        .find_product_stock_by_name(name)
                        .await?
                        .map(|s| s.id),
                    None => None,
                };
                matched.unwrap_or_else(model::mint_product_stock_id)
            }
        };
        // The remote links stock to category by name; resolve it against the
        // categories pulled earlier in this pass.
        let category_name = row
            .cat
            .clone()
            .ok_or(mapper::MappingError {
                entity: EntityKind::ProductStock,
                field: "cat",
            })?;
        let category = self
            .local
            .find_category_by_name(&category_name)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("category `{category_name}`")))?;
        let stock = mapper::product_stock_to_local(row, local_id, category.id)?;
        if self.local.get_product_stock(&stock.id).await?.as_ref() == Some(&stock) {
            return Ok(RowOutcome::Unchanged);
        }
        self.local.upsert_product_stock(&stock).await?;
        Ok(RowOutcome::Written)
    }

    async fn pull_products(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::Product;
        let rows = match self.remote.list_products().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        for row in rows {
            match self.pull_product_row(&row).await {
                Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
                Err(error) => {
                    Self::record_row_failure(KIND, &row.id.to_string(), &error, summary);
                }
            }
        }
        Ok(())
    }

    async fn pull_product_row(&self, row: &RemoteProduct) -> Result<RowOutcome, RowError> {
        let local_id = match row.source_id.clone() {
            Some(id) => id,
            None => {
                let matched = match row.product_id.as_deref() {
                    Some(stock_id) => self
                        .local
                        .find_product_by_stock(stock_id)
                        .await?
                        .map(|p| p.id),
                    None => None,
                };
                matched.unwrap_or_else(model::mint_product_id)
            }
        };
        let product = mapper::product_to_local(row, local_id)?;
        if self.local.get_product(&product.id).await?.as_ref() == Some(&product) {
            return Ok(RowOutcome::Unchanged);
        }
        self.local.upsert_product(&product).await?;
        Ok(RowOutcome::Written)
    }

    async fn pull_sale_lines(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::SaleLine;
        let rows = match self.remote.list_sale_lines().await {
            Ok(rows) => rows,
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        for row in rows {
            match self.pull_sale_line_row(&row).await {
                Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
                Err(error) => {
                    Self::record_row_failure(KIND, &row.id.to_string(), &error, summary);
                }
            }
        }
        Ok(())
    }

    async fn pull_sale_line_row(&self, row: &RemoteSaleLine) -> Result<RowOutcome, RowError> {
        let local_id = match row.source_id.clone() {
            Some(id) => id,
            None => {
                let matched = match (row.product_id.as_deref(), row.transaction_id.as_deref()) {
                    (Some(product_id), Some(transaction_id)) => self
                        .local
                        .find_sale_line_for(product_id, transaction_id)
                        .await?
                        .map(|l| l.id),
                    _ => None,
                };
                matched.unwrap_or_else(model::mint_sale_line_id)
            }
        };
        let line = mapper::sale_line_to_local(row, local_id)?;
        if self.local.get_sale_line(&line.id).await?.as_ref() == Some(&line) {
            return Ok(RowOutcome::Unchanged);
        }
        // The owning transaction should have been hydrated earlier in the
        // pass; when the remote data has a hole, a minimal placeholder
        // keeps the line's reference satisfiable.
        if self
            .local
            .get_transaction(&line.transaction_id)
            .await?
            .is_none()
        {
            let placeholder =
                mapper::placeholder_local_transaction(&line.transaction_id, Utc::now());
            self.local.upsert_transaction(&placeholder).await?;
        }
        self.local.upsert_sale_line(&line).await?;
        Ok(RowOutcome::Written)
    }

    async fn pull_shop_config(
        &self,
        first_remote_contact: bool,
        summary: &mut SyncSummary,
    ) -> Result<(), SyncError> {
        const KIND: EntityKind = EntityKind::ShopConfig;
        let row = match self.remote.find_shop_config().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(()),
            Err(error) => {
                return self.collection_failure(KIND, first_remote_contact, &error, summary);
            }
        };
        match self.pull_shop_config_row(&row).await {
            Ok(outcome) => Self::tally_pull(KIND, outcome, summary),
            Err(error) => Self::record_row_failure(KIND, &row.id.to_string(), &error, summary),
        }
        Ok(())
    }

    async fn pull_shop_config_row(&self, row: &RemoteShopConfig) -> Result<RowOutcome, RowError> {
        let existing = self.local.get_shop_config().await?;
        let local_id = row
            .source_id
            .clone()
            .or_else(|| existing.as_ref().map(|c| c.id.clone()))
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let config = mapper::shop_config_to_local(row, local_id)?;
        if existing.as_ref() == Some(&config) {
            return Ok(RowOutcome::Unchanged);
        }
        self.local.upsert_shop_config(&config).await?;
        Ok(RowOutcome::Written)
    }
}
