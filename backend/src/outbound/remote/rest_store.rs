//! Reqwest-backed remote store adapter.
//!
//! The remote end is a PostgREST-style JSON API: one route per collection,
//! `column=eq.value` filters, keyed upserts via `Prefer:
//! resolution=merge-duplicates`. This adapter owns transport details only:
//! request shaping, timeout and status mapping, and JSON decoding into the
//! remote row types. Matching policy (source id first, natural key second)
//! is implemented here because only the adapter knows how to express those
//! lookups as filters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::domain::ports::{
    RemoteCategory, RemoteProduct, RemoteProductStock, RemoteSaleLine, RemoteShopConfig,
    RemoteStore, RemoteTransaction, RemoteUser, StoreError,
};

const USERS: &str = "users";
const CATEGORIES: &str = "categories";
const PRODUCT_STOCKS: &str = "product_stocks";
const PRODUCTS: &str = "products";
const TRANSACTIONS: &str = "transactions";
const SALE_LINES: &str = "on_sale_products";
const SHOP_DATA: &str = "shop_data";

/// Remote store adapter performing HTTP requests against one base URL.
pub struct RestRemoteStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RestRemoteStore {
    /// Build an adapter with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn collection_url(&self, collection: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(collection)
            .map_err(|err| StoreError::query(format!("invalid collection url: {err}")))
    }

    fn authorise(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request
                .header("apikey", key)
                .bearer_auth(key),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.collection_url(collection)?;
        let response = self
            .authorise(self.client.get(url))
            .query(filters)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(collection, status, body.as_ref()));
        }
        serde_json::from_slice(body.as_ref())
            .map_err(|err| StoreError::query(format!("invalid {collection} payload: {err}")))
    }

    async fn fetch_one<T: DeserializeOwned>(
        &self,
        collection: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>, StoreError> {
        let mut rows: Vec<T> = self.fetch(collection, filters).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn upsert<T: Serialize + Sync>(
        &self,
        collection: &str,
        row: &T,
    ) -> Result<(), StoreError> {
        let url = self.collection_url(collection)?;
        let response = self
            .authorise(self.client.post(url))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(row)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(collection, status, body.as_ref()))
    }

    async fn delete_where(
        &self,
        collection: &str,
        filters: &[(&str, String)],
    ) -> Result<(), StoreError> {
        let url = self.collection_url(collection)?;
        let response = self
            .authorise(self.client.delete(url))
            .query(filters)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        // A delete that matched nothing already holds the desired end state.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.bytes().await.map_err(map_transport_error)?;
        Err(map_status_error(collection, status, body.as_ref()))
    }

    async fn find_by_source_then<T: DeserializeOwned>(
        &self,
        collection: &str,
        source_id: &str,
        fallback: &[(&str, String)],
    ) -> Result<Option<T>, StoreError> {
        if let Some(row) = self
            .fetch_one(collection, &[("source_id", format!("eq.{source_id}"))])
            .await?
        {
            return Ok(Some(row));
        }
        if fallback.is_empty() {
            return Ok(None);
        }
        self.fetch_one(collection, fallback).await
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn map_transport_error(error: reqwest::Error) -> StoreError {
    if error.is_timeout() || error.is_connect() {
        StoreError::unavailable(error.to_string())
    } else {
        StoreError::query(error.to_string())
    }
}

fn map_status_error(collection: &str, status: StatusCode, body: &[u8]) -> StoreError {
    let snippet = String::from_utf8_lossy(body);
    let snippet = snippet.chars().take(200).collect::<String>();
    match status {
        StatusCode::CONFLICT => StoreError::conflict(format!("{collection}: {snippet}")),
        StatusCode::NOT_FOUND => StoreError::not_found(format!("{collection} route")),
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT => {
            StoreError::unavailable(format!("{collection}: {status}"))
        }
        _ => StoreError::query(format!("{collection}: {status}: {snippet}")),
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn list_users(&self) -> Result<Vec<RemoteUser>, StoreError> {
        self.fetch(USERS, &[]).await
    }

    async fn list_categories(&self) -> Result<Vec<RemoteCategory>, StoreError> {
        self.fetch(CATEGORIES, &[]).await
    }

    async fn list_product_stocks(&self) -> Result<Vec<RemoteProductStock>, StoreError> {
        self.fetch(PRODUCT_STOCKS, &[]).await
    }

    async fn list_products(&self) -> Result<Vec<RemoteProduct>, StoreError> {
        self.fetch(PRODUCTS, &[]).await
    }

    async fn list_transactions(&self) -> Result<Vec<RemoteTransaction>, StoreError> {
        self.fetch(TRANSACTIONS, &[]).await
    }

    async fn list_sale_lines(&self) -> Result<Vec<RemoteSaleLine>, StoreError> {
        self.fetch(SALE_LINES, &[]).await
    }

    async fn find_shop_config(&self) -> Result<Option<RemoteShopConfig>, StoreError> {
        self.fetch_one(SHOP_DATA, &[]).await
    }

    async fn find_user(
        &self,
        source_id: &str,
        username: &str,
    ) -> Result<Option<RemoteUser>, StoreError> {
        self.find_by_source_then(USERS, source_id, &[("username", eq(username))])
            .await
    }

    async fn find_category(
        &self,
        source_id: &str,
        name: &str,
    ) -> Result<Option<RemoteCategory>, StoreError> {
        self.find_by_source_then(CATEGORIES, source_id, &[("name", eq(name))])
            .await
    }

    async fn find_product_stock(
        &self,
        source_id: &str,
        name: &str,
    ) -> Result<Option<RemoteProductStock>, StoreError> {
        self.find_by_source_then(PRODUCT_STOCKS, source_id, &[("name", eq(name))])
            .await
    }

    async fn find_product(
        &self,
        source_id: &str,
        product_stock_id: &str,
    ) -> Result<Option<RemoteProduct>, StoreError> {
        self.find_by_source_then(PRODUCTS, source_id, &[("product_id", eq(product_stock_id))])
            .await
    }

    async fn find_transaction(
        &self,
        source_id: &str,
    ) -> Result<Option<RemoteTransaction>, StoreError> {
        self.find_by_source_then(TRANSACTIONS, source_id, &[]).await
    }

    async fn find_sale_line(
        &self,
        source_id: &str,
        product_id: &str,
        transaction_id: &str,
    ) -> Result<Option<RemoteSaleLine>, StoreError> {
        self.find_by_source_then(
            SALE_LINES,
            source_id,
            &[
                ("product_id", eq(product_id)),
                ("transaction_id", eq(transaction_id)),
            ],
        )
        .await
    }

    async fn upsert_user(&self, row: &RemoteUser) -> Result<(), StoreError> {
        self.upsert(USERS, row).await
    }

    async fn upsert_category(&self, row: &RemoteCategory) -> Result<(), StoreError> {
        self.upsert(CATEGORIES, row).await
    }

    async fn upsert_product_stock(&self, row: &RemoteProductStock) -> Result<(), StoreError> {
        self.upsert(PRODUCT_STOCKS, row).await
    }

    async fn upsert_product(&self, row: &RemoteProduct) -> Result<(), StoreError> {
        self.upsert(PRODUCTS, row).await
    }

    async fn upsert_transaction(&self, row: &RemoteTransaction) -> Result<(), StoreError> {
        self.upsert(TRANSACTIONS, row).await
    }

    async fn upsert_sale_line(&self, row: &RemoteSaleLine) -> Result<(), StoreError> {
        self.upsert(SALE_LINES, row).await
    }

    async fn upsert_shop_config(&self, row: &RemoteShopConfig) -> Result<(), StoreError> {
        self.upsert(SHOP_DATA, row).await
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(USERS, &[("id", eq(&id.to_string()))]).await
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(CATEGORIES, &[("id", eq(&id.to_string()))])
            .await
    }

    async fn delete_product_stock(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(PRODUCT_STOCKS, &[("id", eq(&id.to_string()))])
            .await
    }

    async fn delete_product(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(PRODUCTS, &[("id", eq(&id.to_string()))])
            .await
    }

    async fn delete_transaction(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(TRANSACTIONS, &[("id", eq(&id.to_string()))])
            .await
    }

    async fn delete_sale_line(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(SALE_LINES, &[("id", eq(&id.to_string()))])
            .await
    }

    async fn delete_shop_config(&self, id: Uuid) -> Result<(), StoreError> {
        self.delete_where(SHOP_DATA, &[("id", eq(&id.to_string()))])
            .await
    }

    async fn delete_sale_lines_for_transaction(
        &self,
        transaction_source_id: &str,
    ) -> Result<(), StoreError> {
        self.delete_where(SALE_LINES, &[("transaction_id", eq(transaction_source_id))])
            .await
    }

    async fn delete_sale_lines_for_product(
        &self,
        product_source_id: &str,
    ) -> Result<(), StoreError> {
        self.delete_where(SALE_LINES, &[("product_id", eq(product_source_id))])
            .await
    }

    async fn list_products_for_stock(
        &self,
        product_stock_source_id: &str,
    ) -> Result<Vec<RemoteProduct>, StoreError> {
        self.fetch(PRODUCTS, &[("product_id", eq(product_stock_source_id))])
            .await
    }

    async fn list_product_stocks_for_category(
        &self,
        category_name: &str,
    ) -> Result<Vec<RemoteProductStock>, StoreError> {
        self.fetch(PRODUCT_STOCKS, &[("cat", eq(category_name))])
            .await
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn conflict_status_maps_to_conflict() {
        let error = map_status_error(PRODUCTS, StatusCode::CONFLICT, b"duplicate key");
        assert!(matches!(error, StoreError::Conflict { .. }));
        assert!(error.to_string().contains("duplicate key"));
    }

    #[rstest]
    #[case(StatusCode::SERVICE_UNAVAILABLE)]
    #[case(StatusCode::BAD_GATEWAY)]
    #[case(StatusCode::GATEWAY_TIMEOUT)]
    fn gateway_statuses_map_to_unavailable(#[case] status: StatusCode) {
        let error = map_status_error(TRANSACTIONS, status, b"");
        assert!(error.is_unavailable());
    }

    #[rstest]
    fn other_statuses_map_to_query_errors() {
        let error = map_status_error(USERS, StatusCode::UNPROCESSABLE_ENTITY, b"bad column");
        assert!(matches!(error, StoreError::Query { .. }));
    }

    #[rstest]
    fn filter_values_use_postgrest_eq_syntax() {
        assert_eq!(eq("TRX-1"), "eq.TRX-1");
    }
}
