//! Orchestrator tests: full passes over in-memory stores plus failure
//! paths over mocks.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use mockall::Sequence;
use tokio::sync::watch;
use uuid::Uuid;

use super::*;
use crate::domain::model::{
    Category, Product, ProductStock, SaleLine, ShopConfig, Transaction, User,
};
use crate::domain::ports::{
    MockLocalStore, MockRemoteStore, RemoteCategory, RemoteProduct, RemoteSaleLine,
    RemoteTransaction, StoreError,
};
use crate::test_support::{InMemoryLocalStore, InMemoryRemoteStore};

fn sample_date() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 2, 12, 0, 0)
        .single()
        .expect("valid date")
}

fn seed_full_local(local: &InMemoryLocalStore) {
    local.seed_user(User {
        id: "USR-1".into(),
        name: "Avery".into(),
        username: "avery".into(),
        email: None,
        email_verified: None,
        image: None,
        password_hash: "argon2id$stub".into(),
        role: "admin".into(),
    });
    local.seed_category(Category {
        id: "CAT-1".into(),
        name: "Drinks".into(),
    });
    local.seed_product_stock(ProductStock {
        id: "PRD-11111111".into(),
        name: "Cola".into(),
        image: None,
        price: 2.0,
        stock: 10,
        category_id: "CAT-1".into(),
        category_name: "Drinks".into(),
    });
    local.seed_product(Product {
        id: "PRODUCT-11111111".into(),
        product_stock_id: "PRD-11111111".into(),
        sell_price: 5.0,
        created_at: sample_date(),
    });
    local.seed_transaction(Transaction {
        id: "TRX-11111111".into(),
        total_amount: Some(10.0),
        created_at: sample_date(),
        is_complete: true,
        order_type: "dine_in".into(),
        payment_method: "cash".into(),
    });
    local.seed_sale_line(SaleLine {
        id: "ONSALE-11111111".into(),
        product_id: "PRODUCT-11111111".into(),
        quantity: 2,
        sale_date: sample_date(),
        transaction_id: "TRX-11111111".into(),
    });
    local.seed_shop_config(ShopConfig {
        id: "SHOP-1".into(),
        name: "Corner Till".into(),
        tax: 0.1,
    });
}

fn orchestrator(
    local: Arc<InMemoryLocalStore>,
    remote: Arc<InMemoryRemoteStore>,
) -> SyncOrchestrator<InMemoryLocalStore, InMemoryRemoteStore> {
    SyncOrchestrator::new(local, remote, SyncConfig::default())
}

fn completed(outcome: RunOutcome) -> SyncSummary {
    match outcome {
        RunOutcome::Completed(summary) => summary,
        other => panic!("expected completed pass, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_local_store_runs_a_pull_pass() {
    let local = Arc::new(InMemoryLocalStore::new());
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.seed_category(RemoteCategory {
        id: Uuid::new_v4(),
        source_id: None,
        name: Some("Drinks".into()),
    });

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    let summary = completed(orch.run().await.expect("pass runs"));

    assert_eq!(summary.mode, SyncMode::Pull);
    assert_eq!(summary.entities[&EntityKind::Category].pulled, 1);
    let hydrated = local
        .find_category_by_name("Drinks")
        .await
        .expect("lookup works")
        .expect("category hydrated");
    assert!(!hydrated.id.is_empty());
}

#[tokio::test]
async fn repeated_pull_passes_converge_to_noop() {
    let local = Arc::new(InMemoryLocalStore::new());
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.seed_category(RemoteCategory {
        id: Uuid::new_v4(),
        source_id: None,
        name: Some("Drinks".into()),
    });

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    completed(orch.run().await.expect("first pass"));
    let second = completed(orch.run().await.expect("second pass"));

    assert!(second.is_noop(), "second pass mutated: {second:?}");
    assert_eq!(second.entities[&EntityKind::Category].unchanged, 1);
}

#[tokio::test]
async fn push_pass_backfills_an_empty_remote() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    let summary = completed(orch.run().await.expect("pass runs"));

    assert_eq!(summary.mode, SyncMode::Push);
    assert_eq!(summary.total_failed(), 0);

    let product = remote
        .find_product("PRODUCT-11111111", "PRD-11111111")
        .await
        .expect("lookup works")
        .expect("product pushed");
    assert_eq!(product.sellprice, Some(5.0));
    assert_eq!(product.source_id.as_deref(), Some("PRODUCT-11111111"));

    let line = remote
        .find_sale_line("ONSALE-11111111", "PRODUCT-11111111", "TRX-11111111")
        .await
        .expect("lookup works")
        .expect("line pushed");
    assert_eq!(line.quantity, Some(2));
}

#[tokio::test]
async fn repeated_push_passes_never_duplicate_remote_rows() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    completed(orch.run().await.expect("first pass"));
    let first_count = remote.product_count();
    let second = completed(orch.run().await.expect("second pass"));

    assert!(second.is_noop(), "second pass mutated: {second:?}");
    assert_eq!(remote.product_count(), first_count);
    assert_eq!(remote.transaction_count(), 1);
    assert_eq!(remote.sale_line_count(), 1);
}

#[tokio::test]
async fn local_transaction_deletion_cascades_to_remote_lines() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    completed(orch.run().await.expect("seeding pass"));
    assert_eq!(remote.transaction_count(), 1);
    assert_eq!(remote.sale_line_count(), 1);

    local.remove_transaction("TRX-11111111");
    let summary = completed(orch.run().await.expect("deletion pass"));

    assert_eq!(summary.entities[&EntityKind::Transaction].deleted, 1);
    assert_eq!(remote.transaction_count(), 0);
    assert_eq!(remote.sale_line_count(), 0);
}

#[tokio::test]
async fn dangling_line_gets_a_placeholder_transaction() {
    let local = Arc::new(InMemoryLocalStore::new());
    // A product keeps the store out of bootstrap mode; the line references
    // a transaction no store has ever seen.
    local.seed_product(Product {
        id: "PRODUCT-22222222".into(),
        product_stock_id: "PRD-22222222".into(),
        sell_price: 3.0,
        created_at: sample_date(),
    });
    local.seed_sale_line(SaleLine {
        id: "ONSALE-22222222".into(),
        product_id: "PRODUCT-22222222".into(),
        quantity: 1,
        sale_date: sample_date(),
        transaction_id: "TRX-GHOST".into(),
    });
    let remote = Arc::new(InMemoryRemoteStore::new());

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    completed(orch.run().await.expect("pass runs"));

    let placeholder = remote
        .find_transaction("TRX-GHOST")
        .await
        .expect("lookup works")
        .expect("placeholder synthesised");
    assert_eq!(placeholder.is_complete, Some(false));
    assert_eq!(placeholder.total_amount, None);
}

#[tokio::test]
async fn trigger_during_a_running_pass_is_coalesced() {
    let local = Arc::new(InMemoryLocalStore::new());
    let remote = Arc::new(InMemoryRemoteStore::new());
    let orch = orchestrator(local, remote);

    orch.running.store(true, std::sync::atomic::Ordering::Release);
    let outcome = orch.run().await.expect("coalesced run returns");
    assert_eq!(outcome, RunOutcome::Coalesced);
}

#[tokio::test]
async fn shutdown_request_aborts_before_the_next_entity_type() {
    let local = Arc::new(InMemoryLocalStore::new());
    let remote = Arc::new(InMemoryRemoteStore::new());
    let (_tx, rx) = watch::channel(true);
    let orch = orchestrator(local, remote).with_shutdown(rx);

    match orch.run().await.expect("aborted run returns") {
        RunOutcome::Aborted { reason, partial } => {
            assert_eq!(reason, AbortReason::ShutdownRequested);
            assert!(partial.entities.is_empty());
        }
        other => panic!("expected aborted pass, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_remote_at_pass_start_fails_the_pass() {
    let mut local = MockLocalStore::new();
    local.expect_count_transactions().returning(|| Ok(0));
    local.expect_count_products().returning(|| Ok(0));
    let mut remote = MockRemoteStore::new();
    remote
        .expect_list_users()
        .returning(|| Err(StoreError::unavailable("connection refused")));

    let orch = SyncOrchestrator::new(Arc::new(local), Arc::new(remote), SyncConfig::default());
    let error = orch.run().await.expect_err("pass fails");
    assert!(matches!(error, SyncError::Unavailable { .. }));
}

#[tokio::test]
async fn later_collection_failure_skips_only_that_collection() {
    let mut local = MockLocalStore::new();
    local.expect_count_transactions().returning(|| Ok(0));
    local.expect_count_products().returning(|| Ok(0));
    let mut remote = MockRemoteStore::new();
    remote.expect_list_users().returning(|| Ok(Vec::new()));
    remote
        .expect_list_categories()
        .returning(|| Err(StoreError::unavailable("connection reset")));
    remote.expect_list_transactions().returning(|| Ok(Vec::new()));
    remote
        .expect_list_product_stocks()
        .returning(|| Ok(Vec::new()));
    remote.expect_list_products().returning(|| Ok(Vec::new()));
    remote.expect_list_sale_lines().returning(|| Ok(Vec::new()));
    remote.expect_find_shop_config().returning(|| Ok(None));

    let orch = SyncOrchestrator::new(Arc::new(local), Arc::new(remote), SyncConfig::default());
    let summary = completed(orch.run().await.expect("pass completes"));
    assert_eq!(summary.skipped, vec![EntityKind::Category]);
}

#[tokio::test]
async fn conflicted_row_write_retries_once_with_the_winning_id() {
    let winning_id = Uuid::new_v4();
    let product = Product {
        id: "PRODUCT-33333333".into(),
        product_stock_id: "PRD-33333333".into(),
        sell_price: 4.5,
        created_at: sample_date(),
    };

    let mut local = MockLocalStore::new();
    local.expect_count_transactions().returning(|| Ok(1));
    local.expect_count_products().returning(|| Ok(1));
    local.expect_list_users().returning(|| Ok(Vec::new()));
    local.expect_list_categories().returning(|| Ok(Vec::new()));
    local.expect_list_transactions().returning(|| Ok(Vec::new()));
    local.expect_list_product_stocks().returning(|| Ok(Vec::new()));
    local.expect_list_sale_lines().returning(|| Ok(Vec::new()));
    local.expect_get_shop_config().returning(|| Ok(None));
    let listed = product.clone();
    local
        .expect_list_products()
        .returning(move || Ok(vec![listed.clone()]));

    let mut remote = MockRemoteStore::new();
    remote.expect_list_users().returning(|| Ok(Vec::new()));
    remote.expect_list_categories().returning(|| Ok(Vec::new()));
    remote.expect_list_transactions().returning(|| Ok(Vec::new()));
    remote
        .expect_list_product_stocks()
        .returning(|| Ok(Vec::new()));
    remote.expect_list_products().returning(|| Ok(Vec::new()));
    remote.expect_list_sale_lines().returning(|| Ok(Vec::new()));
    remote.expect_find_shop_config().returning(|| Ok(None));

    let mut seq = Sequence::new();
    remote
        .expect_find_product()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(None));
    remote
        .expect_upsert_product()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(StoreError::conflict("duplicate key")));
    let won = product.clone();
    remote
        .expect_find_product()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_, _| {
            Ok(Some(RemoteProduct {
                id: winning_id,
                source_id: Some(won.id.clone()),
                product_id: Some(won.product_stock_id.clone()),
                sellprice: Some(9.9),
                created_at: Some(won.created_at.to_rfc3339()),
            }))
        });
    remote
        .expect_upsert_product()
        .times(1)
        .in_sequence(&mut seq)
        .withf(move |row| row.id == winning_id && row.sellprice == Some(4.5))
        .returning(|_| Ok(()));

    let orch = SyncOrchestrator::new(Arc::new(local), Arc::new(remote), SyncConfig::default());
    let summary = completed(orch.run().await.expect("pass completes"));
    assert_eq!(summary.entities[&EntityKind::Product].pushed, 1);
    assert_eq!(summary.total_failed(), 0);
}

#[tokio::test]
async fn legacy_remote_rows_without_source_id_are_matched_by_natural_key() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());
    // A row minted by an older terminal: no source id, same natural key.
    let legacy_id = Uuid::new_v4();
    remote.seed_category(RemoteCategory {
        id: legacy_id,
        source_id: None,
        name: Some("Drinks".into()),
    });

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    completed(orch.run().await.expect("pass runs"));

    let row = remote
        .find_category("CAT-1", "Drinks")
        .await
        .expect("lookup works")
        .expect("category present");
    // The legacy row was adopted and backfilled, not duplicated.
    assert_eq!(row.id, legacy_id);
    assert_eq!(row.source_id.as_deref(), Some("CAT-1"));
    assert_eq!(
        remote.list_categories().await.expect("list works").len(),
        1
    );
}

#[tokio::test]
async fn stray_remote_rows_are_deleted_even_without_local_counterparts() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());
    remote.seed_transaction(RemoteTransaction {
        id: Uuid::new_v4(),
        source_id: Some("TRX-GONE".into()),
        total_amount: Some(1.0),
        created_at: Some(sample_date().to_rfc3339()),
        is_complete: Some(true),
        order_type: Some("takeaway".into()),
        payment_method: Some("card".into()),
    });
    remote.seed_sale_line(RemoteSaleLine {
        id: Uuid::new_v4(),
        source_id: Some("ONSALE-GONE".into()),
        product_id: Some("PRODUCT-GONE".into()),
        quantity: Some(1),
        saledate: Some(sample_date().to_rfc3339()),
        transaction_id: Some("TRX-GONE".into()),
    });

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    let summary = completed(orch.run().await.expect("pass runs"));

    assert_eq!(summary.entities[&EntityKind::Transaction].deleted, 1);
    assert!(
        remote
            .find_transaction("TRX-GONE")
            .await
            .expect("lookup works")
            .is_none()
    );
}

#[tokio::test]
async fn pass_runs_to_completion_on_a_spawned_task() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());

    let orch = Arc::new(orchestrator(Arc::clone(&local), Arc::clone(&remote)));
    let handle = tokio::spawn({
        let orch = Arc::clone(&orch);
        async move { orch.run().await }
    });
    let summary = completed(handle.await.expect("task joins").expect("pass runs"));

    assert_eq!(summary.mode, SyncMode::Push);
    assert_eq!(summary.total_failed(), 0);
    assert_eq!(remote.transaction_count(), 1);
}

#[tokio::test]
async fn shared_missing_transaction_gets_a_single_placeholder() {
    let local = Arc::new(InMemoryLocalStore::new());
    // Two lines from the same lost checkout, pushed through the worker
    // pool concurrently.
    for suffix in ["44444444", "55555555"] {
        local.seed_product(Product {
            id: format!("PRODUCT-{suffix}"),
            product_stock_id: format!("PRD-{suffix}"),
            sell_price: 3.0,
            created_at: sample_date(),
        });
        local.seed_sale_line(SaleLine {
            id: format!("ONSALE-{suffix}"),
            product_id: format!("PRODUCT-{suffix}"),
            quantity: 1,
            sale_date: sample_date(),
            transaction_id: "TRX-SHARED".into(),
        });
    }
    let remote = Arc::new(InMemoryRemoteStore::new());

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    completed(orch.run().await.expect("pass runs"));

    assert_eq!(remote.transaction_count(), 1);
    assert_eq!(remote.sale_line_count(), 2);
    let placeholder = remote
        .find_transaction("TRX-SHARED")
        .await
        .expect("lookup works")
        .expect("placeholder synthesised");
    assert_eq!(placeholder.is_complete, Some(false));
}

#[tokio::test]
async fn unclaimed_legacy_remote_rows_are_swept_on_push() {
    let local = Arc::new(InMemoryLocalStore::new());
    seed_full_local(&local);
    let remote = Arc::new(InMemoryRemoteStore::new());
    // Rows minted by an older terminal with no source id and no natural
    // key held by any local record.
    remote.seed_transaction(RemoteTransaction {
        id: Uuid::new_v4(),
        source_id: None,
        total_amount: Some(7.5),
        created_at: Some(sample_date().to_rfc3339()),
        is_complete: Some(true),
        order_type: Some("takeaway".into()),
        payment_method: Some("card".into()),
    });
    remote.seed_category(RemoteCategory {
        id: Uuid::new_v4(),
        source_id: None,
        name: Some("Bygone".into()),
    });

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    let summary = completed(orch.run().await.expect("pass runs"));

    assert_eq!(summary.entities[&EntityKind::Transaction].deleted, 1);
    assert_eq!(summary.entities[&EntityKind::Category].deleted, 1);
    assert_eq!(remote.transaction_count(), 1);
    let categories = remote.list_categories().await.expect("list works");
    assert_eq!(categories.len(), 1);
    assert_eq!(categories[0].source_id.as_deref(), Some("CAT-1"));
}

#[tokio::test]
async fn pulled_line_with_a_missing_transaction_gets_a_local_placeholder() {
    let local = Arc::new(InMemoryLocalStore::new());
    let remote = Arc::new(InMemoryRemoteStore::new());
    // The remote holds a line whose owning transaction was never written.
    remote.seed_sale_line(RemoteSaleLine {
        id: Uuid::new_v4(),
        source_id: Some("ONSALE-1".into()),
        product_id: Some("PRODUCT-1".into()),
        quantity: Some(1),
        saledate: Some(sample_date().to_rfc3339()),
        transaction_id: Some("TRX-HOLE".into()),
    });

    let orch = orchestrator(Arc::clone(&local), Arc::clone(&remote));
    let summary = completed(orch.run().await.expect("pass runs"));

    assert_eq!(summary.mode, SyncMode::Pull);
    assert_eq!(summary.total_failed(), 0);
    let line = local
        .get_sale_line("ONSALE-1")
        .await
        .expect("lookup works")
        .expect("line hydrated");
    assert_eq!(line.transaction_id, "TRX-HOLE");
    let placeholder = local
        .get_transaction("TRX-HOLE")
        .await
        .expect("lookup works")
        .expect("placeholder synthesised");
    assert!(!placeholder.is_complete);
}
