//! Behaviour every `ParchiStore` must share; each store's test module runs
//! these against its own instance.

use chrono::{Duration, Utc};
use mandi_core::{
    DatabaseError, DigitalParchi, HealthStatus, LedgerError, Page, ParchiFilter, ParchiStatus,
    ParchiStore, ParchiUpdate, TradeData, ValidationError,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

pub(crate) fn trade(index: u32) -> TradeData {
    TradeData::new(format!("Product-{index}"), index + 1, "kg", 10_u32, "hi")
        .unwrap()
        .with_conversation_id(format!("conv-{index}"))
}

pub(crate) fn parchi(index: u32) -> DigitalParchi {
    DigitalParchi::new(trade(index))
}

pub(crate) async fn save_and_get(store: &dyn ParchiStore) {
    let parchi = DigitalParchi::new(
        TradeData::new("Wheat", dec!(100), "kg", dec!(25.50), "hi")
            .unwrap()
            .with_conversation_id("test-conv-123"),
    )
    .with_vendor("vendor-123")
    .with_status(ParchiStatus::Completed);

    let saved_id = store.save_parchi(&parchi).await.unwrap();
    assert_eq!(saved_id, parchi.id);

    let fetched = store.get_parchi(parchi.id).await.unwrap().unwrap();
    assert_eq!(fetched, parchi);
    assert_eq!(fetched.trade_data.total_amount.to_string(), "2550.00");
    assert_eq!(fetched.trade_data.mandi_cess.to_string(), "127.50");
}

pub(crate) async fn save_upserts(store: &dyn ParchiStore) {
    let mut parchi = parchi(0);
    store.save_parchi(&parchi).await.unwrap();

    parchi.vendor_id = Some("vendor-9".to_string());
    parchi.updated_at += Duration::seconds(1);
    store.save_parchi(&parchi).await.unwrap();

    assert_eq!(store.count_parchis(&ParchiFilter::default()).await.unwrap(), 1);
    assert_eq!(store.get_parchi(parchi.id).await.unwrap(), Some(parchi));
}

pub(crate) async fn missing_ids_are_not_errors(store: &dyn ParchiStore) {
    let unknown = Uuid::new_v4();
    assert_eq!(store.get_parchi(unknown).await.unwrap(), None);
    assert!(!store.delete_parchi(unknown).await.unwrap());

    let update = ParchiUpdate::default().status(ParchiStatus::Cancelled);
    assert!(!store.update_parchi(unknown, update).await.unwrap());
}

pub(crate) async fn rejects_invalid_parchis_before_storage(store: &dyn ParchiStore) {
    let mut broken = parchi(1);
    broken.trade_data.product_name = String::new();

    let err = store.save_parchi(&broken).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::EmptyField("product_name"))
    ));

    let mut broken = parchi(2);
    broken.trade_data.mandi_cess += dec!(5);
    assert!(matches!(
        store.save_parchi(&broken).await.unwrap_err(),
        LedgerError::Validation(ValidationError::InconsistentAmount { .. })
    ));

    assert_eq!(store.count_parchis(&ParchiFilter::default()).await.unwrap(), 0);

    let now = Utc::now();
    let reversed = ParchiFilter::between(now, now - Duration::days(1));
    assert!(matches!(
        store.list_parchis(Page::default(), &reversed).await.unwrap_err(),
        LedgerError::Validation(ValidationError::OutOfRange { .. })
    ));
}

pub(crate) async fn pagination_is_disjoint_and_ordered(store: &dyn ParchiStore) {
    let base = Utc::now() - Duration::hours(1);
    for index in 0..5 {
        let mut parchi = parchi(index);
        parchi.created_at = base + Duration::minutes(i64::from(index));
        parchi.updated_at = parchi.created_at;
        store.save_parchi(&parchi).await.unwrap();
    }

    let all = store
        .list_parchis(Page::new(10, 0), &ParchiFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.windows(2).all(|pair| pair[0].created_at >= pair[1].created_at));
    assert_eq!(all[0].trade_data.product_name, "Product-4");

    let first = store
        .list_parchis(Page::new(2, 0), &ParchiFilter::default())
        .await
        .unwrap();
    let second = store
        .list_parchis(Page::new(2, 2), &ParchiFilter::default())
        .await
        .unwrap();
    let tail = store
        .list_parchis(Page::new(2, 4), &ParchiFilter::default())
        .await
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(tail.len(), 1);
    assert!(first.iter().all(|a| second.iter().all(|b| a.id != b.id)));
    assert_eq!(&all[0..2], first.as_slice());
    assert_eq!(&all[2..4], second.as_slice());
    assert_eq!(&all[4..5], tail.as_slice());

    let beyond = store
        .list_parchis(Page::new(2, 10), &ParchiFilter::default())
        .await
        .unwrap();
    assert!(beyond.is_empty());
}

pub(crate) async fn date_filter_is_inclusive(store: &dyn ParchiStore) {
    let now = Utc::now();

    let mut old = parchi(0);
    old.created_at = now - Duration::days(2);
    store.save_parchi(&old).await.unwrap();

    let mut recent = parchi(1);
    recent.created_at = now - Duration::hours(1);
    store.save_parchi(&recent).await.unwrap();

    let found = store
        .list_parchis(Page::default(), &ParchiFilter::since(now - Duration::days(1)))
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, recent.id);

    let exact = ParchiFilter::between(recent.created_at, recent.created_at);
    let found = store.list_parchis(Page::default(), &exact).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, recent.id);

    let window = ParchiFilter::between(old.created_at, recent.created_at);
    assert_eq!(store.count_parchis(&window).await.unwrap(), 2);

    let before_everything = ParchiFilter {
        end_date: Some(now - Duration::days(3)),
        ..ParchiFilter::default()
    };
    assert_eq!(store.count_parchis(&before_everything).await.unwrap(), 0);
}

pub(crate) async fn status_and_vendor_filters(store: &dyn ParchiStore) {
    store
        .save_parchi(&parchi(0).with_status(ParchiStatus::Draft).with_vendor("vendor-a"))
        .await
        .unwrap();
    store
        .save_parchi(&parchi(1).with_vendor("vendor-a"))
        .await
        .unwrap();
    store
        .save_parchi(&parchi(2).with_status(ParchiStatus::Cancelled))
        .await
        .unwrap();

    let drafts = ParchiFilter {
        status: Some(ParchiStatus::Draft),
        ..ParchiFilter::default()
    };
    assert_eq!(store.count_parchis(&drafts).await.unwrap(), 1);

    let vendor_a = ParchiFilter {
        vendor_id: Some("vendor-a".to_string()),
        ..ParchiFilter::default()
    };
    let listed = store.list_parchis(Page::default(), &vendor_a).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|p| p.vendor_id.as_deref() == Some("vendor-a")));

    let completed_for_a = ParchiFilter {
        status: Some(ParchiStatus::Completed),
        ..vendor_a
    };
    assert_eq!(store.count_parchis(&completed_for_a).await.unwrap(), 1);
}

pub(crate) async fn update_applies_and_bumps_updated_at(store: &dyn ParchiStore) {
    let original = parchi(0).with_vendor("vendor-123");
    store.save_parchi(&original).await.unwrap();

    let update = ParchiUpdate::default()
        .status(ParchiStatus::Cancelled)
        .vendor("new-vendor-456");
    assert!(store.update_parchi(original.id, update).await.unwrap());

    let updated = store.get_parchi(original.id).await.unwrap().unwrap();
    assert_eq!(updated.status, ParchiStatus::Cancelled);
    assert_eq!(updated.vendor_id.as_deref(), Some("new-vendor-456"));
    assert!(updated.updated_at > original.updated_at);
    assert_eq!(updated.created_at, original.created_at);
    assert_eq!(updated.trade_data, original.trade_data);

    let repriced = TradeData::new("Rice", 50_u32, "kg", 30_u32, "hi").unwrap();
    let update = ParchiUpdate::default().trade_data(repriced.clone()).clear_vendor();
    assert!(store.update_parchi(original.id, update).await.unwrap());

    let again = store.get_parchi(original.id).await.unwrap().unwrap();
    assert_eq!(again.trade_data, repriced);
    assert_eq!(again.trade_data.total_amount, dec!(1500.00));
    assert_eq!(again.vendor_id, None);
    assert!(again.updated_at > updated.updated_at);
}

pub(crate) async fn rejected_update_changes_nothing(store: &dyn ParchiStore) {
    let original = parchi(0);
    store.save_parchi(&original).await.unwrap();

    let update = ParchiUpdate::default()
        .status(ParchiStatus::Draft)
        .vendor("   ");
    let err = store.update_parchi(original.id, update).await.unwrap_err();
    assert!(matches!(
        err,
        LedgerError::Validation(ValidationError::EmptyField("vendor_id"))
    ));

    assert_eq!(store.get_parchi(original.id).await.unwrap(), Some(original));
}

pub(crate) async fn delete_removes(store: &dyn ParchiStore) {
    let parchi = parchi(0);
    store.save_parchi(&parchi).await.unwrap();
    assert!(store.get_parchi(parchi.id).await.unwrap().is_some());

    assert!(store.delete_parchi(parchi.id).await.unwrap());
    assert_eq!(store.get_parchi(parchi.id).await.unwrap(), None);
    assert!(!store.delete_parchi(parchi.id).await.unwrap());
}

pub(crate) async fn count_tracks_inserts(store: &dyn ParchiStore) {
    assert_eq!(store.count_parchis(&ParchiFilter::default()).await.unwrap(), 0);

    for index in 0..3 {
        store.save_parchi(&parchi(index)).await.unwrap();
    }
    assert_eq!(store.count_parchis(&ParchiFilter::default()).await.unwrap(), 3);

    let health = store.health_check().await.unwrap();
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.total_parchis, 3);
    assert!(health.connection_active);
    assert!(health.storage_size_bytes > 0);
}

/// Takes an uninitialized store.
pub(crate) async fn lifecycle_errors_and_health<S: ParchiStore>(store: S) {
    assert!(matches!(
        store.get_parchi(Uuid::new_v4()).await.unwrap_err(),
        LedgerError::Database(DatabaseError::NotInitialized)
    ));
    let health = store.health_check().await.unwrap();
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert!(!health.connection_active);

    store.initialize().await.unwrap();
    store.initialize().await.unwrap();
    store.save_parchi(&parchi(0)).await.unwrap();
    assert!(store.health_check().await.unwrap().is_healthy());

    store.close().await.unwrap();
    store.close().await.unwrap();

    assert!(matches!(
        store.save_parchi(&parchi(1)).await.unwrap_err(),
        LedgerError::Database(DatabaseError::Closed)
    ));
    assert!(matches!(
        store.count_parchis(&ParchiFilter::default()).await.unwrap_err(),
        LedgerError::Database(DatabaseError::Closed)
    ));

    let health = store.health_check().await.unwrap();
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert_eq!(health.store_type, store.store_type());
    assert!(health.error.is_some());
}
