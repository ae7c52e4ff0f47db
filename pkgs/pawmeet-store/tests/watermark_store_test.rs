// Tests for WatermarkStore

use pawmeet_store::WatermarkStore;
use tempfile::NamedTempFile;

async fn create_test_store(path: &NamedTempFile) -> WatermarkStore {
    WatermarkStore::new(path.path().to_path_buf())
        .await
        .expect("Failed to open watermark store")
}

#[tokio::test]
async fn test_missing_watermark_is_none() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;

    let value = store.get("conv-1").await.expect("Failed to get watermark");
    assert!(value.is_none());
}

#[tokio::test]
async fn test_advance_creates_watermark() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;

    let effective = store.advance("conv-1", 1_000).await.unwrap();
    assert_eq!(effective, 1_000);
    assert_eq!(store.get("conv-1").await.unwrap(), Some(1_000));
}

#[tokio::test]
async fn test_advance_never_regresses() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;

    store.advance("conv-1", 5_000).await.unwrap();
    let effective = store.advance("conv-1", 2_000).await.unwrap();

    assert_eq!(effective, 5_000);
    assert_eq!(store.get("conv-1").await.unwrap(), Some(5_000));

    store.advance("conv-1", 9_000).await.unwrap();
    assert_eq!(store.get("conv-1").await.unwrap(), Some(9_000));
}

#[tokio::test]
async fn test_watermarks_are_independent_per_conversation() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;

    store.advance("conv-a", 100).await.unwrap();
    store.advance("conv-b", 200).await.unwrap();

    let all = store.all().await.unwrap();
    assert_eq!(
        all,
        vec![("conv-a".to_string(), 100), ("conv-b".to_string(), 200)]
    );
}

#[tokio::test]
async fn test_repeated_advance_updates_row_in_place() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;

    for millis in [100, 200, 300] {
        store.advance("conv-1", millis).await.unwrap();
    }
    store.set("conv-1", 400).await.unwrap();

    let all = store.all().await.unwrap();
    assert_eq!(all, vec![("conv-1".to_string(), 400)]);
}

#[tokio::test]
async fn test_set_overwrites_and_remove_deletes() {
    let temp_file = NamedTempFile::new().unwrap();
    let store = create_test_store(&temp_file).await;

    store.advance("conv-1", 5_000).await.unwrap();
    store.set("conv-1", 10).await.unwrap();
    assert_eq!(store.get("conv-1").await.unwrap(), Some(10));

    assert!(store.remove("conv-1").await.unwrap());
    assert!(!store.remove("conv-1").await.unwrap());
    assert!(store.get("conv-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_watermark_survives_reopen() {
    let temp_file = NamedTempFile::new().unwrap();

    {
        let store = create_test_store(&temp_file).await;
        store.advance("conv-1", 42).await.unwrap();
    }

    let reopened = create_test_store(&temp_file).await;
    assert_eq!(reopened.get("conv-1").await.unwrap(), Some(42));
}
