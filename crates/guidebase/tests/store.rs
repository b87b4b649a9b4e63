//! SQLite store behavior: transactional inserts, cascade deletes, and
//! similarity queries against a real database file.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tempfile::TempDir;

use guidebase::migrate::apply_schema;
use guidebase::sqlite_store::SqliteStore;
use guidebase_core::models::{EmbeddedChunk, EmbeddedSection, Resource, SectionChunk};
use guidebase_core::store::Store;

async fn test_store() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("gbase.sqlite");

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .unwrap()
        .create_if_missing(true)
        .foreign_keys(true);
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .unwrap();

    apply_schema(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

async fn count(store: &SqliteStore, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn insert_document_persists_resource_and_chunks() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("setup.html", None, 42);
    let chunks = vec![
        EmbeddedChunk::new("first chunk", vec![1.0, 0.0]),
        EmbeddedChunk::new("second chunk", vec![0.0, 1.0]),
    ];
    let id = store.insert_document(&resource, &chunks).await.unwrap();

    assert_eq!(id, resource.id);
    assert_eq!(count(&store, "resources").await, 1);
    assert_eq!(count(&store, "embeddings").await, 2);
}

#[tokio::test]
async fn similarity_query_joins_resource_file_name() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("onboarding.pdf", None, 0);
    store
        .insert_document(
            &resource,
            &[EmbeddedChunk::new("welcome aboard", vec![1.0, 0.0])],
        )
        .await
        .unwrap();

    let scored = store.query_by_similarity(&[1.0, 0.0]).await.unwrap();
    assert_eq!(scored.len(), 1);
    assert!((scored[0].similarity - 1.0).abs() < 1e-6);
    assert_eq!(scored[0].file_name.as_deref(), Some("onboarding.pdf"));
}

#[tokio::test]
async fn deleting_a_resource_cascades_to_chunks() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("stale.html", None, 0);
    store
        .insert_document(&resource, &[EmbeddedChunk::new("old text", vec![1.0, 0.0])])
        .await
        .unwrap();
    assert_eq!(count(&store, "embeddings").await, 1);

    store.delete_resource(&resource.id).await.unwrap();

    assert_eq!(count(&store, "resources").await, 0);
    assert_eq!(count(&store, "embeddings").await, 0);
}

#[tokio::test]
async fn multimodal_insert_attaches_images_by_original_index() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("wiring.html", None, 0);
    let sections = vec![
        SectionChunk {
            text: vec!["panel".into()],
            images: vec![
                "https://cdn.example.com/a.png".into(),
                "https://cdn.example.com/b.png".into(),
            ],
        },
        SectionChunk {
            text: vec!["notes".into()],
            images: vec![],
        },
    ];
    let chunks = vec![
        EmbeddedSection::new("panel", 0, vec![1.0, 0.0]),
        EmbeddedSection::new("notes", 1, vec![0.0, 1.0]),
    ];

    store
        .insert_multimodal_document(&resource, &chunks, &sections)
        .await
        .unwrap();

    assert_eq!(count(&store, "embeddings_multimodal").await, 2);
    assert_eq!(count(&store, "image_resources").await, 2);

    let scored = store
        .query_multimodal_by_similarity(&[1.0, 0.0])
        .await
        .unwrap();
    let panel = scored.iter().find(|s| s.content == "panel").unwrap();
    assert_eq!(
        panel.image_urls,
        vec!["https://cdn.example.com/a.png", "https://cdn.example.com/b.png"]
    );
    let notes = scored.iter().find(|s| s.content == "notes").unwrap();
    assert!(notes.image_urls.is_empty());
}

#[tokio::test]
async fn failed_multimodal_insert_rolls_back_everything() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("doomed.html", None, 0);
    let first = EmbeddedSection::new("one", 0, vec![1.0, 0.0]);
    let mut second = EmbeddedSection::new("two", 1, vec![0.0, 1.0]);
    // Force a primary-key violation on the second chunk insert, after the
    // resource and first chunk are already written inside the transaction.
    second.id = first.id.clone();

    let sections = vec![
        SectionChunk {
            text: vec!["one".into()],
            images: vec!["https://cdn.example.com/x.png".into()],
        },
        SectionChunk {
            text: vec!["two".into()],
            images: vec![],
        },
    ];

    let result = store
        .insert_multimodal_document(&resource, &[first, second], &sections)
        .await;

    assert!(result.is_err());
    assert_eq!(count(&store, "resources").await, 0);
    assert_eq!(count(&store, "embeddings_multimodal").await, 0);
    assert_eq!(count(&store, "image_resources").await, 0);
}

#[tokio::test]
async fn failed_text_insert_rolls_back_everything() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("doomed.pdf", None, 0);
    let first = EmbeddedChunk::new("one", vec![1.0, 0.0]);
    let mut second = EmbeddedChunk::new("two", vec![0.0, 1.0]);
    second.id = first.id.clone();

    let result = store.insert_document(&resource, &[first, second]).await;

    assert!(result.is_err());
    assert_eq!(count(&store, "resources").await, 0);
    assert_eq!(count(&store, "embeddings").await, 0);
}

#[tokio::test]
async fn legacy_two_write_path_can_orphan_a_resource() {
    let (_tmp, store) = test_store().await;

    let resource = Resource::new("legacy.html", None, 0);
    store.insert_resource(&resource).await.unwrap();

    let first = EmbeddedChunk::new("one", vec![1.0, 0.0]);
    let mut second = EmbeddedChunk::new("two", vec![0.0, 1.0]);
    second.id = first.id.clone();

    // Outside a transaction the first chunk lands before the failure.
    let result = store.insert_chunks(&resource.id, &[first, second]).await;

    assert!(result.is_err());
    assert_eq!(count(&store, "resources").await, 1);
    assert_eq!(count(&store, "embeddings").await, 1);
}
