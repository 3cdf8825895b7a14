use sqlx::SqlitePool;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::store::{SqliteVectorStore, VectorStore};

/// Creates the collection and entry tables. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            collection TEXT NOT NULL,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(collection, position),
            FOREIGN KEY (collection) REFERENCES collections(name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection, position)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// `docq init`: creates the schema and the configured collection.
pub async fn run_init(config: &Config) -> anyhow::Result<()> {
    if !config.embedding.is_enabled() {
        anyhow::bail!("embedding.provider is disabled; configure one before creating a collection");
    }
    let embedder = create_embedder(&config.embedding)?;
    let store = SqliteVectorStore::open(&config.db.path).await?;
    let collection = store
        .open_or_create(&config.index.collection, embedder.profile())
        .await?;
    let entries = store.count(&collection).await?;

    println!("init");
    println!("  database: {}", config.db.path.display());
    println!("  collection: {}", collection.name);
    println!("  embedding: {}", collection.profile);
    println!("  entries: {}", entries);
    println!("ok");

    store.close().await;
    Ok(())
}
