use std::path::Path;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{check_batch, check_profile, check_query, select_top, Collection, VectorStore};
use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::error::StoreError;
use crate::migrate::run_migrations;
use crate::models::{Document, EmbeddingProfile, Metadata, ScoredDocument};

/// SQLite-backed store. Similarity is computed in process over the
/// collection's stored vectors.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    read_only: bool,
}

impl SqliteVectorStore {
    /// Opens (creating if needed) the database and applies migrations.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let pool = db::connect(path).await?;
        run_migrations(&pool).await?;
        Ok(Self {
            pool,
            read_only: false,
        })
    }

    /// Opens an existing database for queries only.
    pub async fn open_read_only(path: &Path) -> Result<Self, StoreError> {
        let pool = db::connect_read_only(path).await?;
        Ok(Self {
            pool,
            read_only: true,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn writable(&self) -> Result<(), StoreError> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn open_or_create(
        &self,
        name: &str,
        profile: &EmbeddingProfile,
    ) -> Result<Collection, StoreError> {
        if let Some(existing) = self.open_collection(name).await? {
            return check_profile(existing, profile);
        }
        self.writable()?;

        sqlx::query(
            "INSERT INTO collections (name, model, dims, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(&profile.model)
        .bind(profile.dims as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        // Re-read so a concurrent creator with another profile is detected.
        match self.open_collection(name).await? {
            Some(c) => check_profile(c, profile),
            None => Err(StoreError::CollectionNotFound(name.to_string())),
        }
    }

    async fn open_collection(&self, name: &str) -> Result<Option<Collection>, StoreError> {
        let row = sqlx::query("SELECT model, dims FROM collections WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Collection {
            name: name.to_string(),
            profile: EmbeddingProfile::new(
                r.get::<String, _>("model"),
                r.get::<i64, _>("dims") as usize,
            ),
        }))
    }

    async fn put(
        &self,
        collection: &Collection,
        documents: &[Document],
        vectors: &[Vec<f32>],
    ) -> Result<Vec<String>, StoreError> {
        self.writable()?;
        check_batch(collection, documents, vectors)?;

        let mut tx = self.pool.begin().await?;
        let next: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM entries WHERE collection = ?",
        )
        .bind(&collection.name)
        .fetch_one(&mut *tx)
        .await?;

        let now = chrono::Utc::now().timestamp();
        let mut ids = Vec::with_capacity(documents.len());
        for (offset, (doc, vector)) in documents.iter().zip(vectors).enumerate() {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO entries (id, collection, position, text, metadata_json, embedding, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&collection.name)
            .bind(next + offset as i64)
            .bind(&doc.text)
            .bind(serde_json::to_string(&doc.metadata)?)
            .bind(vec_to_blob(vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            ids.push(id);
        }
        tx.commit().await?;

        Ok(ids)
    }

    async fn nearest(
        &self,
        collection: &Collection,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredDocument>, StoreError> {
        check_query(collection, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, position, text, metadata_json, embedding FROM entries WHERE collection = ?",
        )
        .bind(&collection.name)
        .fetch_all(&self.pool)
        .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata: Metadata = serde_json::from_str(row.get::<&str, _>("metadata_json"))?;
            candidates.push((
                row.get::<i64, _>("position"),
                ScoredDocument {
                    id: row.get("id"),
                    score: cosine_similarity(query, &blob_to_vec(&blob)),
                    document: Document {
                        text: row.get("text"),
                        metadata,
                    },
                },
            ));
        }

        Ok(select_top(candidates, k))
    }

    async fn count(&self, collection: &Collection) -> Result<usize, StoreError> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries WHERE collection = ?")
            .bind(&collection.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn clear(&self, name: &str) -> Result<(), StoreError> {
        self.writable()?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM entries WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
