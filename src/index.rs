//! Persistent vector index for document chunks.
//!
//! The [`VectorIndex`] trait covers the operations the ingest and retrieval
//! paths need: an existence check by document id, an all-or-nothing insert
//! of a document's chunks with their vectors, and brute-force cosine
//! nearest-neighbour search.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteIndex`] | On-disk index at `index.path` |
//! | [`InMemoryIndex`] | Tests, and the fallback when the file cannot be opened |

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::models::Chunk;

/// A document ready to be written: its chunks and one vector per chunk.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub source_path: String,
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
}

impl NewDocument {
    fn check(&self) -> Result<()> {
        if self.chunks.len() != self.vectors.len() {
            bail!(
                "document {} has {} chunks but {} vectors",
                self.id,
                self.chunks.len(),
                self.vectors.len()
            );
        }
        Ok(())
    }
}

/// A chunk returned by [`VectorIndex::nearest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub chunk_id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Cosine distance to the query, `0.0` for an identical direction.
    pub distance: f64,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether any entries exist for `document_id`.
    async fn contains_document(&self, document_id: &str) -> Result<bool>;

    /// Insert a document's chunks atomically.
    ///
    /// Returns `false`, writing nothing, if the document id is already present.
    async fn insert_document(&self, doc: &NewDocument) -> Result<bool>;

    /// Up to `k` chunks closest to `query`, nearest first.
    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    async fn document_count(&self) -> Result<usize>;

    async fn chunk_count(&self) -> Result<usize>;
}

fn sort_and_truncate(mut hits: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(k);
    hits
}

// ============ SQLite ============

/// SQLite implementation of [`VectorIndex`].
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    /// Open the index file, creating it and its tables if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = crate::db::connect(path).await?;
        crate::migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn contains_document(&self, document_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?)
                 OR EXISTS(SELECT 1 FROM chunks WHERE document_id = ?)",
        )
        .bind(document_id)
        .bind(document_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_document(&self, doc: &NewDocument) -> Result<bool> {
        doc.check()?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO documents (id, source_path, chunk_count, indexed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.source_path)
        .bind(doc.chunks.len() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        for (chunk, vector) in doc.chunks.iter().zip(doc.vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, chunk_index, text, hash, embedding, dims)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&doc.id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, text, embedding FROM chunks WHERE dims = ?",
        )
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                Neighbor {
                    chunk_id: row.get("id"),
                    document_id: row.get("document_id"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    distance: cosine_distance(query, &blob_to_vec(&blob)) as f64,
                }
            })
            .collect();

        Ok(sort_and_truncate(hits, k))
    }

    async fn document_count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn chunk_count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}

// ============ In-memory ============

struct StoredChunk {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// In-memory index behind a `RwLock`; search is brute-force cosine distance.
#[derive(Default)]
pub struct InMemoryIndex {
    documents: RwLock<HashMap<String, Vec<StoredChunk>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn contains_document(&self, document_id: &str) -> Result<bool> {
        let docs = self.documents.read().map_err(poisoned)?;
        Ok(docs.contains_key(document_id))
    }

    async fn insert_document(&self, doc: &NewDocument) -> Result<bool> {
        doc.check()?;
        let mut docs = self.documents.write().map_err(poisoned)?;
        if docs.contains_key(&doc.id) {
            return Ok(false);
        }
        let stored = doc
            .chunks
            .iter()
            .zip(doc.vectors.iter())
            .map(|(chunk, vector)| StoredChunk {
                chunk: chunk.clone(),
                vector: vector.clone(),
            })
            .collect();
        docs.insert(doc.id.clone(), stored);
        Ok(true)
    }

    async fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let docs = self.documents.read().map_err(poisoned)?;
        let hits = docs
            .values()
            .flatten()
            .filter(|s| s.vector.len() == query.len())
            .map(|s| Neighbor {
                chunk_id: s.chunk.id.clone(),
                document_id: s.chunk.document_id.clone(),
                chunk_index: s.chunk.chunk_index,
                text: s.chunk.text.clone(),
                distance: cosine_distance(query, &s.vector) as f64,
            })
            .collect();
        Ok(sort_and_truncate(hits, k))
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.documents.read().map_err(poisoned)?.len())
    }

    async fn chunk_count(&self) -> Result<usize> {
        let docs = self.documents.read().map_err(poisoned)?;
        Ok(docs.values().map(Vec::len).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, vectors: Vec<Vec<f32>>) -> NewDocument {
        let chunks = vectors
            .iter()
            .enumerate()
            .map(|(i, _)| Chunk {
                id: format!("{}_chunk_{}", id, i),
                document_id: id.to_string(),
                chunk_index: i as i64,
                text: format!("{} text {}", id, i),
                hash: format!("h{}", i),
            })
            .collect();
        NewDocument {
            id: id.to_string(),
            source_path: format!("/data/{}.txt", id),
            chunks,
            vectors,
        }
    }

    async fn exercise(index: &dyn VectorIndex) {
        assert!(index.nearest(&[1.0, 0.0], 8).await.unwrap().is_empty());
        assert!(!index.contains_document("dang").await.unwrap());

        let d = doc("dang", vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]]);
        assert!(index.insert_document(&d).await.unwrap());
        assert!(index.contains_document("dang").await.unwrap());
        assert!(!index.insert_document(&d).await.unwrap());
        assert_eq!(index.document_count().await.unwrap(), 1);
        assert_eq!(index.chunk_count().await.unwrap(), 3);

        let hits = index.nearest(&[1.0, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "dang_chunk_0");
        assert_eq!(hits[1].chunk_id, "dang_chunk_2");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[0].distance >= 0.0);

        // vectors of another dimensionality are never compared
        assert!(index.nearest(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_memory_index() {
        exercise(&InMemoryIndex::new()).await;
    }

    #[tokio::test]
    async fn sqlite_index() {
        let dir = tempfile::TempDir::new().unwrap();
        let index = SqliteIndex::open(&dir.path().join("index.sqlite"))
            .await
            .unwrap();
        exercise(&index).await;
    }

    #[tokio::test]
    async fn sqlite_index_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.sqlite");
        {
            let index = SqliteIndex::open(&path).await.unwrap();
            index
                .insert_document(&doc("valsad", vec![vec![0.5, 0.5]]))
                .await
                .unwrap();
        }
        let index = SqliteIndex::open(&path).await.unwrap();
        assert!(index.contains_document("valsad").await.unwrap());
        assert_eq!(index.chunk_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mismatched_vectors_rejected() {
        let mut d = doc("x", vec![vec![1.0]]);
        d.vectors.clear();
        assert!(InMemoryIndex::new().insert_document(&d).await.is_err());
    }
}
