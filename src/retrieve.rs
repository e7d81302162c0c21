//! Retriever: table keyword matching and document vector search.

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RetrievalConfig;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::RetrievedChunk;
use crate::tables::{TableMatches, TabularStore};

/// Everything retrieved for one question.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    pub tables: TableMatches,
    pub chunks: Vec<RetrievedChunk>,
}

impl RetrievedContext {
    pub fn has_context(&self) -> bool {
        !self.tables.is_empty() || !self.chunks.is_empty()
    }

    /// Distinct document ids the chunks came from, in rank order.
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        for c in &self.chunks {
            if !sources.contains(&c.source) {
                sources.push(c.source.clone());
            }
        }
        sources
    }
}

/// Embed `question` and return up to `top_k` nearest chunks.
///
/// `relevance = 1 - distance`. Distances are cosine distances, so relevance is
/// the cosine similarity. An empty index yields no chunks and no provider call.
pub async fn query_documents(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    question: &str,
    top_k: usize,
) -> anyhow::Result<Vec<RetrievedChunk>> {
    if top_k == 0 || index.chunk_count().await? == 0 {
        return Ok(Vec::new());
    }

    let query = embed_query(embedder, question).await?;
    let hits = index.nearest(&query, top_k).await?;

    Ok(hits
        .into_iter()
        .map(|n| RetrievedChunk {
            text: n.text,
            source: n.document_id,
            chunk_index: n.chunk_index,
            relevance: 1.0 - n.distance,
        })
        .collect())
}

/// Run the channels enabled by `config.mode`.
///
/// A failing embedding provider is logged and treated as "no chunks".
pub async fn retrieve(
    tables: &TabularStore,
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    config: &RetrievalConfig,
    question: &str,
) -> RetrievedContext {
    let mut context = RetrievedContext::default();

    if config.mode.uses_tables() {
        context.tables = tables.search(question, config.table_match_limit);
    }

    if config.mode.uses_documents() {
        match query_documents(index, embedder, question, config.top_k).await {
            Ok(chunks) => context.chunks = chunks,
            Err(e) => warn!(error = %format!("{:#}", e), "document retrieval failed; continuing without chunks"),
        }
    }

    debug!(
        mode = ?config.mode,
        taluka_rows = context.tables.taluka_data.len(),
        district_rows = context.tables.district_data.len(),
        chunks = context.chunks.len(),
        "retrieval finished"
    );
    context
}
