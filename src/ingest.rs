//! Document ingestion: extract → chunk → embed → index.
//!
//! A document is added all-or-nothing. If its id is already in the index the
//! add is a successful no-op, so re-running ingestion over the same files
//! never duplicates chunks. Batch ingestion keeps going past failing files and
//! reports every outcome in an [`IngestSummary`].

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::chunk::chunk_text;
use crate::config::{Config, DocumentsConfig};
use crate::embedding::{embed_batched, EmbeddingProvider, InputType};
use crate::extract::extract_file;
use crate::index::{NewDocument, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added { chunks: usize },
    AlreadyIndexed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedDocument {
    pub document_id: String,
    pub path: String,
    pub chunks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedDocument {
    pub path: String,
    pub error: String,
}

/// Outcome of a batch ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestSummary {
    pub added: Vec<AddedDocument>,
    /// Ids that were already indexed.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedDocument>,
}

impl IngestSummary {
    pub fn chunks_written(&self) -> usize {
        self.added.iter().map(|a| a.chunks).sum()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Id used when the caller does not supply one: the file stem.
pub fn document_id_for(path: &Path) -> Result<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("cannot derive a document id from {}", path.display()))
}

/// Add one file to the index under `doc_id` (or its file stem).
pub async fn add_document(
    config: &Config,
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    path: &Path,
    doc_id: Option<&str>,
) -> Result<AddOutcome> {
    let document_id = match doc_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        Some(_) => bail!("document id cannot be empty"),
        None => document_id_for(path)?,
    };

    if index.contains_document(&document_id).await? {
        info!(document_id = %document_id, "document already indexed; skipping");
        return Ok(AddOutcome::AlreadyIndexed);
    }

    let text = extract_file(path)?;
    if text.trim().is_empty() {
        bail!("no text extracted from {}", path.display());
    }

    let chunks = chunk_text(&document_id, &text, &config.chunking);
    if chunks.is_empty() {
        bail!(
            "no chunks of at least {} characters in {}",
            config.chunking.min_chunk_chars,
            path.display()
        );
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embed_batched(
        embedder,
        &texts,
        config.embedding.batch_size,
        InputType::SearchDocument,
    )
    .await
    .with_context(|| format!("embedding failed for {}", path.display()))?;

    let chunk_count = chunks.len();
    let doc = NewDocument {
        id: document_id.clone(),
        source_path: path.display().to_string(),
        chunks,
        vectors,
    };
    if !index.insert_document(&doc).await? {
        return Ok(AddOutcome::AlreadyIndexed);
    }

    info!(document_id = %document_id, chunks = chunk_count, "document indexed");
    Ok(AddOutcome::Added {
        chunks: chunk_count,
    })
}

/// Add every path, ids derived from file stems. Failures do not stop the batch.
pub async fn add_documents(
    config: &Config,
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
    paths: &[PathBuf],
) -> IngestSummary {
    let mut summary = IngestSummary::default();

    for path in paths {
        let shown = path.display().to_string();
        let outcome = match document_id_for(path) {
            Ok(id) => add_document(config, index, embedder, path, Some(&id))
                .await
                .map(|o| (id, o)),
            Err(e) => Err(e),
        };
        match outcome {
            Ok((document_id, AddOutcome::Added { chunks })) => {
                summary.added.push(AddedDocument {
                    document_id,
                    path: shown,
                    chunks,
                });
            }
            Ok((document_id, AddOutcome::AlreadyIndexed)) => summary.skipped.push(document_id),
            Err(e) => {
                warn!(path = %shown, error = %format!("{:#}", e), "document not indexed");
                summary.failed.push(FailedDocument {
                    path: shown,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    info!(
        added = summary.added.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        chunks = summary.chunks_written(),
        "ingestion finished"
    );
    summary
}

/// Files under `documents.root` matching the include globs and none of the excludes.
pub fn scan_documents(config: &DocumentsConfig) -> Result<Vec<PathBuf>> {
    let root = config
        .root
        .as_ref()
        .ok_or_else(|| anyhow!("documents.root is not configured"))?;
    if !root.exists() {
        bail!("documents.root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        paths.push(path.to_path_buf());
    }

    // Sort for deterministic ordering
    paths.sort();
    Ok(paths)
}

/// Scan `documents.root` and ingest everything found.
pub async fn sync_documents(
    config: &Config,
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingProvider,
) -> Result<IngestSummary> {
    let paths = scan_documents(&config.documents)?;
    info!(files = paths.len(), "scanned document root");
    Ok(add_documents(config, index, embedder, &paths).await)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
