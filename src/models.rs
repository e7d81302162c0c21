//! Core data models shared by the ingestion and question-answering paths.
//!
//! Table records live in [`crate::tables`]; this module holds the document
//! side (chunks, retrieved context) and the per-request tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A chunk of a document's text, ready to be embedded and indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// `{document_id}_chunk_{chunk_index}`.
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk returned by nearest-neighbour search.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    /// Id of the document the chunk came from.
    pub source: String,
    pub chunk_index: i64,
    /// `1 - distance`; only meaningful for cosine distance.
    pub relevance: f64,
}

/// Response language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    pub fn as_str(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::Hindi => "hindi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is asking; controls tone and word budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Farmer,
    Planner,
    Researcher,
    #[default]
    General,
}

impl Persona {
    pub const ALL: [Persona; 4] = [
        Persona::Farmer,
        Persona::Planner,
        Persona::Researcher,
        Persona::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Persona::Farmer => "farmer",
            Persona::Planner => "planner",
            Persona::Researcher => "researcher",
            Persona::General => "general",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
