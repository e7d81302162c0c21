//! Request-level operations.
//!
//! Each function takes the shared [`AppContext`] and returns a `Serialize`
//! type, so a transport layer only has to route and encode.
//!
//! | Function | Returns |
//! |----------|---------|
//! | [`chat`] | [`ChatResponse`] |
//! | [`data_summary`] | [`DataSummary`] |
//! | [`health`] | [`Health`] |
//! | [`sample_queries`] | [`SampleQueries`] |
//! | [`search_location`] | [`LocationSearch`] |

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::detect::{detect_language, detect_user_type};
use crate::models::{Language, Persona};
use crate::prompt::compose;
use crate::retrieve::retrieve;
use crate::tables::{LocationSearch, SampleLocations, TablesSummary};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// Response language; detected from the message when absent.
    #[serde(default)]
    pub language: Option<Language>,
    /// Persona; detected from the message when absent.
    #[serde(default)]
    pub user_type: Option<Persona>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub selected_language: Language,
    pub detected_language: Language,
    pub user_type: Persona,
    pub data_found: bool,
    pub found_locations: Vec<String>,
    /// Ids of the documents that supplied excerpts.
    pub sources: Vec<String>,
    /// `"answered"`, `"empty"`, or why generation failed.
    pub generation: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("Question cannot be empty")]
    EmptyMessage,
}

/// Answer one question: detect, retrieve, compose, generate.
///
/// An empty or whitespace-only message is rejected before any retrieval or
/// provider call. Provider failures are not errors; they surface as an
/// apology in `response` and a non-`"answered"` `generation` status.
pub async fn chat(ctx: &AppContext, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
    let question = request.message.trim();
    if question.is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    let detected_language = detect_language(question);
    let selected_language = request.language.unwrap_or(detected_language);
    let user_type = request
        .user_type
        .unwrap_or_else(|| detect_user_type(question));

    let context = retrieve(
        &ctx.tables,
        ctx.index.as_ref(),
        ctx.embedder.as_ref(),
        &ctx.config.retrieval,
        question,
    )
    .await;

    let prompt = compose(question, &context, user_type, selected_language);
    debug!(prompt_chars = prompt.chars().count(), "prompt composed");

    let generation = ctx.generator.generate(&prompt).await;
    info!(
        language = %selected_language,
        user_type = %user_type,
        data_found = context.tables.has_location_data,
        chunks = context.chunks.len(),
        generation = generation.status(),
        "question answered"
    );

    Ok(ChatResponse {
        response: generation.reply_text().to_string(),
        selected_language,
        detected_language,
        user_type,
        data_found: context.tables.has_location_data,
        sources: context.sources(),
        found_locations: context.tables.found_locations,
        generation: generation.status(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub documents: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    #[serde(flatten)]
    pub tables: TablesSummary,
    pub documents: DocumentSummary,
}

/// Row and column counts for both tables plus indexed document counts.
pub async fn data_summary(ctx: &AppContext) -> anyhow::Result<DataSummary> {
    Ok(DataSummary {
        tables: ctx.tables.summary(),
        documents: DocumentSummary {
            documents: ctx.index.document_count().await?,
            chunks: ctx.index.chunk_count().await?,
        },
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct TableCounts {
    pub district_rows: usize,
    pub taluka_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    /// `"ok"`, or `"degraded"` when the index cannot be read.
    pub status: &'static str,
    pub version: &'static str,
    pub tables: TableCounts,
    pub documents: usize,
}

pub async fn health(ctx: &AppContext) -> Health {
    let (status, documents) = match ctx.index.document_count().await {
        Ok(n) => ("ok", n),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "vector index unreadable");
            ("degraded", 0)
        }
    };
    Health {
        status,
        version: env!("CARGO_PKG_VERSION"),
        tables: TableCounts {
            district_rows: ctx.tables.districts().len(),
            taluka_rows: ctx.tables.talukas().len(),
        },
        documents,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Bilingual {
    pub english: Vec<&'static str>,
    pub hindi: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleQueries {
    pub farmer_queries: Bilingual,
    pub planner_queries: Bilingual,
    pub sample_locations: SampleLocations,
    pub usage_tips: Bilingual,
}

const SAMPLE_LOCATION_COUNT: usize = 5;

/// Example questions per persona and language, plus real location names.
pub fn sample_queries(ctx: &AppContext) -> SampleQueries {
    SampleQueries {
        farmer_queries: Bilingual {
            english: vec![
                "What is the groundwater level in AHWA for farming?",
                "Is AHWA taluka suitable for farming?",
                "How much rainfall does AHWA get?",
                "Is groundwater good for crops in DANG district?",
                "Tell me about groundwater discharge in AHWA",
            ],
            hindi: vec![
                "अहवा में खेती के लिए भूजल स्तर क्या है?",
                "क्या अहवा तालुका खेती के लिए उपयुक्त है?",
                "अहवा में कितनी बारिश होती है?",
                "क्या डांग जिले में भूजल फसल के लिए अच्छा है?",
                "अहवा में भूजल स्राव के बारे में बताएं",
            ],
        },
        planner_queries: Bilingual {
            english: vec![
                "What are the groundwater trends in DANG district for water policy planning?",
                "What is the rainfall data for AHWA taluka?",
                "What is the recharge potential analysis for AHWA?",
                "How should water allocation be planned for DANG district?",
                "What are the geographical area statistics for AHWA?",
            ],
            hindi: vec![
                "जल नीति योजना के लिए डांग जिले में भूजल के रुझान क्या हैं?",
                "अहवा तालुका के लिए वर्षा डेटा क्या है?",
                "अहवा के लिए रिचार्ज क्षमता विश्लेषण क्या है?",
                "डांग जिले के लिए जल आवंटन की योजना कैसे बनाई जाए?",
                "अहवा के लिए भौगोलिक क्षेत्र के आंकड़े क्या हैं?",
            ],
        },
        sample_locations: ctx.tables.sample_locations(SAMPLE_LOCATION_COUNT),
        usage_tips: Bilingual {
            english: vec![
                "Mention your role (farmer/planner) for better responses",
                "Ask about specific locations like AHWA, DANG for detailed data",
                "Use keywords: groundwater, irrigation, farming, rainfall, discharge",
            ],
            hindi: vec![
                "बेहतर उत्तर के लिए अपनी भूमिका (किसान/योजनाकार) का उल्लेख करें",
                "विस्तृत डेटा के लिए अहवा, डांग जैसे विशिष्ट स्थानों के बारे में पूछें",
                "मुख्य शब्द का उपयोग करें: भूजल, सिंचाई, खेती, वर्षा, स्राव",
            ],
        },
    }
}

/// Table rows for one location name.
pub fn search_location(ctx: &AppContext, location: &str) -> LocationSearch {
    ctx.tables
        .search_location(location, ctx.config.retrieval.table_match_limit)
}
