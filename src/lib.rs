//! # Neerniti
//!
//! Retrieval-augmented question answering over Gujarat groundwater data.
//!
//! Two government spreadsheets (district-level and taluka-level groundwater
//! resource estimates) are loaded into typed in-memory tables. Narrative
//! documents (`.txt`, `.pdf`) are chunked, embedded and stored in a SQLite
//! vector index. A question is matched against both, the hits are rendered
//! into a persona- and language-aware prompt, and the prompt is sent to a
//! hosted text-generation model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐
//! │ .xlsx tables│──▶│ TabularStore│──┐
//! └─────────────┘   └─────────────┘  │   ┌──────────┐   ┌──────────┐
//!                                    ├──▶│  prompt  │──▶│ generate │
//! ┌─────────────┐   ┌─────────────┐  │   └──────────┘   └──────────┘
//! │ .txt / .pdf │──▶│ chunk+embed │──┘
//! └─────────────┘   │   SQLite    │
//!                   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use neerniti::config::load_config;
//! use neerniti::context::AppContext;
//! use neerniti::service::{chat, ChatRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config(std::path::Path::new("config/neerniti.toml"))?;
//! neerniti::logging::init(&config.logging)?;
//! let ctx = AppContext::load(config).await?;
//! let answer = chat(&ctx, &ChatRequest::new("How much rainfall does AHWA get?")).await?;
//! println!("{}", answer.response);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Chunks, languages, personas |
//! | [`spreadsheet`] | Minimal `.xlsx` reader |
//! | [`tables`] | District and taluka tables, keyword lookup |
//! | [`extract`] | Text extraction from `.txt` and `.pdf` |
//! | [`chunk`] | Paragraph-aware text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index (SQLite or in-memory) |
//! | [`ingest`] | Document ingestion pipeline |
//! | [`retrieve`] | Combined table and document retrieval |
//! | [`detect`] | Language and persona heuristics |
//! | [`prompt`] | Prompt templates |
//! | [`generate`] | Text generation client |
//! | [`context`] | Shared application state |
//! | [`service`] | Request-level operations |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod detect;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod service;
pub mod spreadsheet;
pub mod tables;
