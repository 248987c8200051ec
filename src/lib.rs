//! # doc-lens
//!
//! Local document question answering with cited sources.
//!
//! doc-lens ingests PDFs, scanned images and plain text or markdown,
//! extracts typed elements (titles, paragraphs, list items, tables,
//! charts), chunks and embeds them into a SQLite vector index, and answers
//! natural-language questions from the retrieved chunks. Every source in an
//! answer points at a `(filename, page, element type)` triple.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌──────────┐
//! │  Extract  │──▶│  Chunk  │──▶│   Embed   │──▶│  SQLite  │
//! │ PDF/OCR/MD│   │         │   │           │   │ vectors  │
//! └───────────┘   └─────────┘   └───────────┘   └────┬─────┘
//!                                                    │
//!                  ┌──────────┐   ┌──────────┐       │
//!  question ──────▶│ Retrieve │◀──│  Search  │◀──────┘
//!                  └────┬─────┘   └──────────┘
//!                       ▼
//!                  ┌──────────┐
//!                  │  Answer  │──▶ {answer, sources}
//!                  │  (LLM)   │
//!                  └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! lens init                         # create database
//! lens add ./reports                # ingest a directory
//! lens query "What is in the revenue table?"
//! lens stats
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`extract`] | File → typed elements (text, PDF, images) |
//! | [`ocr`] | OCR engine abstraction (tesseract) |
//! | [`chunk`] | Element-aware chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | SQLite vector index |
//! | [`retrieve`] | Top-k retrieval with per-page cap |
//! | [`llm`] | Chat-completion providers |
//! | [`answer`] | Citation-grounded answers |
//! | [`rag`] | Ingestion and query orchestrator |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`commands`], [`stats`] | `lens` command handlers |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod ocr;
pub mod progress;
pub mod rag;
pub mod retrieve;
mod retry;
pub mod stats;
