//! # Unidesk
//!
//! A document-grounded question answering pipeline for university service
//! desks.
//!
//! Unidesk ingests institutional documents (PDF, DOCX, plain text), chunks
//! and embeds them into a SQLite-backed vector index, and answers student
//! questions by retrieving the most relevant passages and composing a
//! reply, either through an optional local language model or through a
//! deterministic rule-based composer when no model is configured or the
//! model misbehaves.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────┐   ┌────────────┐
//! │  Documents   │──▶│  Pipeline   │──▶│   SQLite   │
//! │ PDF/DOCX/TXT │   │ Chunk+Embed │   │ Vec Index  │
//! └──────────────┘   └─────────────┘   └──────┬─────┘
//!                                             │
//!                         ┌───────────────────┤
//!                         ▼                   ▼
//!                   ┌───────────┐      ┌───────────┐
//!                   │ Retrieval │─────▶│ Composer  │──▶ answer
//!                   │  (top-k)  │      │ rules/LLM │
//!                   └───────────┘      └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! unidesk init                          # create databases
//! unidesk train catalogo.pdf edital.docx
//! unidesk ask "Quais são as modalidades de ensino?"
//! unidesk repl                          # interactive session
//! unidesk stats
//! ```
//!
//! ## Guarantees
//!
//! The two entry points degrade instead of failing: `train` reports `false`
//! and logs the cause, `ask` always produces a non-empty reply even with
//! the embedding backend down. Long-running work (extraction, embedding
//! batches, search, generation) runs under explicit deadlines.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Shared error types |
//! | [`extract`] | PDF/DOCX/TXT text extraction |
//! | [`chunk`] | Separator-aware text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | SQLite-backed vector index |
//! | [`retrieve`] | Top-k retrieval |
//! | [`compose`] | Rule-based answer composition |
//! | [`generate`] | Optional Ollama generation |
//! | [`pipeline`] | End-to-end train/answer orchestration |
//! | [`history`] | In-session conversation window |
//! | [`logstore`] | Question/upload activity log |
//! | [`deadline`] | Deadline-bound task execution |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod compose;
pub mod config;
pub mod db;
pub mod deadline;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod history;
pub mod index;
pub mod logstore;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod retrieve;
