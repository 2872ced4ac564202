//! # Research Assistant
//!
//! Retrieval-augmented question answering over PDFs and web pages.
//!
//! Documents are split into overlapping character windows, embedded, and
//! stored in a SQLite-backed vector index. Questions retrieve the most
//! similar chunks, which are handed to a language model together with a
//! fixed instruction to answer only from that context and cite sources.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │   Loader    │──▶│ Chunk + Embed │──▶│  SQLite  │
//! │  PDF / URL  │   └──────────────┘   │  vectors │
//! └─────────────┘                      └────┬─────┘
//!                                           │ top-k
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌──────────┐        ┌──────────┐
//!                 │ Composer │──LLM──▶│  Answer  │
//!                 └──────────┘        │+citations│
//!                                     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! research-assistant init
//! research-assistant ingest paper.pdf
//! research-assistant ingest-url https://example.com/article
//! research-assistant ask "What does the paper conclude?"
//! research-assistant serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Crate error type and HTTP error codes |
//! | [`models`] | Core data types |
//! | [`loader`] | PDF and web page loading |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Persistent vector index |
//! | [`ingest`] | Write path: load → chunk → embed → store |
//! | [`retrieve`] | Read path: question → top-k chunks |
//! | [`llm`] | Chat-completion backends |
//! | [`answer`] | Prompt rendering and cited answers |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;

#[cfg(test)]
#[path = "../tests/common/pdf.rs"]
mod pdf_fixture;
