//! # Knowledge Agent
//!
//! A web-ingesting RAG knowledge base with grounded, cited answers.
//!
//! Knowledge Agent fetches a configured list of URLs, chunks and embeds
//! their text, stores everything in SQLite, and answers questions by
//! retrieving the most similar chunks and handing them to an LLM as
//! citation-tagged context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │ Fetcher  │──▶│   Pipeline    │──▶│  SQLite   │
//! │ (URLs)   │   │ Chunk+Embed  │   │ vectors   │
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │
//!                    ┌───────────────────┤
//!                    ▼                   ▼
//!               ┌──────────┐       ┌──────────┐
//!               │   CLI    │       │   HTTP   │
//!               │   (kb)   │       │  (/ask)  │
//!               └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb init                  # create database
//! kb ingest                # fetch, chunk, embed, store configured sources
//! kb ask "What changed?"   # grounded answer with citations
//! kb serve                 # start the HTTP API for the chat widget
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`chunk`] | Paragraph chunking with overlap |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat provider abstraction |
//! | [`fetch`] | Source fetching seam |
//! | [`store`] | Document/chunk persistence + similarity search |
//! | [`ingest`] | Ingestion pipeline |
//! | [`retrieve`] | Query-time retrieval |
//! | [`answer`] | Grounded answer synthesis |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod store;
