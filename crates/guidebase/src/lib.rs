//! # Guidebase
//!
//! A retrieval-augmented knowledge base for grounding chat assistants.
//!
//! Guidebase ingests uploaded documents (PDF and HTML), splits them into
//! token-bounded chunks, embeds the chunks through a remote embedding
//! provider, and stores them in SQLite. At query time it embeds the
//! question, ranks stored chunks by cosine similarity, and returns the top
//! matches — the grounding material an external chat/LLM orchestrator feeds
//! into its answers via the `get_information` tool.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌───────────┐
//! │ File upload  │──▶│    Pipeline      │──▶│  SQLite   │
//! │  PDF / HTML  │   │ Extract+Chunk    │   │  vectors  │
//! └──────────────┘   │     +Embed       │   └─────┬─────┘
//!                    └──────────────────┘         │
//!                          ┌──────────────────────┤
//!                          ▼                      ▼
//!                    ┌──────────┐          ┌────────────┐
//!                    │   CLI    │          │    HTTP    │
//!                    │ (gbase)  │          │ tools API  │
//!                    └──────────┘          └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gbase init                        # create database
//! gbase ingest manual.pdf           # ingest a document
//! gbase search "how do I reset?"    # retrieve grounding chunks
//! gbase serve                       # start the HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite store implementation |
//! | [`extract`] | PDF/HTML text extraction |
//! | [`providers`] | Remote embedding providers |
//! | [`pipeline`] | Ingestion orchestration |
//! | [`tools`] | Retrieval tool registry and step budget |
//! | [`server`] | HTTP server |

pub mod config;
pub mod db;
pub mod extract;
pub mod migrate;
pub mod pipeline;
pub mod providers;
pub mod server;
pub mod sqlite_store;
pub mod tools;
