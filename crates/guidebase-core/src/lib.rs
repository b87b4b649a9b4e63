//! # Guidebase Core
//!
//! Shared logic for Guidebase: data models, token-bounded chunking (plain
//! text and HTML), the store abstraction, the retrieval algorithm, and the
//! embedding traits.
//!
//! This crate contains no tokio, sqlx, HTTP, or other I/O dependencies.
//! Everything here is pure and deterministic; the `guidebase` application
//! crate supplies the SQLite store, the embedding providers, and the server.

pub mod chunk;
pub mod embedding;
pub mod html;
pub mod models;
pub mod retrieve;
pub mod store;
pub mod token;
