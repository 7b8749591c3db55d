//! # FirstFix Core
//!
//! Runtime-free logic for FirstFix: data models, chunking, ingestion
//! budgets, the vector index and its store abstraction, retrieval, and
//! guidance normalization.
//!
//! Network clients, SQLite storage, caches and the request pipeline live
//! in the `firstfix` crate; this crate only defines the collaborator
//! traits they implement ([`source::SourceProvider`],
//! [`embedding::EmbeddingService`], [`store::VectorStore`]).

pub mod budget;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod guidance;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod source;
pub mod store;
