//! # portfolio-rag core
//!
//! I/O-free logic shared by the `portfolio-rag` service: query intent
//! classification, the flat L2 vector index, retrieval filtering, prompt
//! templates, answer post-processing, and the embedding trait.
//!
//! This crate contains no tokio, HTTP, or filesystem dependencies. The
//! application crate supplies embedding providers, persistence, and the
//! completion client.

pub mod answer;
pub mod embedding;
pub mod index;
pub mod intent;
pub mod models;
pub mod prompt;
pub mod retrieval;
