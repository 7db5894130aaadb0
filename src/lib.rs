//! # Portfolio RAG
//!
//! A retrieval-augmented question-answering service about one person's
//! portfolio: skills, projects, and contact details.
//!
//! Text snippets and uploaded files are embedded and appended to a flat L2
//! vector store. Questions are classified by intent, answered from the
//! nearest stored chunks by a remote chat model, and the answer is
//! post-processed with a few deterministic rules.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌───────────────┐
//! │ text / file  │──▶│  Embedder  │──▶│  VectorStore  │
//! │ (ingest)     │   │ HF/OpenAI… │   │ index + texts │
//! └──────────────┘   └────────────┘   └───────┬───────┘
//!                                             │
//!  query ─▶ intent ─▶ Retriever ◀─────────────┘
//!                        │
//!                        ▼
//!                  PromptBuilder ─▶ LLM ─▶ postprocess ─▶ answer
//! ```
//!
//! Pure logic (intent rules, prompt templates, post-processing, the flat
//! index) lives in the `portfolio-rag-core` crate; this crate adds I/O.
//!
//! ## Quick Start
//!
//! ```bash
//! folio init
//! folio ingest --text "Project Alpha - an ETL pipeline for sales data"
//! folio ingest --file cv.pdf
//! folio ask "list my projects"
//! folio serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`embedding`] | Embedding providers |
//! | [`store`] | Persisted vector store |
//! | [`retriever`] | Intent-aware retrieval |
//! | [`llm`] | Chat-completion client |
//! | [`extract`] | Text extraction for uploads |
//! | [`assistant`] | Ingest, chat, answer, inspect pipeline |
//! | [`commands`] | CLI command implementations |
//! | [`server`] | HTTP API |

pub mod assistant;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod llm;
pub mod retriever;
pub mod server;
pub mod store;
