//! # Mailsense
//!
//! A local-first semantic index and analysis engine for email corpora.
//!
//! Mailsense ingests email datasets, chunks and embeds message bodies
//! into a SQLite vector store, and answers questions over the corpus
//! with citation-grounded retrieval. A heuristic threat scorer flags
//! phishing-shaped messages, and a staged workflow ties retrieval,
//! classification, and answer generation into one traceable execution.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │  JSON emails │──▶│   Pipeline   │──▶│  SQLite   │
//! │  (normalize) │   │ Chunk+Embed  │   │  vectors  │
//! └──────────────┘   └──────────────┘   └─────┬─────┘
//!                                             │
//!                    ┌────────────┬───────────┤
//!                    ▼            ▼           ▼
//!              ┌──────────┐ ┌──────────┐ ┌──────────┐
//!              │  Search  │ │  Threat  │ │   RAG    │
//!              │ (cosine) │ │  scorer  │ │ answers  │
//!              └────┬─────┘ └────┬─────┘ └────┬─────┘
//!                   └────────────┴────────────┘
//!                                │
//!                          ┌───────────┐
//!                          │ Workflow  │
//!                          │   (mx)    │
//!                          └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mx init                          # create database
//! mx index emails.json             # normalize, chunk, embed, store
//! mx search "quarterly budget"     # ranked semantic search
//! mx ask "what came up in the security review?"
//! mx threats                       # scan recent messages
//! mx workflow "summarize urgent items"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`normalize`] | Raw email loading and normalization |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Chunk + embed + store pipeline |
//! | [`search`] | Semantic search over chunk vectors |
//! | [`threat`] | Heuristic threat scoring |
//! | [`classify`] | Intent detection, query expansion, classification |
//! | [`llm`] | Optional chat-completion backend |
//! | [`rag`] | Citation-grounded answer generation |
//! | [`workflow`] | Staged query orchestration |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Component error types |

pub mod chunk;
pub mod classify;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod rag;
pub mod search;
pub mod threat;
pub mod workflow;
