//! # Grounded QA
//!
//! Answers natural-language questions from a private corpus of plain-text
//! documents, and refuses when the corpus does not support an answer.
//!
//! The chunking, retrieval and answering algorithms live in
//! [`grounded_qa_core`]; this crate supplies the collaborators around them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌───────────────────────────┐   ┌────────────┐
//! │   ingest    │──▶│  Pipeline (core)          │──▶│  snapshot  │
//! │ walk + read │   │  chunk → retrieve → answer│   │ index.json │
//! └─────────────┘   └─────────────┬─────────────┘   └────────────┘
//!                                 │
//!                     ┌───────────┴───────────┐
//!                     ▼                       ▼
//!                ┌──────────┐           ┌──────────┐
//!                │   CLI    │           │   HTTP   │──▶ history (JSONL)
//!                │  (gqa)   │           │  (axum)  │
//!                └──────────┘           └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`ingest`] | File discovery and reading |
//! | [`snapshot`] | JSON snapshot store |
//! | [`history`] | Per-session JSONL event log |
//! | [`ask`] | `gqa ask` |
//! | [`stats`] | Index statistics |
//! | [`sanity`] | End-to-end smoke report |
//! | [`server`] | HTTP server |

pub mod ask;
pub mod config;
pub mod history;
pub mod ingest;
pub mod sanity;
pub mod server;
pub mod snapshot;
pub mod stats;
