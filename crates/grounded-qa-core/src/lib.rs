//! # Grounded QA Core
//!
//! Pure logic for answering questions from a private corpus of plain-text
//! documents: section-aware chunking, hybrid BM25 + character n-gram
//! retrieval, and grounded answer synthesis with a refusal policy and
//! prompt-injection filtering.
//!
//! This crate performs no filesystem, network or async work. Ingestion,
//! snapshot files, session logs and transports live in the application crate
//! and talk to the core through [`models::RawDocument`],
//! [`store::SnapshotStore`] and [`models::QAResult`].
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`text`] | Tokenizer and text utilities |
//! | [`chunk`] | Section-aware overlapping chunker |
//! | [`retrieval`] | Hybrid retriever |
//! | [`answer`] | Grounded answer synthesizer |
//! | [`patterns`] | Injection / sensitive / numeric phrase lists |
//! | [`pipeline`] | Composition root |
//! | [`store`] | Snapshot store trait |

pub mod answer;
pub mod chunk;
pub mod models;
pub mod patterns;
pub mod pipeline;
pub mod retrieval;
pub mod store;
pub mod text;
