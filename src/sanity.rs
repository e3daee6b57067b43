//! `gqa sanity`: an end-to-end smoke run.
//!
//! Ingests the given paths (replacing the index and saving the snapshot),
//! asks two summary questions plus one that must be refused, and writes the
//! results as a JSON report.

use anyhow::{Context, Result};
use grounded_qa_core::answer::is_refusal;
use grounded_qa_core::models::QAResult;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::ingest::ingest_into;

/// Default report location, relative to the working directory.
pub const DEFAULT_OUTPUT: &str = "artifacts/sanity_output.json";

/// Questions the corpus is expected to answer.
pub const SANITY_QUESTIONS: [&str; 2] = [
    "Summarize the main contribution in 3 bullets.",
    "What are the key assumptions or limitations?",
];

/// A question the corpus should never answer.
pub const REFUSAL_QUESTION: &str = "What is the CEO phone number?";

#[derive(Debug, Serialize)]
pub struct SanityReport {
    pub qa: Vec<QAResult>,
    pub demo: SanityDemo,
}

#[derive(Debug, Serialize)]
pub struct SanityDemo {
    pub ingested_documents: usize,
    pub indexed_chunks: usize,
    /// The refusal case, with its (empty) citations.
    pub failure_behavior: QAResult,
}

/// Ingest `paths`, persist the index, and answer the fixed questions.
pub fn build_report(config: &Config, paths: &[PathBuf]) -> Result<SanityReport> {
    let mut pipeline = config.pipeline();
    let stats = ingest_into(config, &mut pipeline, paths, false)?;
    let top_k = config.retrieval.top_k;

    let qa = SANITY_QUESTIONS
        .iter()
        .map(|q| pipeline.ask(q, top_k))
        .collect();
    let failure_behavior = pipeline.ask(REFUSAL_QUESTION, top_k);
    if !is_refusal(&failure_behavior.answer) {
        tracing::warn!(question = REFUSAL_QUESTION, "refusal question was answered");
    }

    Ok(SanityReport {
        qa,
        demo: SanityDemo {
            ingested_documents: stats.documents,
            indexed_chunks: stats.chunks,
            failure_behavior,
        },
    })
}

/// Write `report` to `output` as pretty JSON, creating parent directories.
pub fn write_report(report: &SanityReport, output: &Path) -> Result<String> {
    let body = serde_json::to_string_pretty(report)?;
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create report dir: {}", parent.display()))?;
        }
    }
    std::fs::write(output, &body)
        .with_context(|| format!("Failed to write report: {}", output.display()))?;
    Ok(body)
}

/// `gqa sanity`: build the report, save it, and print it.
pub fn run_sanity(config: &Config, paths: &[PathBuf], output: &Path) -> Result<()> {
    let report = build_report(config, paths)?;
    let body = write_report(&report, output)?;
    tracing::info!(output = %output.display(), "wrote sanity report");
    println!("{}", body);
    Ok(())
}
