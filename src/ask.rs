//! `gqa ask`: answer one question against the saved index.

use anyhow::Result;
use grounded_qa_core::answer::is_refusal;
use grounded_qa_core::models::QAResult;
use grounded_qa_core::pipeline::Pipeline;

use crate::config::Config;
use crate::history::SessionLog;
use crate::snapshot::open_pipeline;

/// Event type recorded for every answered question.
pub const QA_EVENT: &str = "qa";

/// Answer `question` with `pipeline` and trace how it went.
pub fn answer(pipeline: &Pipeline, question: &str, top_k: usize) -> QAResult {
    let result = pipeline.ask(question, top_k);
    tracing::info!(
        top_k,
        citations = result.citations.len(),
        refused = is_refusal(&result.answer),
        "answered question"
    );
    result
}

/// Record a result in a session log.
pub fn log_result(log: &SessionLog, session_id: &str, result: &QAResult) -> Result<()> {
    log.append(session_id, QA_EVENT, serde_json::to_value(result)?)?;
    Ok(())
}

/// Load the index, answer, and print the [`QAResult`] as JSON.
pub fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    session: Option<&str>,
) -> Result<()> {
    let pipeline = open_pipeline(config)?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let result = answer(&pipeline, question, top_k);

    if let Some(session_id) = session {
        log_result(&SessionLog::new(&config.history.dir), session_id, &result)?;
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
