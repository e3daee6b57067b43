//! Ingestion: file discovery, reading, and the `gqa ingest` command.
//!
//! Turns user-supplied paths into [`RawDocument`]s. Directories are walked
//! recursively and filtered through the configured include/exclude globs;
//! explicitly named files only need a supported text extension. Unreadable
//! or non-UTF-8 files are skipped with a warning so one bad file never fails
//! a batch.

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use grounded_qa_core::models::{IngestStats, RawDocument};
use grounded_qa_core::pipeline::{Pipeline, StagedIngest};
use grounded_qa_core::store::SnapshotStore;
use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{Config, IngestConfig};
use crate::snapshot::JsonSnapshotStore;

/// Extensions accepted for explicitly named files.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "rst", "log"];

/// Always excluded when walking directories.
const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Expand `paths` into a deterministic list of text files.
pub fn discover_files(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;
    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(path).follow_links(config.follow_symlinks) {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry.path().strip_prefix(path).unwrap_or(entry.path());
                let rel_str = relative.to_string_lossy().replace('\\', "/");
                if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                    continue;
                }
                found.push(entry.into_path());
            }
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            if has_supported_extension(path) {
                files.push(path.clone());
            } else {
                tracing::warn!(path = %path.display(), "skipping unsupported file type");
            }
        } else {
            tracing::warn!(path = %path.display(), "skipping missing path");
        }
    }
    Ok(files)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}

/// Read one file as a document, or `None` if it is unreadable or not UTF-8.
pub fn read_document(path: &Path) -> Option<RawDocument> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable file");
            return None;
        }
    };
    let text = match String::from_utf8(bytes) {
        Ok(t) => t,
        Err(_) => {
            tracing::warn!(path = %path.display(), "skipping non-UTF-8 file");
            return None;
        }
    };
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let source_path = path.to_string_lossy().replace('\\', "/");
    Some(RawDocument::from_text(source, source_path, text))
}

/// Discover and read every document under `paths`.
pub fn ingest_paths(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<RawDocument>> {
    let files = discover_files(paths, config)?;
    let docs: Vec<RawDocument> = files.iter().filter_map(|p| read_document(p)).collect();
    tracing::info!(files = files.len(), documents = docs.len(), "read documents");
    Ok(docs)
}

/// JSON printed by `gqa ingest`.
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub status: &'static str,
    #[serde(flatten)]
    pub stats: IngestStats,
    pub index: String,
}

/// Build the next generation from `docs` and write it to the snapshot.
/// `pipeline` is only read; commit the result to make it live.
pub fn stage_ingest(
    config: &Config,
    pipeline: &Pipeline,
    docs: &[RawDocument],
    append: bool,
) -> Result<StagedIngest> {
    let staged = pipeline.prepare_ingest(docs, append);
    JsonSnapshotStore::new(&config.index.path).save(staged.chunks())?;
    Ok(staged)
}

/// Ingest `paths` into `pipeline` and persist the result to the snapshot.
/// The pipeline only changes once the snapshot has been written.
pub fn ingest_into(
    config: &Config,
    pipeline: &mut Pipeline,
    paths: &[PathBuf],
    append: bool,
) -> Result<IngestStats> {
    let docs = ingest_paths(paths, &config.ingest)?;
    let staged = stage_ingest(config, pipeline, &docs, append)?;
    pipeline.commit(staged)
}

/// `gqa ingest`: build (or extend) the snapshot and print stats as JSON.
pub fn run_ingest(config: &Config, paths: &[PathBuf], append: bool) -> Result<()> {
    let mut pipeline = config.pipeline();
    if append {
        pipeline.load(&JsonSnapshotStore::new(&config.index.path))?;
    }
    let stats = ingest_into(config, &mut pipeline, paths, append)?;
    let report = IngestReport {
        status: "ok",
        stats,
        index: config.index.path.display().to_string(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
