//! JSONL batch runs: answers file, optional intermediate dump, keyword accuracy.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

use ragfuse_core::types::{Query, ScoredCandidate};
use ragfuse_core::CorpusIndex;
use ragfuse_pipeline::FusionPipeline;

#[derive(Debug, Clone, Deserialize)]
pub struct BatchQuery {
    #[serde(default)]
    pub id: serde_json::Value,
    pub query: String,
    /// Directory filter.
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    /// Reference answer, copied into the intermediate dump.
    #[serde(default)]
    pub answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerRecord {
    pub id: serde_json::Value,
    pub query: String,
    pub answer: String,
    /// Set when the query failed; `answer` is then empty and must not be read as one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntermediateRecord {
    pub id: serde_json::Value,
    pub query: String,
    pub answer: String,
    /// `title: text` of each final candidate.
    pub candidates: Vec<String>,
    pub paths: Vec<String>,
    pub scores: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn read_queries(path: &Path) -> Result<Vec<BatchQuery>> {
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| serde_json::from_str(l).with_context(|| format!("{}:{}: invalid query line", path.display(), i + 1)))
        .collect()
}

fn describe(corpus: &CorpusIndex, candidates: &[ScoredCandidate]) -> (Vec<String>, Vec<String>) {
    candidates
        .iter()
        .filter_map(|c| corpus.get(&c.chunk_id))
        .map(|chunk| (chunk.embed_text(), chunk.file_path().unwrap_or_default().to_string()))
        .unzip()
}

/// Run every query in order. A failed query is logged and recorded with its
/// error so one bad request does not sink the batch; see [`failed_queries`].
pub async fn run_batch(pipeline: &FusionPipeline, corpus: &CorpusIndex, queries: &[BatchQuery], show_progress: bool) -> Vec<IntermediateRecord> {
    let pb = if show_progress { ProgressBar::new(queries.len() as u64) } else { ProgressBar::hidden() };
    if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} queries {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }
    let mut records = Vec::with_capacity(queries.len());
    for q in queries {
        let mut query = Query::new(q.query.clone());
        query.directory_filter = q.document.clone();
        let (answer, candidates, error) = match pipeline.run(&query).await {
            Ok(out) => (out.answer, out.candidates, None),
            Err(e) => {
                warn!(id = %q.id, error = %e, "query failed");
                (String::new(), Vec::new(), Some(e.to_string()))
            }
        };
        let (texts, paths) = describe(corpus, &candidates);
        records.push(IntermediateRecord {
            id: q.id.clone(),
            query: q.query.clone(),
            answer,
            candidates: texts,
            paths,
            scores: candidates.iter().map(|c| c.score).collect(),
            keywords: q.keywords.clone(),
            gt: q.answer.clone(),
            error,
        });
        pb.inc(1);
    }
    pb.finish_and_clear();
    records
}

/// Mean over keyworded queries of the fraction of keywords found verbatim in
/// the answer. `None` when no query carries keywords.
pub fn keyword_accuracy(records: &[IntermediateRecord]) -> Option<f32> {
    let per_query: Vec<f32> = records
        .iter()
        .filter_map(|r| r.keywords.as_ref().filter(|k| !k.is_empty()).map(|k| (r, k)))
        .map(|(r, k)| k.iter().filter(|kw| r.answer.contains(kw.as_str())).count() as f32 / k.len() as f32)
        .collect();
    if per_query.is_empty() { return None; }
    Some(per_query.iter().sum::<f32>() / per_query.len() as f32)
}

pub fn failed_queries(records: &[IntermediateRecord]) -> usize {
    records.iter().filter(|r| r.error.is_some()).count()
}

pub fn write_answers(path: &Path, records: &[IntermediateRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) { fs::create_dir_all(parent)?; }
    let mut out = BufWriter::new(fs::File::create(path).with_context(|| format!("creating {}", path.display()))?);
    for r in records {
        let line = AnswerRecord { id: r.id.clone(), query: r.query.clone(), answer: r.answer.clone(), error: r.error.clone() };
        serde_json::to_writer(&mut out, &line)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_intermediate(path: &Path, records: &[IntermediateRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) { fs::create_dir_all(parent)?; }
    fs::write(path, serde_json::to_string_pretty(records)?).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
