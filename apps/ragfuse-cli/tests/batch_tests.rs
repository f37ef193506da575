use async_trait::async_trait;
use std::fs;
use std::sync::Arc;

use ragfuse_cli::batch::{failed_queries, keyword_accuracy, read_queries, run_batch, write_answers, write_intermediate};
use ragfuse_core::config::PipelineConfig;
use ragfuse_core::data_processor::{ChunkingConfig, DataProcessor};
use ragfuse_core::traits::Generator;
use ragfuse_core::types::RetrievalMode;
use ragfuse_core::{CorpusIndex, Error, Result};
use ragfuse_pipeline::{assemble, Components};
use ragfuse_text::tantivy_utils::default_stop_words;

struct Echo;

#[async_trait]
impl Generator for Echo {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(if prompt.contains("roof") { "Collect rainwater in barrels.".into() } else { "Unknown.".into() })
    }
}

/// Fails whenever the solar document is in the prompt.
struct NoSolar;

#[async_trait]
impl Generator for NoSolar {
    async fn complete(&self, prompt: &str) -> Result<String> {
        if prompt.contains("solar") { Err(Error::GenerationFailure("upstream 500".into())) } else { Ok("Collect rainwater.".into()) }
    }
}

fn sparse_pipeline(data: &std::path::Path, generator: Arc<dyn Generator>) -> anyhow::Result<(Arc<CorpusIndex>, ragfuse_pipeline::FusionPipeline)> {
    fs::create_dir_all(data.join("water"))?;
    fs::create_dir_all(data.join("power"))?;
    fs::write(data.join("water/rain.txt"), "Rain Catchment\n\nCollect rainwater from the roof into barrels.")?;
    fs::write(data.join("power/solar.txt"), "Solar Basics\n\nMount solar panels facing south.")?;

    let processor = DataProcessor::with_config(ChunkingConfig { hierarchical: false, ..Default::default() });
    let corpus = Arc::new(CorpusIndex::new(processor.process_directory(data)?)?);
    let cfg = PipelineConfig { retrieval_mode: RetrievalMode::Sparse, ..Default::default() };
    let parts = Components {
        corpus: Arc::clone(&corpus),
        stop_words: default_stop_words(),
        embedder: None,
        vector_index: None,
        pair_scorer: None,
        generator: Some(generator),
    };
    Ok((corpus, assemble(cfg, parts)?))
}

#[tokio::test]
async fn batch_writes_answers_and_intermediate() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let (corpus, pipeline) = sparse_pipeline(&tmp.path().join("data"), Arc::new(Echo))?;

    let input = tmp.path().join("q.jsonl");
    fs::write(&input, concat!(
        "{\"id\": 1, \"query\": \"rainwater barrels\", \"document\": \"water\", \"keywords\": [\"rainwater\", \"barrels\", \"gutter\"], \"answer\": \"use barrels\"}\n",
        "\n",
        "{\"id\": \"two\", \"query\": \"rainwater\", \"document\": \"power\"}\n",
    ))?;
    let queries = read_queries(&input)?;
    assert_eq!(queries.len(), 2);

    let records = run_batch(&pipeline, &corpus, &queries, false).await;
    assert_eq!(records[0].answer, "Collect rainwater in barrels.");
    assert_eq!(records[0].paths, vec!["water/rain.txt".to_string()]);
    assert!(records[0].candidates[0].starts_with("Rain Catchment: "));
    assert!(records[1].candidates.is_empty());
    assert_eq!(records[1].answer, "Unknown.");

    let acc = keyword_accuracy(&records).unwrap();
    assert!((acc - 2.0 / 3.0).abs() < 1e-6);

    let out = tmp.path().join("out/answers.jsonl");
    write_answers(&out, &records)?;
    let lines: Vec<serde_json::Value> = fs::read_to_string(&out)?.lines().map(serde_json::from_str).collect::<std::result::Result<_, _>>()?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["id"], "two");
    assert!(lines.iter().all(|l| l.get("error").is_none()));
    assert_eq!(failed_queries(&records), 0);

    let inter = tmp.path().join("inter.json");
    write_intermediate(&inter, &records)?;
    let dumped: serde_json::Value = serde_json::from_str(&fs::read_to_string(&inter)?)?;
    assert_eq!(dumped[0]["gt"], "use barrels");
    assert!(dumped[1].get("keywords").is_none());
    Ok(())
}

#[tokio::test]
async fn failed_query_is_marked_in_answers() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let (corpus, pipeline) = sparse_pipeline(&tmp.path().join("data"), Arc::new(NoSolar))?;
    let input = tmp.path().join("q.jsonl");
    fs::write(&input, concat!(
        "{\"id\": 1, \"query\": \"rainwater barrels\", \"document\": \"water\"}\n",
        "{\"id\": 2, \"query\": \"solar panels\", \"document\": \"power\"}\n",
    ))?;
    let records = run_batch(&pipeline, &corpus, &read_queries(&input)?, false).await;
    assert_eq!(failed_queries(&records), 1);
    assert!(records[1].error.as_deref().is_some_and(|e| e.contains("upstream 500")));

    let out = tmp.path().join("answers.jsonl");
    write_answers(&out, &records)?;
    let lines: Vec<serde_json::Value> = fs::read_to_string(&out)?.lines().map(serde_json::from_str).collect::<std::result::Result<_, _>>()?;
    assert_eq!(lines[0]["answer"], "Collect rainwater.");
    assert!(lines[0].get("error").is_none());
    assert_eq!(lines[1]["answer"], "");
    assert!(lines[1]["error"].as_str().is_some_and(|e| e.contains("upstream 500")));
    Ok(())
}

#[test]
fn accuracy_absent_without_keywords() {
    assert!(keyword_accuracy(&[]).is_none());
}
