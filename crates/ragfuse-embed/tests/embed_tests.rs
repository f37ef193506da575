use ragfuse_core::config::EmbeddingConfig;
use ragfuse_embed::{get_default_embedder, get_default_pair_scorer};

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake models to avoid loading large checkpoints
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(&EmbeddingConfig::default()).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "other words".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim follows config");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
    assert!(v1.iter().zip(embs[2].iter()).any(|(a, b)| (a - b).abs() > 1e-6));
}

#[test]
fn fake_pair_scorer_prefers_overlap() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let scorer = get_default_pair_scorer(None, 512).expect("scorer");
    let texts = vec!["nothing relevant".to_string(), "configure the router".to_string()];
    let scores = scorer.score_pairs("configure router", &texts).expect("scores");
    assert_eq!(scores.len(), 2);
    assert!(scores[1] > scores[0]);
}
