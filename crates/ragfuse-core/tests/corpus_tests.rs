use ragfuse_core::types::{Chunk, META_FILE_PATH};
use ragfuse_core::{CorpusIndex, Error};

fn tree() -> Vec<Chunk> {
    vec![
        Chunk::new("p", "parent").with_children(["a", "b", "c"]),
        Chunk::new("a", "first").with_parent("p"),
        Chunk::new("b", "second").with_parent("p"),
        Chunk::new("c", "third").with_parent("p"),
    ]
}

#[test]
fn duplicate_ids_are_rejected() {
    let err = CorpusIndex::new(vec![Chunk::new("x", "1"), Chunk::new("x", "2")]).unwrap_err();
    assert!(matches!(err, Error::InvalidCorpus(_)));
}

#[test]
fn dangling_parent_is_rejected() {
    let err = CorpusIndex::new(vec![Chunk::new("a", "1").with_parent("missing")]).unwrap_err();
    assert!(matches!(err, Error::InvalidCorpus(_)));
}

#[test]
fn child_must_point_back() {
    let chunks = vec![Chunk::new("p", "parent").with_children(["a"]), Chunk::new("a", "orphan")];
    assert!(CorpusIndex::new(chunks).is_err());
}

#[test]
fn navigation() {
    let corpus = CorpusIndex::new(tree()).unwrap();
    assert_eq!(corpus.len(), 4);
    assert_eq!(corpus.leaves().count(), 3);
    assert_eq!(corpus.parent_of("b").map(|c| c.id.as_str()), Some("p"));
    assert_eq!(corpus.children_of("p").len(), 3);

    let (prev, next) = corpus.neighbors("b");
    assert_eq!(prev.map(|c| c.id.as_str()), Some("a"));
    assert_eq!(next.map(|c| c.id.as_str()), Some("c"));
    let (prev, next) = corpus.neighbors("a");
    assert!(prev.is_none());
    assert_eq!(next.map(|c| c.id.as_str()), Some("b"));
    assert!(matches!(corpus.require("zzz"), Err(Error::NotFound(_))));
}

#[test]
fn root_neighbors_share_a_file() {
    let chunks = vec![
        Chunk::new("f#0", "zero").with_meta(META_FILE_PATH, "f.txt"),
        Chunk::new("g#0", "other").with_meta(META_FILE_PATH, "g.txt"),
        Chunk::new("f#1", "one").with_meta(META_FILE_PATH, "f.txt"),
    ];
    let corpus = CorpusIndex::new(chunks).unwrap();
    let (prev, next) = corpus.neighbors("f#1");
    assert_eq!(prev.map(|c| c.id.as_str()), Some("f#0"));
    assert!(next.is_none());
}
