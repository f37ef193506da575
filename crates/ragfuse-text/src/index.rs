use anyhow::{bail, Result};
use tantivy::collector::TopDocs;
use std::collections::BTreeSet;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::tokenizer::TokenStream;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::{debug, info};

use ragfuse_core::ranking::sort_candidates;
use ragfuse_core::types::{MetadataFilter, Provenance, ScoredCandidate, META_DIR};
use ragfuse_core::CorpusIndex;

use crate::tantivy_utils::{build_schema, register_tokenizer};

/// In-memory BM25 index over the leaf chunks of a corpus.
pub struct SparseIndex {
    index: Index,
    reader: IndexReader,
    id_field: Field,
    text_field: Field,
    dir_field: Field,
    num_docs: u64,
}

impl SparseIndex {
    pub fn build(corpus: &CorpusIndex, stop_words: &[String]) -> Result<Self> {
        let schema = build_schema();
        let index = Index::create_in_ram(schema.clone());
        register_tokenizer(&index, stop_words);
        let id_field = schema.get_field("id")?;
        let text_field = schema.get_field("text")?;
        let dir_field = schema.get_field("dir")?;

        let mut writer: IndexWriter = index.writer_with_num_threads(1, 50_000_000)?;
        for c in corpus.leaves() {
            writer.add_document(doc!(
                id_field => c.id.clone(),
                text_field => c.text.clone(),
                dir_field => c.dir().unwrap_or_default().to_string(),
            ))?;
        }
        writer.commit()?;
        let reader: IndexReader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
        let num_docs = reader.searcher().num_docs();
        info!(leaves = num_docs, "sparse index built");
        Ok(Self { index, reader, id_field, text_field, dir_field, num_docs })
    }

    pub fn num_docs(&self) -> u64 { self.num_docs }

    /// BM25 top-k among leaves matching `filter`; descending score, ties by id.
    pub fn search(&self, query_text: &str, top_k: usize, filter: Option<&MetadataFilter>) -> Result<Vec<ScoredCandidate>> {
        if top_k == 0 || self.num_docs == 0 { return Ok(Vec::new()); }
        let terms = self.query_terms(query_text)?;
        if terms.is_empty() {
            debug!(query = query_text, "query has no indexable terms");
            return Ok(Vec::new());
        }
        let text_query: Box<dyn Query> = Box::new(BooleanQuery::new_multiterms_query(terms));
        let query: Box<dyn Query> = match filter {
            None => text_query,
            Some(f) if f.key == META_DIR => {
                let term = Term::from_field_text(self.dir_field, &f.value);
                let restrict: Box<dyn Query> = Box::new(ConstScoreQuery::new(Box::new(TermQuery::new(term, IndexRecordOption::Basic)), 0.0));
                Box::new(BooleanQuery::new(vec![(Occur::Must, text_query), (Occur::Must, restrict)]))
            }
            Some(f) => bail!("sparse index cannot filter on metadata key '{}'", f.key),
        };

        let searcher = self.reader.searcher();
        // Collect every match so ties at the cut-off are broken by id, not by doc address.
        let limit = usize::try_from(self.num_docs).unwrap_or(usize::MAX).max(1);
        let top_docs = searcher.search(&*query, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, addr) in top_docs {
            let doc: TantivyDocument = searcher.doc(addr)?;
            let Some(id) = doc.get_first(self.id_field).and_then(|v| v.as_str()) else { continue };
            hits.push(ScoredCandidate::new(id, score, Provenance::Sparse));
        }
        sort_candidates(&mut hits);
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Distinct terms of `query_text` under the indexing analyzer, OR-ed as a bag of words.
    fn query_terms(&self, query_text: &str) -> Result<Vec<Term>> {
        let mut analyzer = self.index.tokenizer_for_field(self.text_field)?;
        let mut stream = analyzer.token_stream(query_text);
        let mut words = BTreeSet::new();
        while stream.advance() {
            words.insert(stream.token().text.clone());
        }
        Ok(words.into_iter().map(|w| Term::from_field_text(self.text_field, &w)).collect())
    }
}
