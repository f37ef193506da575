//! Turning ranked candidates into generation context.

use std::sync::Arc;

use ragfuse_core::error::Result;
use ragfuse_core::traits::ContentResolver;
use ragfuse_core::types::ContextMode;
use ragfuse_core::CorpusIndex;

pub const QA_TEMPLATE: &str = "Context information is below.\n\
---------------------\n\
{context_str}\n\
---------------------\n\
Using only the context information above and no prior knowledge, answer the question.\n\
Question: {query_str}\n\
Answer: ";

/// Resolves chunk ids against the corpus in one of the `ContextMode` renderings.
pub struct CorpusResolver {
    corpus: Arc<CorpusIndex>,
    mode: ContextMode,
}

impl CorpusResolver {
    pub fn new(corpus: Arc<CorpusIndex>, mode: ContextMode) -> Self { Self { corpus, mode } }
}

impl ContentResolver for CorpusResolver {
    fn resolve(&self, chunk_id: &str) -> Result<String> {
        let chunk = self.corpus.require(chunk_id)?;
        Ok(match self.mode {
            ContextMode::Text => chunk.text.clone(),
            ContextMode::TitleText => chunk.embed_text(),
            ContextMode::Neighbors => {
                let (prev, next) = self.corpus.neighbors(chunk_id);
                let parts: Vec<&str> = prev.iter().map(|c| c.text.as_str())
                    .chain(std::iter::once(chunk.text.as_str()))
                    .chain(next.iter().map(|c| c.text.as_str()))
                    .collect();
                parts.join("\n")
            }
        })
    }

    fn knows(&self, chunk_id: &str) -> bool { self.corpus.get(chunk_id).is_some() }
}

/// `### Document {i}: {content}` blocks, zero-based, separated by a blank line.
pub fn render_context(contents: &[String]) -> String {
    contents.iter().enumerate().map(|(i, c)| format!("### Document {}: {}", i, c)).collect::<Vec<_>>().join("\n\n")
}

/// Fill both placeholders in one pass, so placeholder text inside retrieved
/// context or the query is left as written.
pub fn format_qa_prompt(context_str: &str, query_str: &str) -> String {
    let mut out = String::with_capacity(QA_TEMPLATE.len() + context_str.len() + query_str.len());
    let mut rest = QA_TEMPLATE;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{context_str}") {
            out.push_str(context_str);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{query_str}") {
            out.push_str(query_str);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
