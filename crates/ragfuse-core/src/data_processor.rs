use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{Chunk, META_DIR, META_FILE_PATH, META_TITLE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Emit section → leaf hierarchies instead of a flat chunk list.
    pub hierarchical: bool,
    pub section_max_tokens: usize,
    pub leaf_max_tokens: usize,
    pub overlap_percent: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { hierarchical: true, section_max_tokens: 1024, leaf_max_tokens: 256, overlap_percent: 0.1 }
    }
}

/// Turns a directory of `.txt` files into chunks.
///
/// Every chunk carries `dir` (first path component under the data root),
/// `file_path` (path relative to the root) and `document_title` (first
/// non-empty line). In hierarchical mode a document with several sections
/// gets a root chunk (id = relative path) whose children are the sections,
/// and sections that exceed one leaf are split into overlapping leaf windows
/// linked back to the section.
#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Chunk>> {
        self.process_files(data_dir, self.list_txt_files(data_dir))
    }

    pub fn process_directory_limited(&self, data_dir: &Path, limit: usize) -> Result<Vec<Chunk>> {
        let mut files = self.list_txt_files(data_dir);
        if files.len() > limit {
            files.truncate(limit);
            info!(limit, "limited ingestion to first files");
        }
        self.process_files(data_dir, files)
    }

    fn process_files(&self, data_dir: &Path, files: Vec<PathBuf>) -> Result<Vec<Chunk>> {
        if files.is_empty() {
            info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), n = file_index + 1, total = files.len(), "processing file");
            let content = self.read_file_content(file_path)?;
            let rel = self.relative_path(file_path, data_dir);
            all_chunks.extend(self.chunk_document(&content, &rel));
        }
        info!(files = files.len(), chunks = all_chunks.len(), "processed corpus");
        Ok(all_chunks)
    }

    /// Chunk one document whose path relative to the data root is `rel`.
    pub fn chunk_document(&self, content: &str, rel: &str) -> Vec<Chunk> {
        let dir = rel.split('/').next().unwrap_or(rel).to_string();
        let title = content.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("").to_string();
        let stamp = |c: Chunk| c.with_meta(META_DIR, dir.clone()).with_meta(META_FILE_PATH, rel).with_meta(META_TITLE, title.clone());

        let cfg = &self.chunking_config;
        let mut chunks = Vec::new();
        if !cfg.hierarchical {
            for (i, text) in self.group_paragraphs(content, cfg.leaf_max_tokens).into_iter().enumerate() {
                chunks.push(stamp(Chunk::new(format!("{}#{}", rel, i), text)));
            }
            return chunks;
        }
        let sections = self.group_paragraphs(content, cfg.section_max_tokens);
        // A single section is the document; otherwise a document root owns the sections.
        let doc_id = (sections.len() > 1).then(|| rel.to_string());
        let section_ids: Vec<String> = (0..sections.len()).map(|i| format!("{}#s{}", rel, i)).collect();
        if let Some(doc_id) = &doc_id {
            chunks.push(stamp(Chunk::new(doc_id.clone(), content.trim()).with_children(section_ids.clone())));
        }
        for (section_id, section) in section_ids.into_iter().zip(sections) {
            let mut section_chunk = Chunk::new(section_id.clone(), section.clone());
            if let Some(doc_id) = &doc_id { section_chunk = section_chunk.with_parent(doc_id.clone()); }
            if self.count_tokens(&section) <= cfg.leaf_max_tokens {
                chunks.push(stamp(section_chunk));
                continue;
            }
            let leaves = self.split_words_with_overlap(&section, cfg.leaf_max_tokens);
            let leaf_ids: Vec<String> = (0..leaves.len()).map(|j| format!("{}.{}", section_id, j)).collect();
            chunks.push(stamp(section_chunk.with_children(leaf_ids.clone())));
            for (leaf_id, text) in leaf_ids.into_iter().zip(leaves) {
                chunks.push(stamp(Chunk::new(leaf_id, text).with_parent(section_id.clone())));
            }
        }
        chunks
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn relative_path(&self, file_path: &Path, data_dir: &Path) -> String {
        let rel = file_path.strip_prefix(data_dir).unwrap_or(file_path);
        rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
    }

    /// Greedily pack paragraphs into pieces of at most `max_tokens`; a single
    /// oversized paragraph is split into overlapping word windows.
    fn group_paragraphs(&self, content: &str, max_tokens: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;
        for paragraph in content.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let tokens = self.count_tokens(paragraph);
            if tokens > max_tokens {
                if !current.is_empty() { out.push(current.join("\n\n")); current.clear(); current_tokens = 0; }
                out.extend(self.split_words_with_overlap(paragraph, max_tokens));
                continue;
            }
            if current_tokens + tokens > max_tokens && !current.is_empty() {
                out.push(current.join("\n\n"));
                current.clear();
                current_tokens = 0;
            }
            current.push(paragraph);
            current_tokens += tokens;
        }
        if !current.is_empty() { out.push(current.join("\n\n")); }
        out
    }

    fn count_tokens(&self, text: &str) -> usize { let word_count = text.split_whitespace().count(); (word_count as f32 / 0.75) as usize }

    fn split_words_with_overlap(&self, text: &str, max_tokens: usize) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let words_per_chunk = ((max_tokens as f32 * 0.75) as usize).max(1);
        let overlap_words = ((words_per_chunk as f32 * self.chunking_config.overlap_percent) as usize).min(words_per_chunk - 1);
        let mut chunks = Vec::new(); let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() { break; }
            start = end - overlap_words;
        }
        chunks
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}
