//! Prompt and answer format for listwise LLM judgements.

const PROMPT_HEAD: &str = "Below is a numbered list of documents followed by a question.\n\
Reply with the numbers of the documents that help answer the question, most relevant first, \
each with a relevance score from 1 to 10. Leave out documents that are not relevant.\n\
Reply one document per line in exactly this form:\n\
Doc: 2, Relevance: 8\n\
Doc: 5, Relevance: 6\n\n";

pub fn build_prompt(query: &str, texts: &[String]) -> String {
    let mut prompt = String::from(PROMPT_HEAD);
    for (i, text) in texts.iter().enumerate() {
        prompt.push_str(&format!("Document {}:\n{}\n\n", i + 1, text));
    }
    prompt.push_str(&format!("Question: {}\nAnswer:\n", query));
    prompt
}

/// `(zero-based index, relevance)` pairs in answer order. Lines that do not
/// parse, indexes outside `1..=n` and repeats are skipped.
pub fn parse_judgements(answer: &str, n: usize) -> Vec<(usize, f32)> {
    let mut out: Vec<(usize, f32)> = Vec::new();
    for line in answer.lines() {
        let lower = line.to_ascii_lowercase();
        let Some(doc) = field_after(&lower, "doc:").and_then(|s| s.parse::<usize>().ok()) else { continue };
        let Some(rel) = field_after(&lower, "relevance:").and_then(|s| s.parse::<f32>().ok()) else { continue };
        if doc == 0 || doc > n || !rel.is_finite() || out.iter().any(|(i, _)| *i == doc - 1) { continue; }
        out.push((doc - 1, rel));
    }
    out
}

fn field_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)? + key.len();
    let rest = line[start..].trim_start();
    let end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
    let v = rest[..end].trim_end_matches('.');
    (!v.is_empty()).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lenient_lines() {
        let answer = "Doc: 2, Relevance: 9\nsome chatter\ndoc:1 , relevance: 4.5.\nDoc: 7, Relevance: 3\nDoc: 2, Relevance: 1";
        assert_eq!(parse_judgements(answer, 3), vec![(1, 9.0), (0, 4.5)]);
    }

    #[test]
    fn prompt_numbers_documents_from_one() {
        let p = build_prompt("q?", &["alpha".into(), "beta".into()]);
        assert!(p.contains("Document 1:\nalpha"));
        assert!(p.contains("Document 2:\nbeta"));
        assert!(p.ends_with("Question: q?\nAnswer:\n"));
    }
}
