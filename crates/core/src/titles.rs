use crate::error::IngestError;
use crate::EvaluationRecord;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Every `<...>` rule title in the text, trimmed and de-duplicated in order
/// of first appearance.
pub fn extract_rule_titles(text: &str) -> Result<Vec<String>, IngestError> {
    let title_re = Regex::new(r"<([^<>]+)>")?;
    let mut seen = HashSet::new();

    Ok(title_re
        .captures_iter(text)
        .filter_map(|capture| capture.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|title| !title.is_empty())
        .filter(|title| seen.insert(title.clone()))
        .collect())
}

/// Relevant document ids from the dataset that no extracted title covers.
pub fn uncovered_articles(titles: &[String], records: &[EvaluationRecord]) -> Vec<String> {
    let known: HashSet<&str> = titles.iter().map(String::as_str).collect();
    let mut reported = HashSet::new();

    records
        .iter()
        .map(|record| record.relevant_doc_id.as_str())
        .filter(|article| !known.contains(article))
        .filter(|article| reported.insert(*article))
        .map(str::to_string)
        .collect()
}

pub fn render_title_listing(titles: &[String]) -> String {
    let mut out = String::from("Rule titles extracted from PDF\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    for (index, title) in titles.iter().enumerate() {
        let _ = writeln!(out, "{:3}. {}", index + 1, title);
    }
    let _ = writeln!(out, "\n{} rule titles found.", titles.len());
    out
}
