use crate::EvaluationRecord;

/// Marker ("... is correct.") after which an answer restates the rule text.
pub const ANSWER_SEPARATOR: &str = "옳다.";

/// Derives the evaluation query for one record.
///
/// An empty answer falls back to the question verbatim. Otherwise the text
/// after the first separator is used when non-empty, else the whole trimmed
/// answer.
pub fn synthesize_query(record: &EvaluationRecord) -> String {
    if record.answer.is_empty() {
        return record.question.clone();
    }

    let answer = record.answer.trim();
    answer
        .find(ANSWER_SEPARATOR)
        .map(|position| answer[position + ANSWER_SEPARATOR.len()..].trim())
        .filter(|candidate| !candidate.is_empty())
        .unwrap_or(answer)
        .to_string()
}
