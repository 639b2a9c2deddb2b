use crate::error::EvalError;
use crate::metrics::Cutoffs;
use crate::models::{Evaluation, EvaluationRecord, EvaluationReport, MetricsTable};
use chrono::{DateTime, Local};
use serde::Deserialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    input: RawInput,
    output: RawOutput,
}

#[derive(Debug, Default, Deserialize)]
struct RawInput {
    #[serde(default)]
    question: String,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    #[serde(default)]
    answer: String,
    article: String,
}

impl From<RawRecord> for EvaluationRecord {
    fn from(raw: RawRecord) -> Self {
        Self {
            question: raw.input.question,
            answer: raw.output.answer,
            relevant_doc_id: raw.output.article,
        }
    }
}

pub fn parse_dataset(raw: &str, path: &Path) -> Result<Vec<EvaluationRecord>, EvalError> {
    let records: Vec<RawRecord> =
        serde_json::from_str(raw).map_err(|error| EvalError::DatasetMalformed {
            path: path.display().to_string(),
            details: error.to_string(),
        })?;
    Ok(records.into_iter().map(EvaluationRecord::from).collect())
}

/// Loads `[{input: {question}, output: {answer, article}}, ...]`.
pub fn load_dataset(path: &Path) -> Result<Vec<EvaluationRecord>, EvalError> {
    if !path.is_file() {
        return Err(EvalError::DatasetNotFound(path.display().to_string()));
    }

    let raw = fs::read_to_string(path)?;
    let records = parse_dataset(&raw, path)?;
    info!(path = %path.display(), records = records.len(), "loaded evaluation dataset");
    Ok(records)
}

pub fn build_report(
    model_name: &str,
    dataset: &Path,
    vector_store: &Path,
    cutoffs: &Cutoffs,
    evaluation: Evaluation,
    evaluated_at: DateTime<Local>,
) -> EvaluationReport {
    EvaluationReport {
        model_name: model_name.to_string(),
        dataset: dataset.display().to_string(),
        vector_store: vector_store.display().to_string(),
        evaluation_time: evaluated_at.to_rfc3339(),
        k_values: cutoffs.as_slice().to_vec(),
        metrics: evaluation.metrics,
        logs: evaluation.logs,
    }
}

pub fn report_file_name(evaluated_at: DateTime<Local>) -> String {
    format!(
        "retriever_evaluation_log_{}.json",
        evaluated_at.format("%Y%m%d_%H%M%S")
    )
}

pub fn save_report(
    report: &EvaluationReport,
    output_dir: &Path,
    evaluated_at: DateTime<Local>,
) -> Result<PathBuf, EvalError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(report_file_name(evaluated_at));
    fs::write(&path, serde_json::to_string_pretty(report)?)?;
    info!(path = %path.display(), "saved evaluation report");
    Ok(path)
}

pub fn render_summary(metrics: &MetricsTable) -> String {
    let mut out = String::from("--- Retriever evaluation results ---\n");
    for (k, values) in metrics {
        let _ = writeln!(out, "\n--- Metrics for k={k} ---");
        for (name, value) in values.named_values() {
            let _ = writeln!(out, "{}: {value:.4}", capitalize(name));
        }
    }
    out.push_str("------------------------------------\n");
    out
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RankMetrics, SearchLog};
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn nested_fields_are_flattened() -> Result<(), Box<dyn std::error::Error>> {
        let raw = r#"[
            {"id": "1", "input": {"question": "맞는 표기는?"}, "output": {"answer": "가 옳다. 규정", "article": "제1항"}},
            {"output": {"article": "제2항"}}
        ]"#;

        let records = parse_dataset(raw, Path::new("data.json"))?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].question, "맞는 표기는?");
        assert_eq!(records[0].relevant_doc_id, "제1항");
        assert_eq!(records[1].question, "");
        assert_eq!(records[1].answer, "");
        Ok(())
    }

    #[test]
    fn missing_article_is_malformed() {
        let raw = r#"[{"input": {"question": "q"}, "output": {"answer": "a"}}]"#;
        match parse_dataset(raw, Path::new("data.json")) {
            Err(EvalError::DatasetMalformed { path, .. }) => assert_eq!(path, "data.json"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        match load_dataset(Path::new("/no/such/dataset.json")) {
            Err(EvalError::DatasetNotFound(path)) => assert!(path.contains("dataset.json")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_json_file_is_malformed() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.json");
        fs::write(&path, "not json")?;
        assert!(matches!(
            load_dataset(&path),
            Err(EvalError::DatasetMalformed { .. })
        ));
        Ok(())
    }

    #[test]
    fn report_is_saved_under_timestamped_name() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let at = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .ok_or("ambiguous local time")?;
        let cutoffs = Cutoffs::new([1, 3])?;
        let evaluation = Evaluation {
            metrics: MetricsTable::from([
                (1, RankMetrics::default()),
                (3, RankMetrics::default()),
            ]),
            logs: vec![SearchLog {
                query: "띄어쓰기".to_string(),
                relevant_doc_id: "제2항".to_string(),
                retrieved_docs: vec!["제2항".to_string()],
                hit_found: true,
            }],
        };

        let report = build_report(
            "model",
            Path::new("data.json"),
            Path::new("store"),
            &cutoffs,
            evaluation,
            at,
        );
        let path = save_report(&report, &dir.path().join("logs"), at)?;

        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("retriever_evaluation_log_20240309_140507.json")
        );
        let written = fs::read_to_string(&path)?;
        assert!(written.contains("띄어쓰기"));
        assert!(written.contains("\"k_values\""));
        let parsed: EvaluationReport = serde_json::from_str(&written)?;
        assert_eq!(parsed, report);
        Ok(())
    }

    #[test]
    fn summary_lists_every_metric_per_cutoff() {
        let metrics = MetricsTable::from([(
            5,
            RankMetrics {
                recall: 0.5,
                precision: 0.1,
                f1: 1.0 / 6.0,
                mrr: 0.25,
                map: 0.25,
                ndcg: 0.3,
            },
        )]);
        let summary = render_summary(&metrics);
        assert!(summary.contains("--- Metrics for k=5 ---"));
        assert!(summary.contains("Recall: 0.5000"));
        assert!(summary.contains("F1: 0.1667"));
        assert!(summary.contains("Ndcg: 0.3000"));
    }
}
