//! Ranking metrics for datasets with exactly one relevant document per query.
//!
//! For a record whose relevant document sits at 0-based `rank` in the
//! retrieved list, and a cutoff `k`, a hit means `rank < k`. Per record:
//!
//! | Metric      | Hit                     | Miss |
//! |-------------|-------------------------|------|
//! | recall@k    | 1                       | 0    |
//! | precision@k | 1/k                     | 0    |
//! | f1@k        | 2PR/(P+R)               | 0    |
//! | mrr@k       | 1/(rank+1)              | 0    |
//! | map@k       | 1/(rank+1)              | 0    |
//! | ndcg@k      | 1/log2(rank+2)          | 0    |
//!
//! `map@k` equals `mrr@k` only because a single relevant document exists;
//! it is not general Average Precision.
//!
//! Each record is retrieved once at depth `max(K)` and that list is scored
//! for every cutoff. Sums are accumulated in record order and divided by the
//! record count at the end, so sequential and concurrent runs produce the
//! same numbers.

use crate::error::EvalError;
use crate::models::{
    Evaluation, EvaluationOptions, EvaluationRecord, MetricsTable, RankMetrics,
    RetrievalFailurePolicy, SearchLog,
};
use crate::query::synthesize_query;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::str::FromStr;
use tracing::{info, warn};

/// Non-empty, ascending set of positive rank cutoffs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutoffs {
    values: Vec<usize>,
}

impl Cutoffs {
    pub fn new(values: impl IntoIterator<Item = usize>) -> Result<Self, EvalError> {
        let mut values: Vec<usize> = values.into_iter().collect();
        if values.is_empty() {
            return Err(EvalError::InvalidCutoffs("at least one cutoff is required".to_string()));
        }
        if values.contains(&0) {
            return Err(EvalError::InvalidCutoffs("cutoffs must be positive".to_string()));
        }
        values.sort_unstable();
        values.dedup();
        Ok(Self { values })
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.values
    }

    /// Retrieval depth that covers every cutoff.
    pub fn max(&self) -> usize {
        self.values.last().copied().unwrap_or_default()
    }
}

impl FromStr for Cutoffs {
    type Err = EvalError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let values = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<usize>()
                    .map_err(|error| EvalError::InvalidCutoffs(format!("{part:?}: {error}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(values)
    }
}

/// Receives progress callbacks from an evaluation run.
pub trait EvaluationProgress {
    fn started(&mut self, _total: usize) {}
    fn record_scored(&mut self, _index: usize, _log: &SearchLog) {}
    fn finished(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl EvaluationProgress for NoProgress {}

pub fn first_hit_rank(retrieved: &[String], relevant_doc_id: &str) -> Option<usize> {
    retrieved.iter().position(|doc| doc == relevant_doc_id)
}

/// Contribution of one record at cutoff `k`.
pub fn score_rank(rank: Option<usize>, k: usize) -> RankMetrics {
    let Some(rank) = rank.filter(|rank| *rank < k) else {
        return RankMetrics::default();
    };

    let recall = 1.0;
    let precision = 1.0 / k as f64;
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };
    let reciprocal = 1.0 / (rank as f64 + 1.0);

    RankMetrics {
        recall,
        precision,
        f1,
        mrr: reciprocal,
        map: reciprocal,
        ndcg: 1.0 / (rank as f64 + 2.0).log2(),
    }
}

struct RunState {
    sums: BTreeMap<usize, RankMetrics>,
    logs: Vec<SearchLog>,
}

impl RunState {
    fn new(cutoffs: &Cutoffs, capacity: usize) -> Self {
        Self {
            sums: cutoffs
                .as_slice()
                .iter()
                .map(|k| (*k, RankMetrics::default()))
                .collect(),
            logs: Vec::with_capacity(capacity),
        }
    }

    fn push(
        &mut self,
        record: &EvaluationRecord,
        query: String,
        retrieved_docs: Vec<String>,
    ) -> &SearchLog {
        let rank = first_hit_rank(&retrieved_docs, &record.relevant_doc_id);
        for (k, sum) in &mut self.sums {
            sum.accumulate(&score_rank(rank, *k));
        }

        self.logs.push(SearchLog {
            query,
            relevant_doc_id: record.relevant_doc_id.clone(),
            retrieved_docs,
            hit_found: rank.is_some(),
        });
        &self.logs[self.logs.len() - 1]
    }

    fn finish(self) -> Evaluation {
        let count = self.logs.len();
        let metrics: MetricsTable = self
            .sums
            .into_iter()
            .map(|(k, sum)| (k, sum.mean_over(count)))
            .collect();
        Evaluation {
            metrics,
            logs: self.logs,
        }
    }
}

fn resolve_retrieval<E: Display>(
    outcome: Result<Vec<String>, E>,
    index: usize,
    policy: RetrievalFailurePolicy,
) -> Result<Vec<String>, EvalError> {
    match (outcome, policy) {
        (Ok(docs), _) => Ok(docs),
        (Err(error), RetrievalFailurePolicy::Abort) => Err(EvalError::Retrieval {
            index,
            message: error.to_string(),
        }),
        (Err(error), RetrievalFailurePolicy::RecordMiss) => {
            warn!(index, error = %error, "retrieval failed; scoring record as a miss");
            Ok(Vec::new())
        }
    }
}

/// Scores `retrieve` against `records` one record at a time.
///
/// `retrieve(query, depth)` is called exactly once per record with
/// `depth = cutoffs.max()`.
pub fn evaluate<F, E>(
    records: &[EvaluationRecord],
    cutoffs: &Cutoffs,
    options: &EvaluationOptions,
    mut retrieve: F,
    progress: &mut dyn EvaluationProgress,
) -> Result<Evaluation, EvalError>
where
    F: FnMut(&str, usize) -> Result<Vec<String>, E>,
    E: Display,
{
    let depth = cutoffs.max();
    let mut state = RunState::new(cutoffs, records.len());
    progress.started(records.len());

    for (index, record) in records.iter().enumerate() {
        let query = synthesize_query(record);
        let retrieved = resolve_retrieval(retrieve(&query, depth), index, options.failure_policy)?;
        let log = state.push(record, query, retrieved);
        progress.record_scored(index, log);
    }

    progress.finished();
    info!(records = records.len(), cutoffs = ?cutoffs.as_slice(), "evaluation finished");
    Ok(state.finish())
}

/// Like [`evaluate`], with up to `options.concurrency` retrievals in flight.
///
/// Outcomes are consumed in input order, so aggregation matches the
/// sequential run exactly. An aborting failure drops the remaining
/// in-flight retrievals.
pub async fn evaluate_concurrent<F, Fut, E>(
    records: &[EvaluationRecord],
    cutoffs: &Cutoffs,
    options: &EvaluationOptions,
    retrieve: F,
    progress: &mut dyn EvaluationProgress,
) -> Result<Evaluation, EvalError>
where
    F: Fn(String, usize) -> Fut,
    Fut: Future<Output = Result<Vec<String>, E>>,
    E: Display,
{
    let depth = cutoffs.max();
    let mut state = RunState::new(cutoffs, records.len());
    progress.started(records.len());

    let mut outcomes = stream::iter(records.iter().map(|record| {
        let query = synthesize_query(record);
        let pending = retrieve(query.clone(), depth);
        async move { (query, pending.await) }
    }))
    .buffered(options.concurrency.max(1));

    let mut index = 0;
    while let Some((query, outcome)) = outcomes.next().await {
        let retrieved = resolve_retrieval(outcome, index, options.failure_policy)?;
        let log = state.push(&records[index], query, retrieved);
        progress.record_scored(index, log);
        index += 1;
    }

    progress.finished();
    info!(
        records = records.len(),
        concurrency = options.concurrency,
        cutoffs = ?cutoffs.as_slice(),
        "evaluation finished"
    );
    Ok(state.finish())
}
