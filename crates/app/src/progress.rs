use indicatif::{ProgressBar, ProgressStyle};
use regulation_retrieval_core::{EvaluationProgress, SearchLog};

/// Terminal progress bar for an evaluation run.
pub struct EvaluationProgressBar {
    bar: ProgressBar,
    hits: u64,
}

impl Default for EvaluationProgressBar {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluationProgressBar {
    pub fn new() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            hits: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

impl EvaluationProgress for EvaluationProgressBar {
    fn started(&mut self, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("Evaluating");
        self.bar = bar;
        self.hits = 0;
    }

    fn record_scored(&mut self, _index: usize, log: &SearchLog) {
        if log.hit_found {
            self.hits += 1;
        }
        self.bar.set_message(format!("Evaluating (hits {})", self.hits));
        self.bar.inc(1);
    }

    fn finished(&mut self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(hit_found: bool) -> SearchLog {
        SearchLog {
            query: "q".to_string(),
            relevant_doc_id: "제1항".to_string(),
            retrieved_docs: Vec::new(),
            hit_found,
        }
    }

    #[test]
    fn default_bar_counts_hits_per_run() {
        let mut progress = EvaluationProgressBar::default();
        progress.started(3);
        progress.record_scored(0, &log(true));
        progress.record_scored(1, &log(false));
        progress.record_scored(2, &log(true));
        progress.finished();
        assert_eq!(progress.hits(), 2);

        progress.started(1);
        assert_eq!(progress.hits(), 0);
    }
}
