use serde::Serialize;

/// What happened to one target PR during a sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum TargetOutcome {
    /// Description rewritten with the merged section
    Updated,
    /// Description already listed every link; nothing written
    Unchanged,
    /// Skip-if-present found the heading
    Skipped,
    /// Fetch or update failed; holds the error message
    Failed(String),
}

impl TargetOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TargetOutcome::Updated => "UPDATED",
            TargetOutcome::Unchanged => "UNCHANGED",
            TargetOutcome::Skipped => "SKIPPED",
            TargetOutcome::Failed(_) => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetResult {
    pub number: u64,
    pub outcome: TargetOutcome,
}

/// Aggregate result of merging links into a batch of PRs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Targets updated or already up to date
    pub success_count: usize,
    /// Targets whose fetch or update failed
    pub error_count: usize,
    /// Targets left alone by skip-if-present
    pub skipped_count: usize,
    /// Per-target outcomes in processing order
    pub results: Vec<TargetResult>,
}

impl SyncSummary {
    pub fn record(&mut self, number: u64, outcome: TargetOutcome) {
        match outcome {
            TargetOutcome::Updated | TargetOutcome::Unchanged => self.success_count += 1,
            TargetOutcome::Skipped => self.skipped_count += 1,
            TargetOutcome::Failed(_) => self.error_count += 1,
        }
        self.results.push(TargetResult { number, outcome });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }
}
