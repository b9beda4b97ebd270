use std::sync::Mutex;

use xp::engine::{CampaignReport, CampaignSummary, Reporter, TaskProgress};

/// Reporter that keeps everything it was told.
#[derive(Default)]
pub struct RecordingReporter {
    pub summaries: Mutex<Vec<CampaignSummary>>,
    /// `(completed, total, task name)` per progress call.
    pub progress: Mutex<Vec<(usize, usize, String)>>,
    pub finished: Mutex<Vec<CampaignReport>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed_counts(&self) -> Vec<usize> {
        self.progress.lock().unwrap().iter().map(|p| p.0).collect()
    }
}

impl Reporter for RecordingReporter {
    fn summary(&self, summary: &CampaignSummary) {
        self.summaries.lock().unwrap().push(summary.clone());
    }

    fn progress(&self, p: &TaskProgress<'_>) {
        self.progress
            .lock()
            .unwrap()
            .push((p.completed, p.total, p.task.to_string()));
    }

    fn finished(&self, report: &CampaignReport) {
        self.finished.lock().unwrap().push(report.clone());
    }
}
