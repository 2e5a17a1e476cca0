use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Sourcing,
    Enriching,
    Persisting,
    Reporting,
    Done,
    Failed,
}

impl PipelineStage {
    fn can_advance_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        matches!(
            (self, next),
            (Idle, Sourcing)
                | (Idle, Failed)
                | (Sourcing, Enriching)
                // an empty sourcing pass ends the run
                | (Sourcing, Reporting)
                | (Enriching, Persisting)
                | (Persisting, Reporting)
                | (Reporting, Sourcing)
                | (Reporting, Done)
        )
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Records the stages a run walks through and refuses illegal jumps.
#[derive(Debug)]
pub struct StageTracker {
    label: &'static str,
    history: Vec<PipelineStage>,
}

impl StageTracker {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            history: vec![PipelineStage::Idle],
        }
    }

    pub fn current(&self) -> PipelineStage {
        *self.history.last().unwrap_or(&PipelineStage::Idle)
    }

    pub fn history(&self) -> &[PipelineStage] {
        &self.history
    }

    pub fn advance(&mut self, next: PipelineStage) -> anyhow::Result<()> {
        let current = self.current();
        if !current.can_advance_to(next) {
            anyhow::bail!("[{}] illegal stage transition {} -> {}", self.label, current, next);
        }
        log::debug!("[{}] {} -> {}", self.label, current, next);
        self.history.push(next);
        Ok(())
    }

    /// Fatal precondition failure before any work. Only legal from `Idle`.
    pub fn fail(&mut self, reason: &dyn fmt::Display) -> anyhow::Result<()> {
        log::error!("[{}] {}", self.label, reason);
        self.advance(PipelineStage::Failed)
    }
}
