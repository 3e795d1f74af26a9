use crate::error::Result;
use crate::report::HealthReport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Consumed by the core: something that persists a finished report.
/// Implementations (JSON, HTML, ...) live outside this workspace.
pub trait ReportWriter {
    fn write(&mut self, report: &HealthReport) -> Result<()>;
}

/// Invoked at least once per file processed: (current, total, filename).
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Cooperative cancellation signal, checked at natural checkpoints
/// (between files during ingest, between detectors during analysis).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_propagates_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
