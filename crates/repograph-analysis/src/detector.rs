use repograph_core::{DetectorOverrides, Finding, RepographConfig, Result};
use repograph_graph::{GraphEnricher, GraphStore};
use std::path::{Path, PathBuf};

/// Everything a detector may consult: the graph store, configuration
/// overrides, and the repository root (for detectors that correlate graph
/// nodes back to source text or external tools).
pub struct AnalysisContext<'a> {
    pub store: &'a GraphStore,
    pub config: &'a RepographConfig,
    pub repo_path: PathBuf,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(store: &'a GraphStore, config: &'a RepographConfig, repo_path: &Path) -> Self {
        Self {
            store,
            config,
            repo_path: repo_path.to_path_buf(),
        }
    }

    pub fn overrides(&self) -> &DetectorOverrides {
        &self.config.detectors
    }

    pub fn enricher(&self) -> GraphEnricher<'a> {
        GraphEnricher::new(self.store)
    }

    /// Source of a graph-relative file path, when still readable.
    pub fn read_source(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.repo_path.join(relative)).ok()
    }
}

/// A code-smell detector. Detectors run in a fixed order; those that opt in
/// via `collaborates` receive the findings accumulated by earlier detectors
/// and may suppress duplicates, escalate severity, or add evidence.
pub trait Detector: Send + Sync {
    /// Stable identifier, also used for config lookup after normalization.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Grouping for reports.
    fn category(&self) -> &'static str {
        "code_smell"
    }

    /// Whether this detector consumes previously accumulated findings.
    fn collaborates(&self) -> bool {
        false
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, previous: &[Finding]) -> Result<Vec<Finding>>;
}

/// True for paths under test/spec/fixture directories; matched on path
/// segments so `attestation.py` does not trip it.
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.starts_with("tests/")
        || lower.starts_with("test/")
        || lower.starts_with("spec/")
        || lower.contains("/tests/")
        || lower.contains("/test/")
        || lower.contains("/spec/")
        || lower.contains("/fixtures/")
        || lower.contains("/testdata/")
        || lower
            .rsplit('/')
            .next()
            .map(|name| name.starts_with("test_") || name.ends_with("_test.py"))
            .unwrap_or(false)
}

/// True for fixture/example paths excluded from dead-code analysis.
pub fn is_fixture_or_example_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower.starts_with("examples/")
        || lower.contains("/examples/")
        || lower.starts_with("tests/fixtures/")
        || lower.contains("/tests/fixtures/")
        || lower.starts_with("test_fixtures/")
        || lower.contains("/test_fixtures/")
}
