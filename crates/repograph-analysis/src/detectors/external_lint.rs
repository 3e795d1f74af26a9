use crate::detector::{AnalysisContext, Detector};
use repograph_core::{finding_id, Finding, NodeLabel, Result, Severity};
use repograph_graph::NodeRecord;
use serde::Deserialize;
use serde_json::json;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One diagnostic parsed from the external tool's JSON output.
#[derive(Debug, Clone, Deserialize)]
pub struct LintDiagnostic {
    pub file: String,
    pub line: u32,
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub severity: Option<String>,
}

/// Hybrid detector template: invoke an external linter, parse its JSON
/// diagnostics, correlate each to the nearest graph node by (filePath,
/// line), and emit findings. A missing tool is a logged no-op; findings
/// duplicating earlier detectors' results on the same entity are
/// suppressed.
pub struct ExternalLinterDetector {
    tool: &'static str,
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalLinterDetector {
    pub fn new(tool: &'static str, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            tool,
            command: command.into(),
            args,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the tool with a subprocess timeout; the child is killed when the
    /// budget expires.
    fn invoke(&self, ctx: &AnalysisContext<'_>) -> Option<String> {
        let mut child = match Command::new(&self.command)
            .args(&self.args)
            .current_dir(&ctx.repo_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                debug!(tool = self.tool, error = %e, "external linter not available");
                return None;
            }
        };

        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(_status)) => break,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(tool = self.tool, "external linter timed out, killing it");
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    warn!(tool = self.tool, error = %e, "failed waiting for linter");
                    return None;
                }
            }
        }

        let mut output = String::new();
        use std::io::Read;
        if let Some(mut stdout) = child.stdout.take() {
            let _ = stdout.read_to_string(&mut output);
        }
        Some(output)
    }

    fn parse(&self, output: &str) -> Vec<LintDiagnostic> {
        match serde_json::from_str::<Vec<LintDiagnostic>>(output) {
            Ok(diagnostics) => diagnostics,
            Err(e) => {
                warn!(tool = self.tool, error = %e, "could not parse linter output");
                Vec::new()
            }
        }
    }

    /// The graph node whose line span most tightly contains the
    /// diagnostic.
    fn correlate(&self, ctx: &AnalysisContext<'_>, diagnostic: &LintDiagnostic) -> Option<NodeRecord> {
        let mut best: Option<NodeRecord> = None;
        for label in [NodeLabel::Function, NodeLabel::Class, NodeLabel::File] {
            for node in ctx.store.nodes_with_label(label) {
                if node.file_path() != diagnostic.file {
                    continue;
                }
                if node.line_start() > diagnostic.line || node.line_end() < diagnostic.line {
                    continue;
                }
                let span = node.line_end() - node.line_start();
                let tighter = best
                    .as_ref()
                    .map(|b| span < b.line_end() - b.line_start())
                    .unwrap_or(true);
                if tighter {
                    best = Some(node);
                }
            }
            if best.is_some() {
                return best;
            }
        }
        best
    }

    fn severity_of(&self, diagnostic: &LintDiagnostic) -> Severity {
        match diagnostic.severity.as_deref() {
            Some("critical") => Severity::Critical,
            Some("high") | Some("error") => Severity::High,
            Some("medium") | Some("warning") => Severity::Medium,
            Some("info") => Severity::Info,
            _ => Severity::Low,
        }
    }
}

impl Detector for ExternalLinterDetector {
    fn name(&self) -> &'static str {
        "ExternalLinterDetector"
    }

    fn description(&self) -> &'static str {
        "Correlates external linter diagnostics to graph entities"
    }

    fn category(&self) -> &'static str {
        "lint"
    }

    fn collaborates(&self) -> bool {
        true
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, previous: &[Finding]) -> Result<Vec<Finding>> {
        let Some(output) = self.invoke(ctx) else {
            return Ok(Vec::new());
        };
        let diagnostics = self.parse(&output);
        debug!(tool = self.tool, count = diagnostics.len(), "parsed diagnostics");

        let mut findings = Vec::new();
        for diagnostic in diagnostics {
            let node = self.correlate(ctx, &diagnostic);
            let (qualified_name, file) = match &node {
                Some(node) => (
                    node.qualified_name().to_string(),
                    node.file_path().to_string(),
                ),
                None => (diagnostic.file.clone(), diagnostic.file.clone()),
            };

            // Collaboration: suppress diagnostics earlier detectors already
            // reported on the same entity near the same line.
            let duplicate = previous.iter().any(|f| {
                f.affected_nodes.iter().any(|n| n == &qualified_name)
                    && f.line_start
                        .map(|l| l.abs_diff(diagnostic.line) <= 5)
                        .unwrap_or(false)
            });
            if duplicate {
                continue;
            }

            let severity = self.severity_of(&diagnostic);
            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("{}: {}", self.tool, diagnostic.code),
            );
            finding.id = finding_id(self.name(), &diagnostic.file, diagnostic.line);
            finding.description = diagnostic.message.clone();
            finding.affected_nodes = vec![qualified_name];
            finding.affected_files = vec![file];
            finding.line_start = Some(diagnostic.line);
            finding.graph_context.insert("tool".into(), json!(self.tool));
            finding
                .graph_context
                .insert("code".into(), json!(diagnostic.code));
            findings.push(finding);
        }

        Ok(findings)
    }
}
