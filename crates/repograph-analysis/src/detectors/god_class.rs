use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::{methods_of, repository_classes};
use crate::severity_rules::method_count_severity;
use repograph_core::{finding_id, Finding, NodeLabel, RelType, Result, Severity};
use repograph_graph::{GraphStore, NodeRecord};
use serde_json::json;
use std::collections::HashSet;
use tracing::debug;

/// Detects god classes: excessive method count, complexity, coupling, size,
/// or scattered cohesion. A class is flagged on two or more moderate
/// reasons, or a single severe one.
#[derive(Debug, Default)]
pub struct GodClassDetector;

struct Thresholds {
    high_method_count: u64,
    medium_method_count: u64,
    high_complexity: u64,
    medium_complexity: u64,
    high_loc: u64,
    medium_loc: u64,
    high_lcom: f64,
    medium_lcom: f64,
    high_coupling: u64,
    medium_coupling: u64,
}

impl Detector for GodClassDetector {
    fn name(&self) -> &'static str {
        "GodClassDetector"
    }

    fn description(&self) -> &'static str {
        "Finds classes with too many responsibilities"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let overrides = ctx.overrides();
        let t = Thresholds {
            high_method_count: overrides.get_u64("god-class", "high_method_count", 20),
            medium_method_count: overrides.get_u64("god-class", "medium_method_count", 15),
            high_complexity: overrides.get_u64("god-class", "high_complexity", 100),
            medium_complexity: overrides.get_u64("god-class", "medium_complexity", 50),
            high_loc: overrides.get_u64("god-class", "high_loc", 500),
            medium_loc: overrides.get_u64("god-class", "medium_loc", 300),
            high_lcom: overrides.get_f64("god-class", "high_lcom", 0.8),
            medium_lcom: overrides.get_f64("god-class", "medium_lcom", 0.6),
            high_coupling: overrides.get_u64("god-class", "high_coupling", 50),
            medium_coupling: overrides.get_u64("god-class", "medium_coupling", 30),
        };

        let mut findings = Vec::new();

        for class in repository_classes(ctx.store) {
            let methods = methods_of(ctx.store, &class);
            let method_count = methods.len() as u64;
            let total_complexity: u64 =
                methods.iter().map(|m| m.u64_prop("complexity")).sum();
            let coupling = coupling_of(ctx.store, &class, &methods);
            let loc = (class.line_end().saturating_sub(class.line_start())) as u64;

            // Cheap prefilter before the pairwise LCOM computation.
            if method_count < 10 && total_complexity < 30 && loc < 200 {
                continue;
            }

            let is_abstract = class.bool_prop("isAbstract");
            if is_abstract && method_count < 25 {
                continue;
            }

            let lcom = lcom(ctx.store, &methods);
            let Some(reason) = god_class_reason(
                &t,
                method_count,
                total_complexity,
                coupling,
                loc,
                lcom,
            ) else {
                continue;
            };

            let severity = god_class_severity(&t, method_count, total_complexity, coupling, loc, lcom);
            let name = class.name().to_string();
            let path = class.file_path().to_string();

            ctx.enricher().try_flag(
                class.qualified_name(),
                self.name(),
                0.85,
                &["god_class".to_string()],
                severity,
            );

            let mut finding =
                Finding::new(self.name(), severity, format!("God class detected: {name}"));
            finding.id = finding_id(self.name(), &path, class.line_start());
            finding.description = format!(
                "Class '{name}' shows signs of being a god class: {reason}. Methods: \
                 {method_count}, total complexity: {total_complexity}, coupling: {coupling}, \
                 LOC: {loc}, LCOM: {lcom:.2} (0 = cohesive, 1 = scattered)."
            );
            finding.affected_nodes = vec![class.qualified_name().to_string()];
            finding.affected_files = vec![path];
            finding.line_start = Some(class.line_start());
            finding.line_end = Some(class.line_end());
            finding
                .graph_context
                .insert("type".into(), json!("god_class"));
            finding.graph_context.insert("name".into(), json!(name));
            finding
                .graph_context
                .insert("methodCount".into(), json!(method_count));
            finding
                .graph_context
                .insert("totalComplexity".into(), json!(total_complexity));
            finding
                .graph_context
                .insert("couplingCount".into(), json!(coupling));
            finding.graph_context.insert("loc".into(), json!(loc));
            finding.graph_context.insert("lcom".into(), json!(lcom));
            finding.suggested_fix = Some(format!(
                "Refactor '{name}': extract method groups that share data into focused classes, \
                 and reduce coupling with dependency injection."
            ));
            finding.estimated_effort = Some(
                if method_count >= 30 || total_complexity >= 150 || loc >= 1000 {
                    "Large (1-2 weeks)"
                } else if method_count >= 20 || total_complexity >= 100 || loc >= 500 {
                    "Medium (3-5 days)"
                } else {
                    "Small (1-2 days)"
                }
                .into(),
            );
            findings.push(finding);
        }

        debug!(count = findings.len(), "god class detection done");
        Ok(findings)
    }
}

/// Outgoing calls and imported-class references of the class's methods.
fn coupling_of(store: &GraphStore, class: &NodeRecord, methods: &[NodeRecord]) -> u64 {
    let mut targets = HashSet::new();
    for method in methods {
        for (_, callee) in store.outgoing(method.id, RelType::Calls) {
            if callee.id != class.id {
                targets.insert(callee.id);
            }
        }
        for (_, used) in store.outgoing(method.id, RelType::Uses) {
            if matches!(used.label, NodeLabel::Class | NodeLabel::Module) {
                targets.insert(used.id);
            }
        }
    }
    targets.len() as u64
}

/// Lack of Cohesion of Methods: the fraction of method pairs sharing no
/// attribute. Always in [0, 1]; 0 for classes with at most one method.
pub fn lcom(store: &GraphStore, methods: &[NodeRecord]) -> f64 {
    if methods.len() <= 1 {
        return 0.0;
    }

    let attribute_sets: Vec<HashSet<String>> = methods
        .iter()
        .map(|m| {
            store
                .outgoing(m.id, RelType::Uses)
                .into_iter()
                .filter(|(_, target)| target.label == NodeLabel::Attribute)
                .map(|(_, target)| target.name().to_string())
                .collect()
        })
        .collect();

    let mut non_sharing = 0usize;
    let mut total = 0usize;
    for i in 0..attribute_sets.len() {
        for j in (i + 1)..attribute_sets.len() {
            total += 1;
            if attribute_sets[i].is_disjoint(&attribute_sets[j]) {
                non_sharing += 1;
            }
        }
    }

    if total == 0 {
        0.0
    } else {
        non_sharing as f64 / total as f64
    }
}

fn god_class_reason(
    t: &Thresholds,
    method_count: u64,
    total_complexity: u64,
    coupling: u64,
    loc: u64,
    lcom: f64,
) -> Option<String> {
    let mut reasons = Vec::new();

    if method_count >= t.high_method_count {
        reasons.push(format!("very high method count ({method_count})"));
    } else if method_count >= t.medium_method_count {
        reasons.push(format!("high method count ({method_count})"));
    }
    if total_complexity >= t.high_complexity {
        reasons.push(format!("very high complexity ({total_complexity})"));
    } else if total_complexity >= t.medium_complexity {
        reasons.push(format!("high complexity ({total_complexity})"));
    }
    if coupling >= t.high_coupling {
        reasons.push(format!("very high coupling ({coupling})"));
    } else if coupling >= t.medium_coupling {
        reasons.push(format!("high coupling ({coupling})"));
    }
    if loc >= t.high_loc {
        reasons.push(format!("very large class ({loc} LOC)"));
    } else if loc >= t.medium_loc {
        reasons.push(format!("large class ({loc} LOC)"));
    }
    if lcom >= t.high_lcom {
        reasons.push(format!("very low cohesion (LCOM {lcom:.2})"));
    } else if lcom >= t.medium_lcom {
        reasons.push(format!("low cohesion (LCOM {lcom:.2})"));
    }

    if reasons.len() >= 2
        || method_count >= t.high_method_count
        || total_complexity >= t.high_complexity
        || loc >= t.high_loc
    {
        Some(reasons.join(", "))
    } else {
        None
    }
}

/// Severity aggregates the five metrics; the method-count ladder is a
/// floor, so a 30-method class is CRITICAL regardless of the rest.
fn god_class_severity(
    t: &Thresholds,
    method_count: u64,
    total_complexity: u64,
    coupling: u64,
    loc: u64,
    lcom: f64,
) -> Severity {
    let critical_count = [
        method_count >= 30,
        total_complexity >= 150,
        coupling >= 70,
        loc >= 1000,
        lcom >= t.high_lcom,
    ]
    .into_iter()
    .filter(|v| *v)
    .count();

    let aggregate = if critical_count >= 2 {
        Severity::Critical
    } else {
        let high_count = [
            method_count >= t.high_method_count,
            total_complexity >= t.high_complexity,
            coupling >= t.high_coupling,
            loc >= t.high_loc,
            lcom >= t.medium_lcom,
        ]
        .into_iter()
        .filter(|v| *v)
        .count();

        if high_count >= 2 {
            Severity::High
        } else {
            let medium_count = [
                method_count >= t.medium_method_count,
                total_complexity >= t.medium_complexity,
                coupling >= t.medium_coupling,
                loc >= t.medium_loc,
            ]
            .into_iter()
            .filter(|v| *v)
            .count();

            if medium_count >= 2 {
                Severity::Medium
            } else {
                Severity::Low
            }
        }
    };

    match method_count_severity(method_count as u32) {
        Some(ladder) => aggregate.max(ladder),
        None => aggregate,
    }
}
