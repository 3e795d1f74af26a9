use crate::detector::{AnalysisContext, Detector};
use crate::detectors::util::repository_functions;
use repograph_core::{finding_id, Finding, Result, Severity};
use serde_json::json;
use std::collections::{BTreeSet, HashMap};

/// Known clump shapes mapped to a suggested type name.
const KNOWN_PATTERNS: &[(&[&str], &str)] = &[
    (&["x", "y"], "Point"),
    (&["x", "y", "z"], "Point3D"),
    (&["lat", "lon"], "Coordinates"),
    (&["latitude", "longitude"], "Coordinates"),
    (&["r", "g", "b"], "Color"),
    (&["red", "green", "blue"], "Color"),
    (&["name", "email"], "ContactInfo"),
    (&["host", "port"], "Endpoint"),
    (&["start", "end"], "Range"),
    (&["width", "height"], "Size"),
];

/// Detects groups of parameters that travel together across functions.
#[derive(Debug, Default)]
pub struct DataClumpsDetector;

impl Detector for DataClumpsDetector {
    fn name(&self) -> &'static str {
        "DataClumpsDetector"
    }

    fn description(&self) -> &'static str {
        "Finds parameter groups repeated across functions"
    }

    fn detect(&self, ctx: &AnalysisContext<'_>, _previous: &[Finding]) -> Result<Vec<Finding>> {
        let min_clump_size = ctx.overrides().get_u64("data-clumps", "min_clump_size", 3) as usize;
        let min_functions = ctx.overrides().get_u64("data-clumps", "min_functions", 3) as usize;

        // Parameter sets per function, self/cls excluded.
        let functions: Vec<(String, String, u32, BTreeSet<String>)> = repository_functions(
            ctx.store,
        )
        .into_iter()
        .map(|f| {
            let params: BTreeSet<String> = f
                .string_list("parameters")
                .into_iter()
                .filter(|p| p != "self" && p != "cls" && !p.starts_with('*'))
                .collect();
            (
                f.qualified_name().to_string(),
                f.file_path().to_string(),
                f.line_start(),
                params,
            )
        })
        .filter(|(_, _, _, params)| params.len() >= min_clump_size)
        .collect();

        // Candidate clumps: pairwise parameter-set intersections.
        let mut clumps: HashMap<BTreeSet<String>, BTreeSet<String>> = HashMap::new();
        for i in 0..functions.len() {
            for j in (i + 1)..functions.len() {
                let shared: BTreeSet<String> = functions[i]
                    .3
                    .intersection(&functions[j].3)
                    .cloned()
                    .collect();
                if shared.len() < min_clump_size {
                    continue;
                }
                let members = clumps.entry(shared).or_default();
                members.insert(functions[i].0.clone());
                members.insert(functions[j].0.clone());
            }
        }

        // Keep maximal clumps with enough members; drop subset clumps.
        let mut selected: Vec<(BTreeSet<String>, BTreeSet<String>)> = clumps
            .into_iter()
            .filter(|(_, members)| members.len() >= min_functions)
            .collect();
        selected.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(&b.0)));
        let mut kept: Vec<(BTreeSet<String>, BTreeSet<String>)> = Vec::new();
        for (params, members) in selected {
            if kept
                .iter()
                .any(|(p, m)| params.is_subset(p) && members.is_subset(m))
            {
                continue;
            }
            kept.push((params, members));
        }

        let mut findings = Vec::new();
        for (params, members) in kept {
            let severity = if members.len() >= 6 {
                Severity::High
            } else {
                Severity::Medium
            };
            let param_list: Vec<&str> = params.iter().map(String::as_str).collect();
            let suggested_name = suggest_type_name(&param_list);

            let affected_files: Vec<String> = {
                let mut files: Vec<String> = members
                    .iter()
                    .filter_map(|qname| {
                        functions
                            .iter()
                            .find(|(q, _, _, _)| q == qname)
                            .map(|(_, file, _, _)| file.clone())
                    })
                    .collect();
                files.sort();
                files.dedup();
                files
            };
            let first_line = members
                .iter()
                .filter_map(|qname| {
                    functions
                        .iter()
                        .find(|(q, _, _, _)| q == qname)
                        .map(|(_, _, line, _)| *line)
                })
                .min()
                .unwrap_or(0);

            let mut finding = Finding::new(
                self.name(),
                severity,
                format!("Data clump: ({})", param_list.join(", ")),
            );
            finding.id = finding_id(
                self.name(),
                affected_files.first().map(String::as_str).unwrap_or(""),
                first_line,
            );
            finding.description = format!(
                "Parameters ({}) travel together through {} functions; they form an implicit \
                 type.",
                param_list.join(", "),
                members.len()
            );
            finding.affected_nodes = members.iter().cloned().collect();
            finding.affected_files = affected_files;
            finding
                .graph_context
                .insert("clumpParameters".into(), json!(param_list));
            finding
                .graph_context
                .insert("functionCount".into(), json!(members.len()));
            finding.suggested_fix = Some(format!(
                "Introduce a `{suggested_name}` dataclass holding ({}) and pass it instead.",
                param_list.join(", ")
            ));
            findings.push(finding);
        }

        Ok(findings)
    }
}

/// Name suggestion for a clump, preferring well-known shapes.
fn suggest_type_name(params: &[&str]) -> String {
    let set: BTreeSet<&str> = params.iter().copied().collect();
    for (pattern, name) in KNOWN_PATTERNS {
        if pattern.iter().all(|p| set.contains(p)) {
            return name.to_string();
        }
    }
    let mut name = String::new();
    for part in params.iter().take(2) {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            name.extend(first.to_uppercase());
            name.push_str(chars.as_str());
        }
    }
    name.push_str("Params");
    name
}
