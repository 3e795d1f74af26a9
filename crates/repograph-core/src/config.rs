use crate::secrets::SecretsPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level configuration. Immutable once constructed; threaded through
/// constructors rather than held in process-wide state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepographConfig {
    pub graph: GraphConfig,
    pub ingestion: IngestionConfig,
    pub detectors: DetectorOverrides,
    pub analysis: AnalysisConfig,
}

/// Connection and retry policy for the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_retries: u32,
    pub retry_backoff_factor: f64,
    pub retry_base_delay_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "memory://repograph".into(),
            user: String::new(),
            password: String::new(),
            max_retries: 3,
            retry_backoff_factor: 2.0,
            retry_base_delay_ms: 1000,
        }
    }
}

impl GraphConfig {
    /// Delay before retry `attempt` (1-based): base * factor^(attempt-1).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = self
            .retry_backoff_factor
            .powi(attempt.saturating_sub(1) as i32);
        Duration::from_millis((self.retry_base_delay_ms as f64 * factor) as u64)
    }
}

/// File selection and extraction options for ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub patterns: Vec<String>,
    pub follow_symlinks: bool,
    pub max_file_size_mb: u64,
    pub batch_size: usize,
    pub secrets_policy: SecretsPolicy,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            patterns: vec!["**/*.py".into()],
            follow_symlinks: false,
            max_file_size_mb: 10,
            batch_size: 100,
            secrets_policy: SecretsPolicy::Redact,
        }
    }
}

impl IngestionConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

/// Per-detector threshold overrides keyed by normalized detector name
/// (e.g. `god-class` -> `{ "high_method_count": 25 }`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorOverrides(pub BTreeMap<String, BTreeMap<String, Value>>);

impl DetectorOverrides {
    pub fn get(&self, detector: &str, key: &str) -> Option<&Value> {
        self.0.get(detector).and_then(|opts| opts.get(key))
    }

    pub fn get_u64(&self, detector: &str, key: &str, default: u64) -> u64 {
        self.get(detector, key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    pub fn get_f64(&self, detector: &str, key: &str, default: f64) -> f64 {
        self.get(detector, key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    pub fn get_string_list(&self, detector: &str, key: &str) -> Option<Vec<String>> {
        self.get(detector, key).and_then(Value::as_array).map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
    }

    pub fn set(&mut self, detector: &str, key: &str, value: Value) {
        self.0
            .entry(detector.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }
}

/// Options for the analysis phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Retain FLAGGED_BY metadata after analysis (enables hotspot queries).
    pub keep_metadata: bool,
    /// Ordered layer prefixes, outermost first; an import from an earlier
    /// layer into a later one counts as a layer violation.
    pub layers: Vec<String>,
}

/// Normalize a detector type name for config lookup
/// (`GodClassDetector` -> `god-class`).
pub fn normalize_detector_name(name: &str) -> String {
    let stripped = name.strip_suffix("Detector").unwrap_or(name);
    let mut out = String::with_capacity(stripped.len() + 4);
    for (i, ch) in stripped.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn backoff_is_exponential() {
        let config = GraphConfig {
            retry_base_delay_ms: 100,
            retry_backoff_factor: 2.0,
            ..Default::default()
        };
        assert_eq!(config.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn detector_name_normalization() {
        assert_eq!(normalize_detector_name("GodClassDetector"), "god-class");
        assert_eq!(
            normalize_detector_name("CircularDependencyDetector"),
            "circular-dependency"
        );
        assert_eq!(normalize_detector_name("DeadCodeDetector"), "dead-code");
    }

    #[test]
    fn overrides_lookup() {
        let mut overrides = DetectorOverrides::default();
        overrides.set("god-class", "high_method_count", json!(25));
        assert_eq!(overrides.get_u64("god-class", "high_method_count", 20), 25);
        assert_eq!(overrides.get_u64("god-class", "missing", 20), 20);
        assert_eq!(overrides.get_u64("dead-code", "anything", 7), 7);
    }

    #[test]
    fn config_defaults() {
        let config = RepographConfig::default();
        assert_eq!(config.ingestion.batch_size, 100);
        assert!(!config.ingestion.follow_symlinks);
        assert_eq!(config.graph.max_retries, 3);
        assert_eq!(config.ingestion.secrets_policy, SecretsPolicy::Redact);
    }
}
