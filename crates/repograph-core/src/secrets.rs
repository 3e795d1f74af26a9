use crate::error::{RepographError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Policy for docstrings and comments in which a secret is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecretsPolicy {
    /// Substitute the matched spans.
    #[default]
    Redact,
    /// Drop the entity's docstring entirely.
    Skip,
    /// Abort the file with a recoverable error.
    Fail,
    /// Log only, store as-is.
    Warn,
}

/// A matched secret within scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretMatch {
    pub rule: String,
    pub line: u32,
}

/// Result of scanning one text for secrets.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub matches: Vec<SecretMatch>,
    /// The input with matched spans substituted.
    pub redacted: String,
}

impl ScanResult {
    pub fn clean(text: &str) -> Self {
        Self {
            matches: Vec::new(),
            redacted: text.to_string(),
        }
    }

    pub fn has_secrets(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Interface to the external secrets scanner. The scanner itself is a
/// collaborator; only the policy dispatch lives here.
pub trait SecretsScanner: Send + Sync {
    fn scan(&self, text: &str, context: &str) -> ScanResult;
}

/// Scanner that never matches; the default when no collaborator is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSecretsScanner;

impl SecretsScanner for NoopSecretsScanner {
    fn scan(&self, text: &str, _context: &str) -> ScanResult {
        ScanResult::clean(text)
    }
}

/// Apply the configured policy to a scan result.
///
/// Returns the text to store, `None` when the docstring should be dropped,
/// or an error when the policy is FAIL and a secret was found.
pub fn apply_secrets_policy(
    result: ScanResult,
    policy: SecretsPolicy,
    context: &str,
) -> Result<Option<String>> {
    if !result.has_secrets() {
        return Ok(Some(result.redacted));
    }

    match policy {
        SecretsPolicy::Redact => Ok(Some(result.redacted)),
        SecretsPolicy::Skip => Ok(None),
        SecretsPolicy::Fail => Err(RepographError::Secret(format!(
            "{} secret(s) detected in {context}",
            result.matches.len()
        ))),
        SecretsPolicy::Warn => {
            warn!(
                context,
                count = result.matches.len(),
                "secrets detected, storing text unmodified"
            );
            // WARN stores the original; the scanner's redaction is ignored.
            Ok(Some(result.redacted))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dirty() -> ScanResult {
        ScanResult {
            matches: vec![SecretMatch {
                rule: "aws-key".into(),
                line: 2,
            }],
            redacted: "key = [REDACTED]".into(),
        }
    }

    #[test]
    fn clean_text_passes_through_any_policy() {
        for policy in [
            SecretsPolicy::Redact,
            SecretsPolicy::Skip,
            SecretsPolicy::Fail,
            SecretsPolicy::Warn,
        ] {
            let out = apply_secrets_policy(ScanResult::clean("doc"), policy, "a.py").unwrap();
            assert_eq!(out.as_deref(), Some("doc"));
        }
    }

    #[test]
    fn redact_substitutes() {
        let out = apply_secrets_policy(dirty(), SecretsPolicy::Redact, "a.py").unwrap();
        assert_eq!(out.as_deref(), Some("key = [REDACTED]"));
    }

    #[test]
    fn skip_drops_docstring() {
        let out = apply_secrets_policy(dirty(), SecretsPolicy::Skip, "a.py").unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn fail_aborts() {
        let err = apply_secrets_policy(dirty(), SecretsPolicy::Fail, "a.py").unwrap_err();
        assert!(matches!(err, RepographError::Secret(_)));
    }
}
