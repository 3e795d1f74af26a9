use crate::error::{RepographError, Result};

/// Maximum accepted identifier length.
const MAX_IDENTIFIER_LEN: usize = 100;

/// Validate an identifier that will be spliced into a graph-projection name,
/// property key, node label or relationship type. User-supplied values
/// always flow through parameters instead; anything reaching this function
/// must satisfy the allowlist: non-empty, at most 100 characters, and only
/// `[A-Za-z0-9_-]`.
pub fn validate_identifier<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(RepographError::Validation(format!("{what} must not be empty")));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(RepographError::Validation(format!(
            "{what} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
    {
        return Err(RepographError::Validation(format!(
            "{what} contains disallowed character {bad:?}"
        )));
    }
    Ok(value)
}
