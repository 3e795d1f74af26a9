use repograph_core::Language;
use std::path::Path;

/// Detect the source language from a file extension. Files without a
/// recognized extension are skipped by the pipeline.
pub fn detect_language(path: &Path) -> Option<Language> {
    match path.extension().and_then(|e| e.to_str())? {
        "py" | "pyi" => Some(Language::Python),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_python() {
        assert_eq!(
            detect_language(Path::new("pkg/mod.py")),
            Some(Language::Python)
        );
        assert_eq!(
            detect_language(Path::new("stub.pyi")),
            Some(Language::Python)
        );
    }

    #[test]
    fn unknown_extensions_are_skipped() {
        assert_eq!(detect_language(Path::new("main.rs")), None);
        assert_eq!(detect_language(Path::new("README")), None);
    }
}
