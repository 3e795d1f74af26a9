use crate::file_collect::collect_files;
use crate::language::detect_language;
use crate::python::PythonExtractor;
use repograph_core::{
    CancelToken, Entity, IngestionConfig, Language, ProgressCallback, Relationship,
    RepographError, Result, SecretsScanner,
};
use repograph_graph::{GraphStats, GraphStore};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of a whole-repository ingestion.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOutcome {
    pub stats: GraphStats,
    pub processed_files: usize,
    pub skipped_files: usize,
}

/// Walks the repository, invokes the extractor per file, batches entities
/// and relationships, and loads them into the graph store. Ingestion is
/// whole-repository: prior nodes are dropped before reloading.
pub struct IngestionPipeline<'a> {
    store: &'a GraphStore,
    config: IngestionConfig,
    extractor: PythonExtractor,
    progress: Option<ProgressCallback>,
    cancel: CancelToken,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(store: &'a GraphStore, config: IngestionConfig) -> Self {
        let extractor = PythonExtractor::new(config.secrets_policy);
        Self {
            store,
            config,
            extractor,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_secrets_scanner(mut self, scanner: Arc<dyn SecretsScanner>) -> Self {
        self.extractor = PythonExtractor::with_scanner(self.config.secrets_policy, scanner);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the complete ingestion. Path containment is validated for every
    /// candidate before the first write, so a traversal attempt leaves no
    /// partial graph behind.
    pub fn ingest(&self, repo_path: &Path) -> Result<IngestOutcome> {
        info!(repo = %repo_path.display(), "starting ingestion");

        let files = collect_files(
            repo_path,
            &self.config.patterns,
            self.config.follow_symlinks,
        )?;
        if files.is_empty() {
            warn!("no files matched the ingestion patterns");
        }

        // Full re-ingestion: drop prior nodes, then ensure schema.
        self.store.clear()?;
        self.store.initialize_schema()?;

        let total = files.len();
        let max_bytes = self.config.max_file_size_bytes();
        let mut outcome = IngestOutcome::default();
        let mut entities: Vec<Entity> = Vec::new();
        let mut relationships: Vec<Relationship> = Vec::new();

        for (index, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(RepographError::Cancelled);
            }
            if let Some(progress) = &self.progress {
                progress(index + 1, total, &file.relative);
            }

            if file.size > max_bytes {
                warn!(
                    file = %file.relative,
                    size = file.size,
                    limit = max_bytes,
                    "skipping oversized file"
                );
                outcome.skipped_files += 1;
                continue;
            }

            match detect_language(Path::new(&file.relative)) {
                Some(Language::Python) => {}
                _ => {
                    outcome.skipped_files += 1;
                    continue;
                }
            }

            match self.extractor.extract_file(&file.relative, &file.absolute) {
                Ok(extraction) => {
                    entities.extend(extraction.entities);
                    relationships.extend(extraction.relationships);
                    outcome.processed_files += 1;
                }
                Err(e) => {
                    // Per-file failures are recoverable; the run continues.
                    warn!(file = %file.relative, error = %e, "failed to extract file");
                    outcome.skipped_files += 1;
                }
            }

            if entities.len() >= self.config.batch_size {
                self.flush(&mut entities, &mut relationships)?;
            }
        }

        self.flush(&mut entities, &mut relationships)?;

        outcome.stats = self.store.stats();
        info!(
            files = outcome.stats.files,
            classes = outcome.stats.classes,
            functions = outcome.stats.functions,
            relationships = outcome.stats.relationships,
            skipped = outcome.skipped_files,
            "ingestion complete"
        );
        Ok(outcome)
    }

    /// Flush accumulated entities and relationships. Relationship endpoints
    /// are rewritten through the id map returned by node creation; earlier
    /// batches resolve through the store's qualified-name index.
    fn flush(
        &self,
        entities: &mut Vec<Entity>,
        relationships: &mut Vec<Relationship>,
    ) -> Result<()> {
        if entities.is_empty() && relationships.is_empty() {
            return Ok(());
        }
        let id_map = self.store.batch_create_nodes(entities)?;
        self.store
            .batch_create_relationships(relationships, &id_map)?;
        entities.clear();
        relationships.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repograph_core::{GraphConfig, NodeLabel, RelType};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> GraphStore {
        GraphStore::connect(GraphConfig::default()).unwrap()
    }

    fn write_repo(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
        dir
    }

    #[test]
    fn ingests_a_small_repository() {
        let repo = write_repo(&[
            ("a.py", "import b\n\ndef run():\n    pass\n"),
            ("b.py", "VALUE = 1\n"),
        ]);
        let store = store();
        let pipeline = IngestionPipeline::new(&store, IngestionConfig::default());
        let outcome = pipeline.ingest(repo.path()).unwrap();

        assert_eq!(outcome.processed_files, 2);
        assert_eq!(outcome.stats.files, 2);
        assert_eq!(outcome.stats.functions, 1);
        assert!(store.node_by_qualified_name("a.py::run:3").is_some());
        assert_eq!(store.relationships(RelType::Imports).len(), 1);
    }

    #[test]
    fn parse_errors_skip_the_file_and_continue() {
        let repo = write_repo(&[
            ("good.py", "def ok():\n    pass\n"),
            ("bad.py", "def broken(:\n"),
        ]);
        let store = store();
        let pipeline = IngestionPipeline::new(&store, IngestionConfig::default());
        let outcome = pipeline.ingest(repo.path()).unwrap();

        assert_eq!(outcome.processed_files, 1);
        assert_eq!(outcome.skipped_files, 1);
        assert!(store.node_by_qualified_name("good.py").is_some());
        assert!(store.node_by_qualified_name("bad.py").is_none());
    }

    #[test]
    fn oversized_files_are_skipped() {
        let big = format!("x = 1\n{}", "# padding\n".repeat(200));
        let repo = write_repo(&[("big.py", big.as_str()), ("small.py", "y = 2\n")]);
        let store = store();
        let config = IngestionConfig {
            max_file_size_mb: 0,
            ..Default::default()
        };
        let pipeline = IngestionPipeline::new(&store, config);
        let outcome = pipeline.ingest(repo.path()).unwrap();
        // The zero cap rejects everything.
        assert_eq!(outcome.processed_files, 0);
        assert_eq!(outcome.skipped_files, 2);
    }

    #[test]
    fn progress_fires_for_every_file() {
        let repo = write_repo(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let store = store();
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let pipeline = IngestionPipeline::new(&store, IngestionConfig::default()).with_progress(
            Box::new(|current, total, _name| {
                assert!(current <= total);
                CALLS.fetch_add(1, Ordering::SeqCst);
            }),
        );
        pipeline.ingest(repo.path()).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cancellation_stops_between_files() {
        let repo = write_repo(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let store = store();
        let token = CancelToken::new();
        token.cancel();
        let pipeline =
            IngestionPipeline::new(&store, IngestionConfig::default()).with_cancel_token(token);
        let result = pipeline.ingest(repo.path());
        assert!(matches!(result, Err(RepographError::Cancelled)));
    }

    #[test]
    fn reingestion_replaces_prior_nodes() {
        let repo = write_repo(&[("a.py", "def one():\n    pass\n")]);
        let store = store();
        let pipeline = IngestionPipeline::new(&store, IngestionConfig::default());
        pipeline.ingest(repo.path()).unwrap();
        pipeline.ingest(repo.path()).unwrap();
        assert_eq!(store.stats().files, 1);
        assert_eq!(store.stats().functions, 1);
    }

    #[test]
    fn batching_flushes_across_files() {
        let repo = write_repo(&[
            ("a.py", "def a1():\n    pass\n\ndef a2():\n    pass\n"),
            ("b.py", "from a import a1\n\ndef b1():\n    a1()\n"),
        ]);
        let store = store();
        let config = IngestionConfig {
            batch_size: 1,
            ..Default::default()
        };
        let pipeline = IngestionPipeline::new(&store, config);
        let outcome = pipeline.ingest(repo.path()).unwrap();
        assert_eq!(outcome.processed_files, 2);
        // Cross-batch relationship resolution went through the store index.
        assert!(!store.relationships(RelType::Calls).is_empty());
        assert_eq!(store.nodes_with_label(NodeLabel::File).len(), 2);
    }
}
