//! Pass orchestration, progress reporting, and result caching.

use std::sync::Arc;
use std::time::Instant;

use arsen_common::binary::BinaryFile;
use arsen_common::config::{AnalysisConfig, ArsenConfig};
use arsen_common::error::{ArsenError, Result};

use crate::cache::CacheManager;
use crate::context::{AnalysisContext, AnalysisResult};
use crate::events::{EventBus, EventKind};
use crate::pass::AnalysisPass;
use crate::passes::default_passes;
use crate::pseudocode::PseudocodeService;

/// Runs the registered passes over a binary.
///
/// Results are cached by the SHA-256 of the binary's bytes, so analysing
/// the same file twice runs the passes once.
pub struct AnalysisEngine {
    passes: Vec<Box<dyn AnalysisPass>>,
    config: AnalysisConfig,
    events: EventBus,
    cache: Arc<CacheManager>,
    pseudocode: Arc<PseudocodeService>,
}

impl std::fmt::Debug for AnalysisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisEngine")
            .field("passes", &self.pass_names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AnalysisEngine {
    /// Creates an engine with its own caches and the default passes.
    #[must_use]
    pub fn new(config: &ArsenConfig, events: EventBus) -> Self {
        Self::with_cache(config, events, Arc::new(CacheManager::new(&config.cache)))
    }

    /// Creates an engine sharing `cache` with the caller.
    #[must_use]
    pub fn with_cache(config: &ArsenConfig, events: EventBus, cache: Arc<CacheManager>) -> Self {
        Self {
            passes: default_passes(),
            config: config.analysis.clone(),
            events,
            cache,
            pseudocode: Arc::new(PseudocodeService::new()),
        }
    }

    /// Appends a pass to the pipeline.
    pub fn register_pass(&mut self, pass: Box<dyn AnalysisPass>) {
        tracing::debug!(pass = pass.name(), "registering analysis pass");
        self.passes.push(pass);
    }

    /// Names of the registered passes in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// The result cache.
    #[must_use]
    pub const fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// The pseudocode renderer used by the pipeline.
    #[must_use]
    pub const fn pseudocode_service(&self) -> &Arc<PseudocodeService> {
        &self.pseudocode
    }

    /// Analyses `binary`, or returns the cached result for identical bytes.
    ///
    /// A failing pass is logged and the remaining passes still run.
    pub fn analyze(&self, binary: Arc<BinaryFile>) -> Arc<AnalysisResult> {
        let sha256 = binary.sha256();
        if let Some(cached) = self.cache.get_analysis_result(&sha256) {
            tracing::info!(path = %binary.path.display(), "analysis served from cache");
            self.events.publish(EventKind::AnalysisCompleted {
                functions: cached.functions.len(),
            });
            return cached;
        }

        tracing::info!(path = %binary.path.display(), passes = self.passes.len(), "analysis started");
        self.events.publish(EventKind::AnalysisStarted {
            path: binary.path.clone(),
        });
        let started = Instant::now();
        let mut context = AnalysisContext::new(
            binary,
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.pseudocode),
        );

        let total = self.passes.len();
        for (i, pass) in self.passes.iter().enumerate() {
            let pass_started = Instant::now();
            match pass.execute(&mut context) {
                Ok(()) => tracing::debug!(
                    pass = pass.name(),
                    elapsed_ms = pass_started.elapsed().as_millis(),
                    "pass complete"
                ),
                Err(e) => {
                    tracing::error!(pass = pass.name(), error = %e, "analysis pass failed");
                    self.events.publish(EventKind::ErrorOccurred {
                        message: format!("{}: {e}", pass.name()),
                    });
                }
            }
            let percent = u8::try_from((i + 1) * 100 / total).unwrap_or(100);
            self.events.publish(EventKind::AnalysisProgress { percent });
        }

        let result = Arc::new(context.into_result());
        tracing::info!(
            functions = result.functions.len(),
            xrefs = result.cross_references.len(),
            strings = result.strings.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "analysis complete"
        );
        self.events.publish(EventKind::AnalysisCompleted {
            functions: result.functions.len(),
        });
        self.cache.put_analysis_result(sha256, Arc::clone(&result));
        result
    }

    /// Runs [`analyze`](Self::analyze) on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Internal` if the analysis task panicked or was
    /// cancelled.
    pub async fn analyze_async(
        self: Arc<Self>,
        binary: Arc<BinaryFile>,
    ) -> Result<Arc<AnalysisResult>> {
        tokio::task::spawn_blocking(move || self.analyze(binary))
            .await
            .map_err(|e| ArsenError::Internal {
                message: format!("analysis task failed: {e}"),
            })
    }
}
