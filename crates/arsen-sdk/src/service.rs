//! The session facade: one current binary and its analysis.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use arsen_analysis::cache::CacheManager;
use arsen_analysis::context::AnalysisResult;
use arsen_analysis::engine::AnalysisEngine;
use arsen_analysis::events::{EventBus, EventKind};
use arsen_analysis::pseudocode::PseudocodeService;
use arsen_common::binary::BinaryFile;
use arsen_common::config::ArsenConfig;
use arsen_common::disassembly::Instruction;
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::Address;
use arsen_loader::LoaderRegistry;

fn no_binary() -> ArsenError {
    ArsenError::Config {
        message: "no binary loaded".into(),
    }
}

/// Loads binaries, runs analysis, and serves disassembly for the current
/// binary.
///
/// All methods take `&self` so the service can be shared behind an `Arc`
/// with plugins and UI tasks.
#[derive(Debug)]
pub struct BinaryService {
    config: ArsenConfig,
    loaders: LoaderRegistry,
    engine: Arc<AnalysisEngine>,
    events: EventBus,
    cache: Arc<CacheManager>,
    binary: RwLock<Option<Arc<BinaryFile>>>,
    analysis: RwLock<Option<Arc<AnalysisResult>>>,
}

impl BinaryService {
    /// Creates a service with its own event bus and caches.
    #[must_use]
    pub fn new(config: ArsenConfig) -> Self {
        let events = EventBus::new();
        let cache = Arc::new(CacheManager::new(&config.cache));
        let engine = AnalysisEngine::with_cache(&config, events.clone(), Arc::clone(&cache));
        Self {
            loaders: LoaderRegistry::with_probe_len(config.loader.header_probe_len),
            engine: Arc::new(engine),
            events,
            cache,
            binary: RwLock::new(None),
            analysis: RwLock::new(None),
            config,
        }
    }

    /// Parses `path` and makes it the current binary.
    ///
    /// # Errors
    ///
    /// Returns the loader's error; `ErrorOccurred` is published first.
    pub fn load_binary(&self, path: &Path) -> Result<Arc<BinaryFile>> {
        match self.loaders.load(path) {
            Ok(binary) => Ok(self.set_binary(binary)),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "failed to load binary");
                self.events.publish(EventKind::ErrorOccurred {
                    message: format!("failed to load {}: {e}", path.display()),
                });
                Err(e)
            }
        }
    }

    /// Makes an already parsed binary current, dropping the previous
    /// analysis.
    pub fn set_binary(&self, binary: BinaryFile) -> Arc<BinaryFile> {
        let binary = Arc::new(binary);
        self.cache.invalidate_instructions();
        {
            // Lock order is analysis then binary, as in `store_analysis`.
            let mut analysis = self.analysis.write().unwrap_or_else(PoisonError::into_inner);
            *analysis = None;
            *self.binary.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&binary));
        }
        self.events.publish(EventKind::BinaryLoaded {
            path: binary.path.clone(),
        });
        binary
    }

    /// Analyses the current binary and stores the result.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if no binary is loaded.
    pub fn analyze(&self) -> Result<Arc<AnalysisResult>> {
        let binary = self.current_binary().ok_or_else(no_binary)?;
        let result = self.engine.analyze(Arc::clone(&binary));
        let _ = self.store_analysis(&binary, &result);
        Ok(result)
    }

    /// [`analyze`](Self::analyze) on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if no binary is loaded, or
    /// `ArsenError::Internal` if the analysis task fails.
    pub async fn analyze_async(&self) -> Result<Arc<AnalysisResult>> {
        let binary = self.current_binary().ok_or_else(no_binary)?;
        let result = Arc::clone(&self.engine)
            .analyze_async(Arc::clone(&binary))
            .await?;
        let _ = self.store_analysis(&binary, &result);
        Ok(result)
    }

    /// Stores `result` as the current analysis if `binary` is still the
    /// current binary. Returns whether it was stored.
    fn store_analysis(&self, binary: &Arc<BinaryFile>, result: &Arc<AnalysisResult>) -> bool {
        let mut analysis = self.analysis.write().unwrap_or_else(PoisonError::into_inner);
        let current = self.binary.read().unwrap_or_else(PoisonError::into_inner);
        if !current.as_ref().is_some_and(|b| Arc::ptr_eq(b, binary)) {
            tracing::debug!(path = %binary.path.display(), "discarding analysis of a replaced binary");
            return false;
        }
        *analysis = Some(Arc::clone(result));
        true
    }

    /// The current binary.
    pub fn current_binary(&self) -> Option<Arc<BinaryFile>> {
        self.binary
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The analysis of the current binary, once run.
    pub fn current_analysis(&self) -> Option<Arc<AnalysisResult>> {
        self.analysis
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The session event bus.
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// The configuration the service was built with.
    pub const fn config(&self) -> &ArsenConfig {
        &self.config
    }

    /// The instruction and analysis caches.
    pub const fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// The pseudocode renderer used by analysis.
    pub fn pseudocode_service(&self) -> &Arc<PseudocodeService> {
        self.engine.pseudocode_service()
    }

    /// Decodes up to `count` instructions from `start`, which must lie in
    /// an executable section. Decoding stops at the end of that section.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` if no binary is loaded, or
    /// `ArsenError::NotFound` if no executable section contains `start`.
    pub fn disassemble_range(&self, start: Address, count: usize) -> Result<Vec<Instruction>> {
        let binary = self.current_binary().ok_or_else(no_binary)?;
        let section = binary
            .executable_sections()
            .find(|s| s.contains(start))
            .ok_or_else(|| ArsenError::NotFound {
                kind: "executable section",
                id: start.to_string(),
            })?;
        let disassembler = arsen_disasm::create(binary.architecture, binary.endianness)?;

        let mut offset =
            usize::try_from(start.distance(section.virtual_address)).unwrap_or(usize::MAX);
        let mut address = start;
        let mut out = Vec::with_capacity(count.min(4096));
        let mut hits = 0_usize;
        while out.len() < count && offset < section.data.len() {
            let insn = if let Some(cached) = self.cache.get_instruction(address) {
                hits += 1;
                cached
            } else {
                let decoded = disassembler.disassemble(address, &section.data, offset);
                self.cache.put_instruction(decoded.clone());
                decoded
            };
            let step = insn.size.max(1);
            offset += step;
            address = address.add(step as u64);
            out.push(insn);
        }
        tracing::debug!(%start, count = out.len(), cache_hits = hits, "disassembled range");
        Ok(out)
    }
}
