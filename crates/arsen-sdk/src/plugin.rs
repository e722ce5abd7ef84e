//! In-process plugins hosted next to a [`BinaryService`].
//!
//! Plugins are compiled into the host and registered explicitly; nothing is
//! discovered from disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use arsen_analysis::events::EventBus;
use arsen_analysis::pseudocode::PseudocodeService;
use arsen_common::disassembly::Function;
use arsen_common::error::{ArsenError, Result};
use arsen_common::types::Address;

use crate::service::BinaryService;

/// What a plugin is handed on initialisation.
#[derive(Debug, Clone)]
pub struct PluginContext {
    /// The session the plugin works against.
    pub service: Arc<BinaryService>,
    /// The session event bus.
    pub events: EventBus,
}

impl PluginContext {
    /// Context over `service` and its event bus.
    #[must_use]
    pub fn new(service: Arc<BinaryService>) -> Self {
        let events = service.events().clone();
        Self { service, events }
    }
}

/// An extension that lives for the duration of a session.
pub trait Plugin: Send {
    /// Display name.
    fn name(&self) -> &str;

    /// Version string.
    fn version(&self) -> &str;

    /// One-line summary.
    fn description(&self) -> &str;

    /// Prepares the plugin. A plugin that fails here is not kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin cannot run in this context.
    fn initialize(&mut self, context: &PluginContext) -> Result<()>;

    /// Releases whatever `initialize` acquired.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails; the host logs it and moves on.
    fn shutdown(&mut self) -> Result<()>;
}

/// Name, version, and description of a loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    /// Display name.
    pub name: String,
    /// Version string.
    pub version: String,
    /// One-line summary.
    pub description: String,
}

/// Owns the initialised plugins of a session.
pub struct PluginManager {
    context: PluginContext,
    plugins: Vec<Box<dyn Plugin>>,
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.plugins.iter().map(|p| p.name()).collect();
        f.debug_struct("PluginManager")
            .field("plugins", &names)
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    /// A manager with no plugins.
    #[must_use]
    pub const fn new(context: PluginContext) -> Self {
        Self {
            context,
            plugins: Vec::new(),
        }
    }

    /// Initialises and keeps `plugin`. Returns `false`, after logging, if
    /// initialisation failed.
    pub fn load_plugin(&mut self, mut plugin: Box<dyn Plugin>) -> bool {
        match plugin.initialize(&self.context) {
            Ok(()) => {
                tracing::info!(
                    plugin = plugin.name(),
                    version = plugin.version(),
                    "plugin loaded"
                );
                self.plugins.push(plugin);
                true
            }
            Err(e) => {
                tracing::error!(plugin = plugin.name(), error = %e, "plugin failed to initialize");
                false
            }
        }
    }

    /// Shuts down and drops every plugin, in reverse load order.
    pub fn unload_all(&mut self) {
        while let Some(mut plugin) = self.plugins.pop() {
            if let Err(e) = plugin.shutdown() {
                tracing::warn!(plugin = plugin.name(), error = %e, "plugin shutdown failed");
            } else {
                tracing::debug!(plugin = plugin.name(), "plugin unloaded");
            }
        }
    }

    /// Loaded plugins in load order.
    #[must_use]
    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|p| PluginInfo {
                name: p.name().to_string(),
                version: p.version().to_string(),
                description: p.description().to_string(),
            })
            .collect()
    }

    /// The context handed to plugins.
    #[must_use]
    pub const fn context(&self) -> &PluginContext {
        &self.context
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        self.unload_all();
    }
}

/// Renders pseudocode through the session's [`PseudocodeService`].
#[derive(Debug, Default)]
pub struct PseudocodePlugin {
    context: Option<PluginContext>,
}

impl PseudocodePlugin {
    /// An uninitialised plugin.
    #[must_use]
    pub const fn new() -> Self {
        Self { context: None }
    }

    fn context(&self) -> Result<&PluginContext> {
        self.context.as_ref().ok_or_else(|| ArsenError::Config {
            message: "plugin not initialized".into(),
        })
    }

    fn renderer(&self) -> Result<&Arc<PseudocodeService>> {
        Ok(self.context()?.service.pseudocode_service())
    }

    /// Pseudocode for one function.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` before [`Plugin::initialize`].
    pub fn generate(&self, function: &Function) -> Result<String> {
        Ok(self.renderer()?.generate(function))
    }

    /// Pseudocode for every function of the current analysis.
    ///
    /// # Errors
    ///
    /// Returns `ArsenError::Config` before [`Plugin::initialize`] or when
    /// nothing has been analysed.
    pub fn generate_all(&self) -> Result<BTreeMap<Address, String>> {
        let context = self.context()?;
        let analysis = context
            .service
            .current_analysis()
            .ok_or_else(|| ArsenError::Config {
                message: "no analysis available".into(),
            })?;
        Ok(context
            .service
            .pseudocode_service()
            .generate_all(analysis.functions.values()))
    }
}

impl Plugin for PseudocodePlugin {
    fn name(&self) -> &str {
        "Pseudocode Generator"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Generates human-readable pseudocode from disassembled functions"
    }

    fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        self.context = Some(context.clone());
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Ok(renderer) = self.renderer() {
            renderer.clear_cache();
        }
        self.context = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use arsen_common::config::ArsenConfig;

    fn context() -> PluginContext {
        PluginContext::new(Arc::new(BinaryService::new(ArsenConfig::default())))
    }

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        fail_init: bool,
        log: Log,
    }

    impl Recorder {
        fn boxed(name: &'static str, fail_init: bool, log: &Log) -> Box<Self> {
            Box::new(Self {
                name,
                fail_init,
                log: Arc::clone(log),
            })
        }
    }

    impl Plugin for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "0.1"
        }

        fn description(&self) -> &str {
            "records lifecycle calls"
        }

        fn initialize(&mut self, _context: &PluginContext) -> Result<()> {
            if self.fail_init {
                return Err(ArsenError::Unsupported {
                    message: "initialization refused".into(),
                });
            }
            self.log.lock().unwrap().push(format!("init {}", self.name));
            Ok(())
        }

        fn shutdown(&mut self) -> Result<()> {
            self.log.lock().unwrap().push(format!("shutdown {}", self.name));
            Err(ArsenError::Unsupported {
                message: "shutdown errors are only logged".into(),
            })
        }
    }

    #[test]
    fn failed_initialization_is_not_kept() {
        let log = Log::default();
        let mut manager = PluginManager::new(context());
        assert!(manager.load_plugin(Recorder::boxed("a", false, &log)));
        assert!(!manager.load_plugin(Recorder::boxed("broken", true, &log)));
        assert!(manager.load_plugin(Box::new(PseudocodePlugin::new())));

        let names: Vec<String> = manager.plugins().into_iter().map(|p| p.name).collect();
        assert_eq!(names, ["a", "Pseudocode Generator"]);

        manager.unload_all();
        assert!(manager.plugins().is_empty());
        assert_eq!(*log.lock().unwrap(), ["init a", "shutdown a"]);
    }

    #[test]
    fn plugins_shut_down_in_reverse_load_order() {
        let log = Log::default();
        let mut manager = PluginManager::new(context());
        assert!(manager.load_plugin(Recorder::boxed("a", false, &log)));
        assert!(manager.load_plugin(Recorder::boxed("b", false, &log)));

        manager.unload_all();
        assert_eq!(
            *log.lock().unwrap(),
            ["init a", "init b", "shutdown b", "shutdown a"]
        );
    }

    #[test]
    fn dropping_the_manager_shuts_plugins_down() {
        let log = Log::default();
        {
            let mut manager = PluginManager::new(context());
            assert!(manager.load_plugin(Recorder::boxed("a", false, &log)));
            assert!(manager.load_plugin(Recorder::boxed("b", false, &log)));
        }
        assert_eq!(
            *log.lock().unwrap(),
            ["init a", "init b", "shutdown b", "shutdown a"]
        );
    }

    #[test]
    fn pseudocode_plugin_requires_initialization() {
        let mut plugin = PseudocodePlugin::new();
        let err = plugin.generate(&Function::new(Address::new(0x1000))).expect_err("uninit");
        assert_eq!(err.to_string(), "invalid configuration: plugin not initialized");

        plugin.initialize(&context()).expect("init");
        let err = plugin.generate_all().expect_err("nothing analysed");
        assert_eq!(err.to_string(), "invalid configuration: no analysis available");
        assert!(plugin.generate(&Function::new(Address::new(0x1000))).is_ok());

        plugin.shutdown().expect("shutdown");
        assert!(plugin.generate_all().is_err());
    }
}
