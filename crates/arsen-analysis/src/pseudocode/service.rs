//! Memoising front end to [`PseudocodeGenerator`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use arsen_common::disassembly::Function;
use arsen_common::types::Address;

use super::generator::{NameResolver, NoNames, PseudocodeGenerator};

/// Renders pseudocode once per function address and serves repeats from
/// memory.
pub struct PseudocodeService {
    generator: PseudocodeGenerator,
    resolver: RwLock<Arc<dyn NameResolver>>,
    cache: Mutex<HashMap<Address, String>>,
}

impl std::fmt::Debug for PseudocodeService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PseudocodeService")
            .field("generator", &self.generator)
            .field("cached", &self.cache().len())
            .finish_non_exhaustive()
    }
}

impl PseudocodeService {
    /// Service with no known names.
    #[must_use]
    pub fn new() -> Self {
        Self {
            generator: PseudocodeGenerator::new(),
            resolver: RwLock::new(Arc::new(NoNames)),
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<Address, String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolver(&self) -> Arc<dyn NameResolver> {
        Arc::clone(&self.resolver.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Installs the names used for function headers and call targets, and
    /// drops everything rendered with the previous names.
    pub fn set_resolver(&self, resolver: Arc<dyn NameResolver>) {
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = resolver;
        self.clear_cache();
    }

    /// Pseudocode for `function`, rendered on first request.
    pub fn generate(&self, function: &Function) -> String {
        if let Some(code) = self.cache().get(&function.address) {
            tracing::trace!(function = %function.address, "pseudocode cache hit");
            return code.clone();
        }
        let resolver = self.resolver();
        let code = self.generator.generate(function, resolver.as_ref());
        let _ = self.cache().insert(function.address, code.clone());
        code
    }

    /// Pseudocode for every function, keyed by address.
    pub fn generate_all<'a>(
        &self,
        functions: impl IntoIterator<Item = &'a Function>,
    ) -> BTreeMap<Address, String> {
        functions
            .into_iter()
            .map(|f| (f.address, self.generate(f)))
            .collect()
    }

    /// Forgets every rendered function.
    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    /// Number of memoised functions.
    pub fn cached_count(&self) -> usize {
        self.cache().len()
    }
}

impl Default for PseudocodeService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(address: u64, name: &str) -> Function {
        let mut f = Function::new(Address::new(address));
        f.name = name.into();
        f
    }

    #[test]
    fn results_are_memoised_per_address() {
        let service = PseudocodeService::new();
        let f = named(0x10, "first");
        assert_eq!(service.generate(&f), "int first()\n{\n}");

        let renamed = named(0x10, "second");
        assert_eq!(service.generate(&renamed), "int first()\n{\n}");
        assert_eq!(service.cached_count(), 1);

        service.clear_cache();
        assert_eq!(service.generate(&renamed), "int second()\n{\n}");
    }

    #[test]
    fn resolver_change_invalidates() {
        let service = PseudocodeService::new();
        let f = Function::new(Address::new(0x20));
        assert!(service.generate(&f).starts_with("int SUB_0000000000000020()"));

        let mut names = BTreeMap::new();
        let _ = names.insert(Address::new(0x20), "start".to_string());
        service.set_resolver(Arc::new(names));
        assert!(service.generate(&f).starts_with("int start()"));
    }

    #[test]
    fn generate_all_keys_by_address() {
        let service = PseudocodeService::new();
        let fs = [named(0x30, "b"), named(0x10, "a")];
        let all = service.generate_all(&fs);
        let keys: Vec<Address> = all.keys().copied().collect();
        assert_eq!(keys, vec![Address::new(0x10), Address::new(0x30)]);
    }
}
