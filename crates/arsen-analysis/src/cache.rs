//! Bounded, expiring caches for decoded instructions and analysis results.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use arsen_common::config::CacheConfig;
use arsen_common::disassembly::Instruction;
use arsen_common::types::Address;

use crate::context::AnalysisResult;

#[derive(Debug)]
struct Entry<V> {
    value: V,
    accessed: Instant,
    tick: u64,
}

#[derive(Debug)]
struct Slots<K, V> {
    entries: HashMap<K, Entry<V>>,
    clock: u64,
}

/// A thread-safe map with a capacity limit and an idle timeout.
///
/// Reading an entry refreshes it. An entry not read for longer than the
/// TTL is dropped on the next access, and when the cache is full the
/// least-recently-read entry makes room for a new one.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    ttl: Duration,
    slots: Mutex<Slots<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty cache.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            slots: Mutex::new(Slots {
                entries: HashMap::new(),
                clock: 0,
            }),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots<K, V>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a copy of the value for `key` if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut slots = self.slots();
        slots.clock += 1;
        let tick = slots.clock;
        let ttl = self.ttl;
        let expired = match slots.entries.get_mut(key) {
            None => return None,
            Some(entry) if entry.accessed.elapsed() >= ttl => true,
            Some(entry) => {
                entry.accessed = Instant::now();
                entry.tick = tick;
                return Some(entry.value.clone());
            }
        };
        if expired {
            let _ = slots.entries.remove(key);
        }
        None
    }

    /// Stores `value`, evicting the least-recently-read entry when full.
    pub fn insert(&self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let mut slots = self.slots();
        slots.clock += 1;
        let tick = slots.clock;
        if !slots.entries.contains_key(&key) && slots.entries.len() >= self.capacity {
            let ttl = self.ttl;
            slots.entries.retain(|_, e| e.accessed.elapsed() < ttl);
            if slots.entries.len() >= self.capacity {
                let oldest = slots
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.tick)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    let _ = slots.entries.remove(&oldest);
                }
            }
        }
        let _ = slots.entries.insert(
            key,
            Entry {
                value,
                accessed: Instant::now(),
                tick,
            },
        );
    }

    /// Drops every entry.
    pub fn invalidate_all(&self) {
        self.slots().entries.clear();
    }

    /// Number of stored entries, including any not yet found expired.
    pub fn len(&self) -> usize {
        self.slots().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The instruction and analysis caches shared by a session.
#[derive(Debug)]
pub struct CacheManager {
    instructions: BoundedCache<Address, Instruction>,
    analyses: BoundedCache<String, Arc<AnalysisResult>>,
}

impl CacheManager {
    /// Creates caches sized by `config`.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        Self {
            instructions: BoundedCache::new(config.instruction_capacity, ttl),
            analyses: BoundedCache::new(config.analysis_capacity, ttl),
        }
    }

    /// Cached instruction at `address`.
    pub fn get_instruction(&self, address: Address) -> Option<Instruction> {
        self.instructions.get(&address)
    }

    /// Caches a decoded instruction under its address.
    pub fn put_instruction(&self, instruction: Instruction) {
        self.instructions.insert(instruction.address, instruction);
    }

    /// Cached analysis for a binary hash.
    pub fn get_analysis_result(&self, sha256: &str) -> Option<Arc<AnalysisResult>> {
        self.analyses.get(&sha256.to_string())
    }

    /// Caches an analysis under the binary's hash.
    pub fn put_analysis_result(&self, sha256: impl Into<String>, result: Arc<AnalysisResult>) {
        self.analyses.insert(sha256.into(), result);
    }

    /// Drops every cached instruction. Called when a different binary
    /// becomes current, since instructions are keyed by address alone.
    pub fn invalidate_instructions(&self) {
        self.instructions.invalidate_all();
    }

    /// Empties both caches.
    pub fn clear_all(&self) {
        tracing::debug!("clearing instruction and analysis caches");
        self.instructions.invalidate_all();
        self.analyses.invalidate_all();
    }

    /// Number of cached instructions.
    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arsen_common::disassembly::InstructionType;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn get_returns_inserted_value() {
        let cache = BoundedCache::new(4, HOUR);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn full_cache_evicts_least_recently_read() {
        let cache = BoundedCache::new(2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn replacing_a_key_does_not_evict() {
        let cache = BoundedCache::new(2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let cache = BoundedCache::new(4, Duration::ZERO);
        cache.insert(1_u64, "x");
        assert_eq!(cache.get(&1), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_all_empties() {
        let cache = BoundedCache::new(4, HOUR);
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.invalidate_all();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = BoundedCache::new(0, HOUR);
        cache.insert(1, 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn manager_round_trips_instructions_and_results() {
        let manager = CacheManager::default();
        let insn = Instruction::new(Address::new(0x1000), vec![0x90], "nop", InstructionType::Nop);
        manager.put_instruction(insn.clone());
        assert_eq!(manager.get_instruction(Address::new(0x1000)), Some(insn));

        let result = Arc::new(AnalysisResult::default());
        manager.put_analysis_result("abc", Arc::clone(&result));
        let cached = manager.get_analysis_result("abc").expect("cached result");
        assert!(Arc::ptr_eq(&cached, &result));

        manager.clear_all();
        assert_eq!(manager.instruction_count(), 0);
        assert!(manager.get_analysis_result("abc").is_none());
    }
}
