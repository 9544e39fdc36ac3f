//! Invalidation Registry Module
//!
//! Maps key patterns and entity types to the stores they affect and fans
//! invalidation requests out across them. Invalidation is deliberately coarse:
//! a mutation removes every entry along the affected route prefixes instead of
//! tracking per-query dependencies.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, KeyPattern};
use crate::error::{CacheError, Result};

/// Pattern used for entity types without a registered rule.
pub const CATCH_ALL_PATTERN: &str = "/api/";

/// Placeholder substituted with the entity id in id-specific patterns.
const ID_PLACEHOLDER: &str = "{id}";

// == Invalidation Pattern ==
/// A pattern scoped to an explicit set of stores.
#[derive(Debug, Clone)]
pub struct InvalidationPattern {
    pub pattern: KeyPattern,
    pub stores: BTreeSet<String>,
}

// == Entity Rule ==
/// Key patterns removed whenever an entity of `entity_type` changes.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityInvalidationRule {
    pub entity_type: String,
    /// Always invalidated
    pub patterns: Vec<KeyPattern>,
    /// Substring templates containing `{id}`, invalidated when an id is given
    pub id_patterns: Vec<String>,
}

impl EntityInvalidationRule {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            patterns: Vec::new(),
            id_patterns: Vec::new(),
        }
    }

    pub fn pattern(mut self, pattern: impl Into<KeyPattern>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    pub fn id_pattern(mut self, template: impl Into<String>) -> Self {
        self.id_patterns.push(template.into());
        self
    }

    /// Patterns to invalidate for an optional entity id.
    pub fn resolve(&self, entity_id: Option<&str>) -> Vec<KeyPattern> {
        let mut resolved = self.patterns.clone();
        if let Some(id) = entity_id {
            resolved.extend(
                self.id_patterns
                    .iter()
                    .map(|template| KeyPattern::substring(template.replace(ID_PLACEHOLDER, id))),
            );
        }
        resolved
    }
}

/// Process-wide invalidation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationCounters {
    /// Pattern fan-outs performed
    pub invalidation_requests: u64,
    /// Entries removed across all stores
    pub invalidated_entries: u64,
}

/// Inventory row for the stats surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredPattern {
    pub pattern: String,
    pub stores: Vec<String>,
}

// == Invalidation Registry ==
#[derive(Debug, Default)]
pub struct InvalidationRegistry {
    stores: RwLock<BTreeMap<String, Arc<CacheStore>>>,
    patterns: RwLock<Vec<InvalidationPattern>>,
    entity_rules: RwLock<HashMap<String, EntityInvalidationRule>>,
    requests: AtomicU64,
    invalidated: AtomicU64,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl InvalidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry carrying the catalog entity rules.
    pub fn with_default_rules() -> Self {
        let registry = Self::new();
        for rule in default_entity_rules() {
            registry.add_entity_rule(rule);
        }
        registry
    }

    // == Stores ==
    pub fn register_store(&self, name: impl Into<String>, store: Arc<CacheStore>) {
        let name = name.into();
        if write(&self.stores).insert(name.clone(), store).is_some() {
            warn!("Store '{}' re-registered, previous instance replaced", name);
        } else {
            debug!("Store '{}' registered", name);
        }
    }

    pub fn store(&self, name: &str) -> Result<Arc<CacheStore>> {
        read(&self.stores)
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::Configuration(format!("unknown cache store '{}'", name)))
    }

    /// Registered stores ordered by name.
    pub fn stores(&self) -> Vec<(String, Arc<CacheStore>)> {
        read(&self.stores)
            .iter()
            .map(|(name, store)| (name.clone(), Arc::clone(store)))
            .collect()
    }

    pub fn store_names(&self) -> Vec<String> {
        read(&self.stores).keys().cloned().collect()
    }

    // == Registration ==
    /// Scopes `pattern` to `store_names`. Unknown store names fail fast.
    pub fn add_pattern(&self, pattern: KeyPattern, store_names: &[&str]) -> Result<()> {
        {
            let stores = read(&self.stores);
            if let Some(missing) = store_names.iter().find(|name| !stores.contains_key(**name)) {
                return Err(CacheError::Configuration(format!(
                    "pattern '{}' refers to unknown cache store '{}'",
                    pattern, missing
                )));
            }
        }

        let mut patterns = write(&self.patterns);
        let names = store_names.iter().map(|name| name.to_string());
        match patterns.iter_mut().find(|p| p.pattern == pattern) {
            Some(existing) => existing.stores.extend(names),
            None => patterns.push(InvalidationPattern {
                pattern,
                stores: names.collect(),
            }),
        }
        Ok(())
    }

    pub fn add_entity_rule(&self, rule: EntityInvalidationRule) {
        write(&self.entity_rules).insert(rule.entity_type.clone(), rule);
    }

    pub fn entity_rule(&self, entity_type: &str) -> Option<EntityInvalidationRule> {
        read(&self.entity_rules).get(entity_type).cloned()
    }

    pub fn registered_patterns(&self) -> Vec<RegisteredPattern> {
        read(&self.patterns)
            .iter()
            .map(|p| RegisteredPattern {
                pattern: p.pattern.as_source(),
                stores: p.stores.iter().cloned().collect(),
            })
            .collect()
    }

    pub fn entity_types(&self) -> Vec<String> {
        let mut types: Vec<String> = read(&self.entity_rules).keys().cloned().collect();
        types.sort();
        types
    }

    /// Stores a pattern applies to: its registered scope, or every store.
    fn targets(&self, pattern: &KeyPattern) -> Vec<Arc<CacheStore>> {
        let scope = read(&self.patterns)
            .iter()
            .find(|p| &p.pattern == pattern)
            .map(|p| p.stores.clone());

        let stores = read(&self.stores);
        match scope {
            Some(names) => names
                .iter()
                .filter_map(|name| stores.get(name).cloned())
                .collect(),
            None => stores.values().cloned().collect(),
        }
    }

    // == Invalidate By Pattern ==
    /// Removes matching entries from every store the pattern applies to.
    ///
    /// A store that fails is logged and skipped. Returns the total removed.
    pub fn invalidate_by_pattern(&self, pattern: &KeyPattern) -> usize {
        let mut total = 0;
        for store in self.targets(pattern) {
            match store.invalidate_pattern(pattern) {
                Ok(removed) => total += removed,
                Err(e) => warn!("Invalidation of '{}' in '{}' failed: {}", pattern, store.name(), e),
            }
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        self.invalidated.fetch_add(total as u64, Ordering::Relaxed);
        debug!("Pattern '{}' invalidated {} entries", pattern, total);
        total
    }

    /// Parses `raw` (see `KeyPattern::parse`) and invalidates it.
    pub fn invalidate_by_raw_pattern(&self, raw: &str) -> Result<usize> {
        let pattern = KeyPattern::parse(raw)?;
        Ok(self.invalidate_by_pattern(&pattern))
    }

    // == Invalidate By Entity ==
    /// Invalidates every pattern associated with `entity_type`, plus the
    /// id-specific patterns when `entity_id` is given. Unknown entity types
    /// fall back to the catch-all pattern.
    pub fn invalidate_by_entity(&self, entity_type: &str, entity_id: Option<&str>) -> usize {
        let patterns = match self.entity_rule(entity_type) {
            Some(rule) => rule.resolve(entity_id),
            None => {
                warn!(
                    "No invalidation rule for entity '{}', using catch-all",
                    entity_type
                );
                vec![KeyPattern::substring(CATCH_ALL_PATTERN)]
            }
        };

        let total = patterns
            .iter()
            .map(|pattern| self.invalidate_by_pattern(pattern))
            .sum();
        info!(
            "Entity invalidation {}:{} removed {} entries",
            entity_type,
            entity_id.unwrap_or("*"),
            total
        );
        total
    }

    // == Invalidate All ==
    /// Empties every registered store.
    pub fn invalidate_all(&self) -> usize {
        let mut total = 0;
        for (name, store) in self.stores() {
            match store.clear() {
                Ok(removed) => total += removed,
                Err(e) => warn!("Clearing '{}' failed: {}", name, e),
            }
        }
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.invalidated.fetch_add(total as u64, Ordering::Relaxed);
        total
    }

    // == Counters ==
    pub fn counters(&self) -> InvalidationCounters {
        InvalidationCounters {
            invalidation_requests: self.requests.load(Ordering::Relaxed),
            invalidated_entries: self.invalidated.load(Ordering::Relaxed),
        }
    }

    pub fn reset_counters(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.invalidated.store(0, Ordering::Relaxed);
    }
}

/// Entity rules for the catalog API routes.
pub fn default_entity_rules() -> Vec<EntityInvalidationRule> {
    vec![
        EntityInvalidationRule::new("card")
            .pattern("/api/cards")
            .pattern("/api/unified-search")
            .pattern("/api/search")
            .id_pattern("/api/cards/{id}"),
        EntityInvalidationRule::new("set")
            .pattern("/api/sets")
            .pattern("/api/search")
            .pattern("/api/unified-search")
            .id_pattern("/api/sets/{id}")
            .id_pattern("\"setId\":\"{id}\""),
        EntityInvalidationRule::new("product")
            .pattern("/api/products")
            .pattern("/api/unified-search"),
        EntityInvalidationRule::new("auction").pattern("/api/auctions"),
        EntityInvalidationRule::new("sale").pattern("/api/sales"),
    ]
}
