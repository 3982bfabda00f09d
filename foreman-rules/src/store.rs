use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RuleError;
use crate::rule::ForemanRule;

/// Versioned, ordered rule collection. Owned exclusively by the store;
/// mutation is whole-set replace-or-append, never partial in-place edits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleSet {
    /// Incremented on every successful mutation.
    pub version: u64,
    pub rules: Vec<ForemanRule>,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Storage seam for the durable rule collection. The foreman prescribes
/// atomicity and durability, not the storage engine.
pub trait RuleSetBackend: Send + Sync {
    fn load(&self) -> Result<Option<RuleSet>, RuleError>;
    fn persist(&self, set: &RuleSet) -> Result<(), RuleError>;
}

/// Keeps the rule set in memory only. Used by tests and by embedders that
/// handle durability themselves.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Option<RuleSet>>,
}

impl RuleSetBackend for MemoryBackend {
    fn load(&self) -> Result<Option<RuleSet>, RuleError> {
        Ok(self.inner.lock().clone())
    }

    fn persist(&self, set: &RuleSet) -> Result<(), RuleError> {
        *self.inner.lock() = Some(set.clone());
        Ok(())
    }
}

/// Persists the rule set as a single JSON document. Writes land in a sibling
/// file first and are renamed into place, so a crashed write leaves the
/// previous document intact and readers never observe a torn set.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RuleSetBackend for FileBackend {
    fn load(&self) -> Result<Option<RuleSet>, RuleError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|err| RuleError::storage(format!("{}: {err}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| RuleError::storage(format!("{}: {err}", self.path.display())))
    }

    fn persist(&self, set: &RuleSet) -> Result<(), RuleError> {
        let raw = serde_json::to_vec_pretty(set)
            .map_err(|err| RuleError::storage(err.to_string()))?;

        let staging = self.path.with_extension("tmp");
        fs::write(&staging, raw)
            .map_err(|err| RuleError::storage(format!("{}: {err}", staging.display())))?;
        fs::rename(&staging, &self.path)
            .map_err(|err| RuleError::storage(format!("{}: {err}", self.path.display())))?;
        Ok(())
    }
}

/// Durable store for the foreman rule set.
///
/// Mutations run under the write lock and persist through the backend before
/// the new set is published, so concurrent readers observe the pre- or
/// post-mutation image and a successful return implies durability.
#[derive(Clone)]
pub struct RuleSetStore {
    backend: Arc<dyn RuleSetBackend>,
    current: Arc<RwLock<RuleSet>>,
}

impl RuleSetStore {
    /// Opens the store, reading any previously persisted set.
    pub fn open(backend: Arc<dyn RuleSetBackend>) -> Result<Self, RuleError> {
        let current = backend.load()?.unwrap_or_default();
        Ok(Self {
            backend,
            current: Arc::new(RwLock::new(current)),
        })
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::default()),
            current: Arc::default(),
        }
    }

    /// Snapshot of the current rule set.
    pub fn load(&self) -> RuleSet {
        self.current.read().clone()
    }

    /// Re-reads the backend and publishes the result. Evaluation passes call
    /// this so that a rule set replaced behind the process is picked up and a
    /// broken backend surfaces as `StorageUnavailable`. The version guard
    /// keeps a racing refresh from publishing a stale image over a mutation
    /// that landed in between.
    pub fn refresh(&self) -> Result<RuleSet, RuleError> {
        let loaded = self.backend.load()?.unwrap_or_default();
        let mut current = self.current.write();
        if loaded.version >= current.version {
            *current = loaded;
        }
        Ok(current.clone())
    }

    /// Validates and appends a rule to the durable set.
    pub fn append(&self, rule: ForemanRule) -> Result<RuleSet, RuleError> {
        rule.validate()?;

        let mut current = self.current.write();
        if current.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(RuleError::DuplicateRule { id: rule.id });
        }

        let mut next = current.clone();
        next.rules.push(rule);
        next.version += 1;
        self.backend.persist(&next)?;
        *current = next.clone();
        Ok(next)
    }

    /// Produces a new set omitting the rule at `index`.
    pub fn remove_at(&self, index: usize) -> Result<RuleSet, RuleError> {
        let mut current = self.current.write();
        if index >= current.rules.len() {
            return Err(RuleError::IndexOutOfRange {
                index,
                len: current.rules.len(),
            });
        }

        let mut next = current.clone();
        next.rules.remove(index);
        next.version += 1;
        self.backend.persist(&next)?;
        *current = next.clone();
        Ok(next)
    }

    /// Identity-based removal.
    pub fn remove(&self, id: Uuid) -> Result<RuleSet, RuleError> {
        let mut current = self.current.write();
        let index = current
            .rules
            .iter()
            .position(|rule| rule.id == id)
            .ok_or(RuleError::NotFound { id })?;

        let mut next = current.clone();
        next.rules.remove(index);
        next.version += 1;
        self.backend.persist(&next)?;
        *current = next.clone();
        Ok(next)
    }

    /// Atomic whole-set swap, used by rule editing (delete and recreate).
    pub fn replace(&self, rules: Vec<ForemanRule>) -> Result<RuleSet, RuleError> {
        for rule in &rules {
            rule.validate()?;
        }
        for (index, rule) in rules.iter().enumerate() {
            if rules[..index].iter().any(|earlier| earlier.id == rule.id) {
                return Err(RuleError::DuplicateRule { id: rule.id });
            }
        }

        let mut current = self.current.write();
        let next = RuleSet {
            version: current.version + 1,
            rules,
        };
        self.backend.persist(&next)?;
        *current = next.clone();
        Ok(next)
    }
}
