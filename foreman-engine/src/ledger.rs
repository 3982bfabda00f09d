use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use foreman_rules::ForemanRule;

use crate::error::EngineError;

/// Dispatch state tracked for a single client.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientLedger {
    /// Latest rule creation time this client has fully evaluated. Rules
    /// created strictly before the watermark are skipped without
    /// re-evaluation; rules created at the watermark instant are
    /// re-considered and deduplicated through `fired`.
    pub watermark: Option<DateTime<Utc>>,
    /// Rules fired at or above the watermark, keyed by rule id with the
    /// rule's creation time as value so the set can be pruned as the
    /// watermark advances.
    #[serde(default)]
    pub fired: HashMap<Uuid, DateTime<Utc>>,
}

/// Storage seam for ledger durability.
pub trait LedgerBackend: Send + Sync {
    fn load(&self) -> Result<Option<HashMap<String, ClientLedger>>, EngineError>;
    fn persist(&self, entries: &HashMap<String, ClientLedger>) -> Result<(), EngineError>;
}

/// Keeps ledger state in memory only.
#[derive(Default)]
pub struct MemoryLedgerBackend {
    inner: Mutex<Option<HashMap<String, ClientLedger>>>,
}

impl LedgerBackend for MemoryLedgerBackend {
    fn load(&self) -> Result<Option<HashMap<String, ClientLedger>>, EngineError> {
        Ok(self.inner.lock().clone())
    }

    fn persist(&self, entries: &HashMap<String, ClientLedger>) -> Result<(), EngineError> {
        *self.inner.lock() = Some(entries.clone());
        Ok(())
    }
}

/// Persists the ledger as a single JSON document via sibling write + rename.
pub struct FileLedgerBackend {
    path: PathBuf,
}

impl FileLedgerBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LedgerBackend for FileLedgerBackend {
    fn load(&self) -> Result<Option<HashMap<String, ClientLedger>>, EngineError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let raw = fs::read_to_string(&self.path)
            .map_err(|err| EngineError::Ledger(format!("{}: {err}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| EngineError::Ledger(format!("{}: {err}", self.path.display())))
    }

    fn persist(&self, entries: &HashMap<String, ClientLedger>) -> Result<(), EngineError> {
        let raw = serde_json::to_vec_pretty(entries)
            .map_err(|err| EngineError::Ledger(err.to_string()))?;

        let staging = self.path.with_extension("tmp");
        fs::write(&staging, raw)
            .map_err(|err| EngineError::Ledger(format!("{}: {err}", staging.display())))?;
        fs::rename(&staging, &self.path)
            .map_err(|err| EngineError::Ledger(format!("{}: {err}", self.path.display())))?;
        Ok(())
    }
}

/// Per-client record of fired rules and evaluation watermarks.
///
/// Mutations persist through the backend before returning, so a firing that
/// was acknowledged is still acknowledged after a restart.
#[derive(Clone)]
pub struct DispatchLedger {
    backend: Arc<dyn LedgerBackend>,
    entries: Arc<RwLock<HashMap<String, ClientLedger>>>,
}

impl DispatchLedger {
    pub fn open(backend: Arc<dyn LedgerBackend>) -> Result<Self, EngineError> {
        let entries = backend.load()?.unwrap_or_default();
        Ok(Self {
            backend,
            entries: Arc::new(RwLock::new(entries)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(MemoryLedgerBackend::default()),
            entries: Arc::default(),
        }
    }

    pub fn watermark(&self, client_id: &str) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .get(client_id)
            .and_then(|ledger| ledger.watermark)
    }

    /// Snapshot of one client's ledger state, `Default` for unseen clients.
    pub fn client(&self, client_id: &str) -> ClientLedger {
        self.entries
            .read()
            .get(client_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the rule has not yet been recorded as fired for this client.
    pub fn should_fire(&self, client_id: &str, rule: &ForemanRule) -> bool {
        !self
            .entries
            .read()
            .get(client_id)
            .map_or(false, |ledger| ledger.fired.contains_key(&rule.id))
    }

    /// Records the rule as fired for the client. Idempotent: a second call
    /// with the same rule leaves the ledger untouched.
    pub fn record_fired(&self, client_id: &str, rule: &ForemanRule) -> Result<(), EngineError> {
        let mut entries = self.entries.write();
        let ledger = entries.entry(client_id.to_string()).or_default();
        if ledger.fired.contains_key(&rule.id) {
            return Ok(());
        }

        ledger.fired.insert(rule.id, rule.created);
        self.backend.persist(&entries)
    }

    /// Raises the client's watermark to `max(current, mark)` and prunes
    /// firing records for rules that fell strictly below it; those rules can
    /// never be considered again.
    pub fn advance_watermark(
        &self,
        client_id: &str,
        mark: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.write();
        let ledger = entries.entry(client_id.to_string()).or_default();
        if ledger.watermark.map_or(false, |current| current >= mark) {
            return Ok(());
        }

        ledger.watermark = Some(mark);
        ledger.fired.retain(|_, created| *created >= mark);
        self.backend.persist(&entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rule_created_at(created: DateTime<Utc>) -> ForemanRule {
        let mut rule = ForemanRule::new("ledger test");
        rule.created = created;
        rule.expires = created + Duration::days(1);
        rule
    }

    #[test]
    fn record_fired_is_idempotent() {
        let ledger = DispatchLedger::in_memory();
        let rule = rule_created_at(Utc::now());

        assert!(ledger.should_fire("c1", &rule));
        ledger.record_fired("c1", &rule).expect("record");
        let first = ledger.client("c1");

        ledger.record_fired("c1", &rule).expect("record again");
        assert_eq!(ledger.client("c1"), first);
        assert!(!ledger.should_fire("c1", &rule));
    }

    #[test]
    fn clients_do_not_share_state() {
        let ledger = DispatchLedger::in_memory();
        let rule = rule_created_at(Utc::now());

        ledger.record_fired("c1", &rule).expect("record");
        assert!(!ledger.should_fire("c1", &rule));
        assert!(ledger.should_fire("c2", &rule));
    }

    #[test]
    fn advancing_prunes_records_below_the_watermark() {
        let ledger = DispatchLedger::in_memory();
        let older = rule_created_at(Utc::now() - Duration::hours(2));
        let newer = rule_created_at(Utc::now());

        ledger.record_fired("c1", &older).expect("record older");
        ledger.record_fired("c1", &newer).expect("record newer");
        ledger
            .advance_watermark("c1", newer.created)
            .expect("advance");

        let state = ledger.client("c1");
        assert_eq!(state.watermark, Some(newer.created));
        assert!(!state.fired.contains_key(&older.id));
        // Records at the watermark instant survive the prune; they are what
        // keeps same-instant rules from double firing.
        assert!(state.fired.contains_key(&newer.id));
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let ledger = DispatchLedger::in_memory();
        let now = Utc::now();

        ledger.advance_watermark("c1", now).expect("advance");
        ledger
            .advance_watermark("c1", now - Duration::hours(1))
            .expect("stale advance");
        assert_eq!(ledger.watermark("c1"), Some(now));
    }

    #[test]
    fn file_backend_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ledger.json");
        let rule = rule_created_at(Utc::now());

        let ledger =
            DispatchLedger::open(Arc::new(FileLedgerBackend::new(&path))).expect("open");
        ledger.record_fired("c1", &rule).expect("record");
        ledger
            .advance_watermark("c1", rule.created)
            .expect("advance");
        drop(ledger);

        let reopened =
            DispatchLedger::open(Arc::new(FileLedgerBackend::new(&path))).expect("reopen");
        assert!(!reopened.should_fire("c1", &rule));
        assert_eq!(reopened.watermark("c1"), Some(rule.created));
    }
}
