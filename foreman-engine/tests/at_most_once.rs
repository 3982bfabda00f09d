//! End-to-end at-most-once behaviour across process restarts: the file
//! backed store and ledger are reopened the way a restarted foreman would,
//! and a rule that already fired must stay fired.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::json;
use uuid::Uuid;

use foreman_engine::{
    ActionDispatcher, DispatchError, DispatchLedger, FileLedgerBackend, ForemanEngine,
    TaskStarter,
};
use foreman_rules::{ClientSnapshot, FileBackend, ForemanRule, RuleAction, RuleSetStore};

struct CountingStarter(AtomicUsize);

#[async_trait]
impl TaskStarter for CountingStarter {
    async fn start_task(
        &self,
        _client_id: &str,
        _task_name: &str,
        _arguments: &IndexMap<String, String>,
    ) -> Result<Uuid, DispatchError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(Uuid::new_v4())
    }
}

fn engine_from(
    rules_path: &std::path::Path,
    ledger_path: &std::path::Path,
    starter: Arc<CountingStarter>,
) -> (ForemanEngine, RuleSetStore) {
    let store = RuleSetStore::open(Arc::new(FileBackend::new(rules_path))).expect("open store");
    let ledger =
        DispatchLedger::open(Arc::new(FileLedgerBackend::new(ledger_path))).expect("open ledger");
    let engine = ForemanEngine::new(store.clone(), ledger, ActionDispatcher::new(starter));
    (engine, store)
}

#[tokio::test]
async fn firings_survive_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let rules_path = dir.path().join("rules.json");
    let ledger_path = dir.path().join("ledger.json");
    let starter = Arc::new(CountingStarter(AtomicUsize::new(0)));

    let snapshot = ClientSnapshot::from(json!({ "os": "Linux x86_64" }));

    {
        let (engine, store) = engine_from(&rules_path, &ledger_path, starter.clone());
        store
            .append(ForemanRule::new("collect listing").with_action(RuleAction::new("ListDirectory")))
            .expect("append");

        let outcome = engine.evaluate("client-7", &snapshot).await.expect("pass");
        assert_eq!(outcome.dispatched.len(), 1);
        assert_eq!(starter.0.load(Ordering::SeqCst), 1);
    }

    // Fresh store, ledger and engine over the same files: the restart case.
    let (engine, _store) = engine_from(&rules_path, &ledger_path, starter.clone());
    let outcome = engine
        .evaluate("client-7", &snapshot)
        .await
        .expect("post-restart pass");
    assert!(outcome.dispatched.is_empty());
    assert_eq!(starter.0.load(Ordering::SeqCst), 1);

    // A brand new client still gets the rule.
    let outcome = engine
        .evaluate("client-8", &snapshot)
        .await
        .expect("new client pass");
    assert_eq!(outcome.dispatched.len(), 1);
    assert_eq!(starter.0.load(Ordering::SeqCst), 2);
}
