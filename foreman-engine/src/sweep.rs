use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{info, warn};

use foreman_rules::ClientSnapshot;

use crate::engine::ForemanEngine;
use crate::error::EngineError;

/// External capability that reports current client attribute state.
#[async_trait]
pub trait SnapshotProvider: Send + Sync + 'static {
    async fn client_ids(&self) -> Result<Vec<String>, EngineError>;
    async fn snapshot(&self, client_id: &str) -> Result<ClientSnapshot, EngineError>;
}

/// Periodically re-evaluates every known client, catching clients that have
/// not checked in since the last rule set change.
pub struct Sweeper {
    engine: ForemanEngine,
    provider: Arc<dyn SnapshotProvider>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        engine: ForemanEngine,
        provider: Arc<dyn SnapshotProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            engine,
            provider,
            interval,
        }
    }

    /// One full pass over every known client. Per-client failures are logged
    /// and skipped so a single bad client cannot starve the rest.
    pub async fn sweep_once(&self) -> Result<usize, EngineError> {
        let clients = self.provider.client_ids().await?;
        let mut evaluated = 0;

        for client_id in clients {
            let snapshot = match self.provider.snapshot(&client_id).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    warn!(%client_id, %err, "skipping client without a snapshot");
                    continue;
                }
            };

            match self.engine.evaluate(&client_id, &snapshot).await {
                Ok(outcome) => {
                    evaluated += 1;
                    if !outcome.dispatched.is_empty() {
                        info!(
                            %client_id,
                            fired = outcome.dispatched.len(),
                            "sweep dispatched rules"
                        );
                    }
                }
                Err(err) => warn!(%client_id, %err, "evaluation pass failed"),
            }
        }

        Ok(evaluated)
    }

    /// Spawns the periodic sweep loop, returning a shutdown handle.
    pub fn start(self) -> oneshot::Sender<()> {
        let (tx, mut rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut rx => {
                        info!("stopping foreman sweeper");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_once().await {
                            warn!(%err, "sweep aborted");
                        }
                    }
                }
            }
        });

        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::{ActionDispatcher, TaskStarter};
    use crate::error::DispatchError;
    use crate::ledger::DispatchLedger;
    use foreman_rules::{ForemanRule, RuleAction, RuleSetStore};
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

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

    struct StaticProvider;

    #[async_trait]
    impl SnapshotProvider for StaticProvider {
        async fn client_ids(&self) -> Result<Vec<String>, EngineError> {
            Ok(vec!["c1".into(), "c2".into(), "ghost".into()])
        }

        async fn snapshot(&self, client_id: &str) -> Result<ClientSnapshot, EngineError> {
            if client_id == "ghost" {
                return Err(EngineError::SnapshotUnavailable {
                    client_id: client_id.to_string(),
                    message: "client never enrolled".into(),
                });
            }
            Ok(ClientSnapshot::from(json!({ "os": "Linux" })))
        }
    }

    #[tokio::test]
    async fn sweep_covers_every_reachable_client() {
        let starter = Arc::new(CountingStarter(AtomicUsize::new(0)));
        let store = RuleSetStore::in_memory();
        store
            .append(ForemanRule::new("sweep me").with_action(RuleAction::new("ListDirectory")))
            .expect("append");

        let engine = ForemanEngine::new(
            store,
            DispatchLedger::in_memory(),
            ActionDispatcher::new(starter.clone()),
        );
        let sweeper = Sweeper::new(engine, Arc::new(StaticProvider), Duration::from_secs(3600));

        let evaluated = sweeper.sweep_once().await.expect("sweep");
        assert_eq!(evaluated, 2);
        assert_eq!(starter.0.load(Ordering::SeqCst), 2);

        // A second sweep re-evaluates but does not re-dispatch.
        let evaluated = sweeper.sweep_once().await.expect("second sweep");
        assert_eq!(evaluated, 2);
        assert_eq!(starter.0.load(Ordering::SeqCst), 2);
    }
}
