use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use foreman_rules::ForemanRule;

use crate::error::DispatchError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// External task execution capability. The foreman only ever starts tasks;
/// running them is somebody else's problem.
#[async_trait]
pub trait TaskStarter: Send + Sync + 'static {
    async fn start_task(
        &self,
        client_id: &str,
        task_name: &str,
        arguments: &IndexMap<String, String>,
    ) -> Result<Uuid, DispatchError>;
}

/// Outcome of dispatching one rule's actions.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Started tasks as `(task_name, task_id)`.
    pub started: Vec<(String, Uuid)>,
    /// Failed starts as `(task_name, reason)`.
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// A rule counts as fired only when every action started; anything less
    /// leaves the rule eligible for a retry pass.
    pub fn fully_fired(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure_summary(&self) -> String {
        self.failed
            .iter()
            .map(|(task, reason)| format!("{task}: {reason}"))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Translates a matched rule's action list into calls against the task
/// runner. Every action is attempted even when an earlier one fails, and
/// each call is bounded by the configured timeout.
#[derive(Clone)]
pub struct ActionDispatcher {
    starter: Arc<dyn TaskStarter>,
    timeout: Duration,
}

impl ActionDispatcher {
    pub fn new(starter: Arc<dyn TaskStarter>) -> Self {
        Self {
            starter,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn dispatch(&self, client_id: &str, rule: &ForemanRule) -> DispatchReport {
        let mut report = DispatchReport::default();

        for action in &rule.actions {
            let start = self
                .starter
                .start_task(client_id, &action.task_name, &action.arguments);

            match tokio::time::timeout(self.timeout, start).await {
                Ok(Ok(task_id)) => {
                    debug!(client_id, task_name = %action.task_name, %task_id, "task started");
                    report.started.push((action.task_name.clone(), task_id));
                }
                Ok(Err(err)) => {
                    warn!(client_id, task_name = %action.task_name, %err, "task start failed");
                    report
                        .failed
                        .push((action.task_name.clone(), err.to_string()));
                }
                Err(_) => {
                    warn!(client_id, task_name = %action.task_name, "task start timed out");
                    report
                        .failed
                        .push((action.task_name.clone(), DispatchError::Timeout.to_string()));
                }
            }
        }

        report
    }
}
