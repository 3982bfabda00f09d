use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use foreman_rules::{ClientSnapshot, ForemanRule, RuleSetStore};

use crate::dispatcher::ActionDispatcher;
use crate::error::EngineError;
use crate::ledger::DispatchLedger;

/// Summary of one evaluation pass for a client.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationOutcome {
    pub client_id: String,
    /// Rules that survived the expiry and watermark filters.
    pub considered: usize,
    pub matched: Vec<Uuid>,
    pub dispatched: Vec<Uuid>,
    /// Rules whose dispatch failed, left eligible for retry.
    pub failed: Vec<(Uuid, String)>,
    pub watermark: Option<DateTime<Utc>>,
}

impl EvaluationOutcome {
    fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            ..Self::default()
        }
    }
}

/// Evaluates the rule set against client snapshots and dispatches matched,
/// not-yet-fired rules.
///
/// Each client's pass runs under its own async mutex, which is what makes
/// the check-then-dispatch-then-record sequence at-most-once when the same
/// client checks in twice concurrently. Distinct clients never contend.
#[derive(Clone)]
pub struct ForemanEngine {
    store: RuleSetStore,
    ledger: DispatchLedger,
    dispatcher: ActionDispatcher,
    client_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ForemanEngine {
    pub fn new(store: RuleSetStore, ledger: DispatchLedger, dispatcher: ActionDispatcher) -> Self {
        Self {
            store,
            ledger,
            dispatcher,
            client_locks: Arc::default(),
        }
    }

    pub fn ledger(&self) -> &DispatchLedger {
        &self.ledger
    }

    fn lock_for(&self, client_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.client_locks
            .lock()
            .entry(client_id.to_string())
            .or_default()
            .clone()
    }

    /// Runs one evaluation pass for the client against its current snapshot.
    ///
    /// A storage failure aborts the pass before any ledger mutation; the
    /// caller retries on the next trigger. A failed task start leaves its
    /// rule unrecorded and the watermark short of it, so the rule is retried
    /// on the next pass while later rules still get their chance in this one.
    pub async fn evaluate(
        &self,
        client_id: &str,
        snapshot: &ClientSnapshot,
    ) -> Result<EvaluationOutcome, EngineError> {
        let slot = self.lock_for(client_id);
        let _guard = slot.lock().await;

        let set = self.store.refresh()?;
        let now = Utc::now();
        let watermark = self.ledger.watermark(client_id);

        let mut candidates: Vec<&ForemanRule> = set
            .rules
            .iter()
            .filter(|rule| !rule.is_expired(now))
            .filter(|rule| watermark.map_or(true, |mark| rule.created >= mark))
            .collect();
        candidates.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));

        let mut outcome = EvaluationOutcome::new(client_id);
        outcome.considered = candidates.len();

        // The watermark may only cross rules that are fully settled; it
        // stops just short of the first rule whose dispatch failed.
        let mut advance_to: Option<DateTime<Utc>> = None;
        let mut blocked = false;

        for rule in candidates {
            if rule.matches(snapshot) {
                outcome.matched.push(rule.id);

                if self.ledger.should_fire(client_id, rule) {
                    let report = self.dispatcher.dispatch(client_id, rule).await;
                    if report.fully_fired() {
                        self.ledger.record_fired(client_id, rule)?;
                        outcome.dispatched.push(rule.id);
                        debug!(client_id, rule_id = %rule.id, "rule fired");
                    } else {
                        let summary = report.failure_summary();
                        warn!(
                            client_id,
                            rule_id = %rule.id,
                            %summary,
                            "dispatch incomplete, rule left eligible for retry"
                        );
                        outcome.failed.push((rule.id, summary));
                        blocked = true;
                    }
                }
            }

            if !blocked {
                advance_to = Some(rule.created);
            }
        }

        if let Some(mark) = advance_to {
            self.ledger.advance_watermark(client_id, mark)?;
        }
        outcome.watermark = self.ledger.watermark(client_id);

        Ok(outcome)
    }
}
