use std::sync::Arc;

use tracing::info;

use foreman_core::config::ForemanConfig;
use foreman_core::logging;
use foreman_engine::{
    ActionDispatcher, DispatchLedger, EngineApiBuilder, EngineServiceConfig, FileLedgerBackend,
    ForemanEngine, HttpTaskStarter,
};
use foreman_rules::{FileBackend, RuleApiBuilder, RuleServiceConfig, RuleSetStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(err) = logging::init_tracing(None) {
        eprintln!("failed to initialise tracing: {err}");
    }

    let config = ForemanConfig::from_env()?;

    let store = RuleSetStore::open(Arc::new(FileBackend::new(&config.rules_path)))?;
    let ledger = DispatchLedger::open(Arc::new(FileLedgerBackend::new(&config.ledger_path)))?;

    let starter = HttpTaskStarter::new(&config.task_runner_url)?;
    let dispatcher =
        ActionDispatcher::new(Arc::new(starter)).with_timeout(config.dispatch_timeout);
    let engine = ForemanEngine::new(store.clone(), ledger, dispatcher);

    let mut rule_config = RuleServiceConfig::default();
    if let Some(bind) = config.rules_http_bind.clone() {
        rule_config.bind_address = bind;
    }
    let rules_shutdown = RuleApiBuilder::new(store).serve(rule_config).await?;

    let mut engine_config = EngineServiceConfig::default();
    if let Some(bind) = config.engine_http_bind.clone() {
        engine_config.bind_address = bind;
    }
    let engine_shutdown = EngineApiBuilder::new(engine).serve(engine_config).await?;

    info!("foreman services running");
    tokio::signal::ctrl_c().await?;

    let _ = rules_shutdown.send(());
    let _ = engine_shutdown.send(());
    Ok(())
}
