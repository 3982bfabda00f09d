//! Evaluation engine for the Foreman dispatch system.
//!
//! On every trigger (a client check-in or a periodic sweep) the engine loads
//! the current rule set, evaluates each non-expired rule against the client's
//! attribute snapshot and starts the actions of matching rules at most once
//! per rule per client. Firing state survives restarts through the dispatch
//! ledger.

mod api;
mod dispatcher;
mod engine;
mod error;
mod http;
mod ledger;
mod sweep;

pub use api::{EngineApiBuilder, EngineServiceConfig};
pub use dispatcher::{ActionDispatcher, DispatchReport, TaskStarter};
pub use engine::{EvaluationOutcome, ForemanEngine};
pub use error::{DispatchError, EngineError};
pub use http::HttpTaskStarter;
pub use ledger::{
    ClientLedger, DispatchLedger, FileLedgerBackend, LedgerBackend, MemoryLedgerBackend,
};
pub use sweep::{SnapshotProvider, Sweeper};
