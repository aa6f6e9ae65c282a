//! Batch dispatch engine: per-row rendering and delivery, sent-copy
//! reconciliation and archival, and the resend flows built on top.

pub mod archive;
pub mod batch;
pub mod dispatcher;
pub mod reconcile;
pub mod report;
pub mod resend;
pub mod retry_state;
pub mod run_log;

pub use batch::BatchInputs;
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use reconcile::{ReconcilePolicy, Reconciler};
pub use report::{AmbiguousRecipient, RowResult, RunReport};
pub use retry_state::RetryState;
pub use run_log::RunLog;
