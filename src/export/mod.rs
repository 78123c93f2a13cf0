//! DSR export pipeline
//!
//! Daily sales reports are queued as export jobs by [`DsrService`] and pushed
//! to the accounting system by the [`ExportScheduler`]:
//!
//! ```text
//! POST /dsr/export ──▶ dsr_exports (pending)
//!                           │  claim (FOR UPDATE SKIP LOCKED)
//!                           ▼
//!                      processing ──▶ AccountingClient (retry w/ backoff)
//!                           │
//!               completed / pending (+backoff) / failed
//! ```
//!
//! Jobs stuck in `processing` past `stale_after` are claimed again, which is
//! the only recovery path after a crash mid-attempt.

pub mod accounting;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod pg;
pub mod scheduler;
pub mod service;
pub mod state;
pub mod store;
pub mod types;

pub use accounting::{AccountingClient, SimulatedAccountingClient};
pub use error::{AccountingError, ExportError};
pub use pg::PgExportStore;
pub use scheduler::{AttemptOutcome, CycleReport, ExportScheduler, SchedulerConfig};
pub use service::{DsrService, ExportRequestOutcome};
pub use state::ExportStatus;
pub use store::ExportStore;
pub use types::{
    ClaimedExport, DsrExport, DsrReport, ExportCreation, ExportPayload, FailureUpdate,
    ValidationAccount, idempotency_key,
};
