use std::sync::Arc;

use crate::db::Database;
use crate::export::{DsrService, ExportStore};
use crate::ledger::{LedgerStore, PaymentRecorder, TransferEngine};

/// Shared gateway state
pub struct AppState {
    /// `None` only when stores are not Postgres-backed (tests)
    pub db: Option<Arc<Database>>,
    pub ledger: Arc<dyn LedgerStore>,
    pub payments: PaymentRecorder,
    pub transfers: TransferEngine,
    pub dsr: DsrService,
}

impl AppState {
    pub fn new(
        db: Option<Arc<Database>>,
        ledger: Arc<dyn LedgerStore>,
        exports: Arc<dyn ExportStore>,
    ) -> Self {
        Self {
            db,
            payments: PaymentRecorder::new(ledger.clone()),
            transfers: TransferEngine::new(ledger.clone()),
            ledger,
            dsr: DsrService::new(exports),
        }
    }
}
