pub mod dsr;
pub mod health;
pub mod ledger;

pub use dsr::{export_status, get_account_status, preview, request_export, set_account_status};
pub use health::{HealthResponse, health_check};
pub use ledger::{account_statement, record_payment, record_transfer};
