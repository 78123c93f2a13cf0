//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:3000/docs`
//! - OpenAPI JSON: `http://localhost:3000/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::export::{DsrExport, DsrReport, ExportStatus, ValidationAccount};
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{AccountStatusRequest, DsrKeyRequest, ExportRequestResult, LedgerResult};
use crate::ledger::{AccountStatement, PaymentRequest, StatementLine, StatementLineKind, TransferRequest};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DSR Ledger API",
        version = "0.1.0",
        description = "Idempotent payment/transfer ledger and daily sales report export to accounting."
    ),
    servers(
        (url = "http://localhost:3000", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::ledger::record_payment,
        crate::gateway::handlers::ledger::record_transfer,
        crate::gateway::handlers::ledger::account_statement,
        crate::gateway::handlers::dsr::preview,
        crate::gateway::handlers::dsr::request_export,
        crate::gateway::handlers::dsr::export_status,
        crate::gateway::handlers::dsr::get_account_status,
        crate::gateway::handlers::dsr::set_account_status,
    ),
    components(
        schemas(
            HealthResponse,
            PaymentRequest,
            TransferRequest,
            LedgerResult,
            AccountStatement,
            StatementLine,
            StatementLineKind,
            DsrKeyRequest,
            DsrReport,
            DsrExport,
            ExportStatus,
            ExportRequestResult,
            ValidationAccount,
            AccountStatusRequest,
        )
    ),
    tags(
        (name = "System", description = "Health"),
        (name = "Ledger", description = "Payments, transfers and statements"),
        (name = "DSR", description = "Daily sales report export"),
    )
)]
pub struct ApiDoc;
