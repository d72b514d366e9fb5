//! Services for billing-service.

pub mod database;
pub mod metrics;
pub mod reports;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
pub use reports::{
    ClassCollectionRow, ClassWiseReport, DailyCollectionReport, DashboardCounters, PaymentModeRow,
    PaymentModeReport, PendingFeeRow, PendingFeesReport, StudentLedgerEntry, StudentLedgerReport,
};
