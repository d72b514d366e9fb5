//! Report projections for billing-service.
//!
//! Read-only queries over the billing tables; nothing here mutates state,
//! and repeated calls with unchanged data return identical results. The
//! "overdue" figures are derived from due dates at query time, the same
//! derivation invoice reads use.

use crate::models::{Invoice, PaymentListRow, Student};
use crate::services::database::Database;
use crate::services::metrics::DB_QUERY_DURATION;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use sqlx::FromRow;
use tracing::instrument;
use uuid::Uuid;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardCounters {
    pub total_students: i64,
    pub active_students: i64,
    pub total_collected: Decimal,
    pub open_invoices: i64,
    pub overdue_invoices: i64,
}

/// Completed payments for one day, with the day's total.
#[derive(Debug, Clone, Serialize)]
pub struct DailyCollectionReport {
    pub date: NaiveDate,
    pub payments: Vec<PaymentListRow>,
    pub total: Decimal,
}

/// One outstanding invoice on the pending-fees report.
#[derive(Debug, Clone, Serialize)]
pub struct PendingFeeRow {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub student_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub class: String,
    pub section: String,
    pub parent_name: String,
    pub parent_phone: String,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub due_date: NaiveDate,
    pub display_status: String,
}

/// All outstanding invoices plus the total outstanding amount.
#[derive(Debug, Clone, Serialize)]
pub struct PendingFeesReport {
    pub invoices: Vec<PendingFeeRow>,
    pub total_outstanding: Decimal,
}

/// Collection total for one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassCollectionRow {
    pub class: String,
    pub total: Decimal,
    /// Share of the grand total, one decimal place.
    pub pct: Decimal,
}

/// Class-wise collection breakdown, descending by total.
#[derive(Debug, Clone, Serialize)]
pub struct ClassWiseReport {
    pub breakdown: Vec<ClassCollectionRow>,
    pub grand_total: Decimal,
}

/// Collection totals per payment method.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentModeRow {
    pub payment_method: String,
    pub count: i64,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentModeReport {
    pub breakdown: Vec<PaymentModeRow>,
    pub grand_total: Decimal,
}

/// One line of a student ledger: an invoice raises the balance, a payment
/// lowers it.
#[derive(Debug, Clone, Serialize)]
pub struct StudentLedgerEntry {
    pub entry_utc: DateTime<Utc>,
    pub entry_type: String,
    pub reference: String,
    pub description: Option<String>,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentLedgerReport {
    pub student: Student,
    pub entries: Vec<StudentLedgerEntry>,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    pub outstanding: Decimal,
}

#[derive(Debug, FromRow)]
struct PendingFeeRecord {
    invoice_id: Uuid,
    invoice_number: String,
    student_id: Uuid,
    first_name: String,
    last_name: String,
    class: String,
    section: String,
    parent_name: String,
    parent_phone: String,
    amount: Decimal,
    paid_amount: Decimal,
    status: String,
    due_date: NaiveDate,
}

#[derive(Debug, FromRow)]
struct ClassTotalRecord {
    class: String,
    total: Decimal,
}

#[derive(Debug, FromRow)]
struct PaymentModeRecord {
    payment_method: String,
    count: i64,
    total: Decimal,
}

impl Database {
    /// Dashboard counters as of a date (the overdue count depends on it).
    #[instrument(skip(self))]
    pub async fn dashboard_counters(
        &self,
        as_of: NaiveDate,
    ) -> Result<DashboardCounters, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["dashboard_counters"])
            .start_timer();

        let total_students: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(self.pool())
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to count students: {}", e))
            })?;

        let active_students: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE is_active = TRUE")
                .fetch_one(self.pool())
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to count students: {}", e))
                })?;

        let total_collected: Decimal = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'completed'",
        )
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to sum collections: {}", e))
        })?;

        let open_invoices: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoices WHERE status IN ('pending', 'partial')",
        )
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count open invoices: {}", e))
        })?;

        let overdue_invoices: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM invoices
            WHERE status IN ('pending', 'partial') AND due_date < $1
            "#,
        )
        .bind(as_of)
        .fetch_one(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to count overdue invoices: {}", e))
        })?;

        timer.observe_duration();

        Ok(DashboardCounters {
            total_students,
            active_students,
            total_collected,
            open_invoices,
            overdue_invoices,
        })
    }

    /// Completed payments received on one day, inclusive of both day
    /// boundaries at second resolution.
    #[instrument(skip(self))]
    pub async fn daily_collection(
        &self,
        date: NaiveDate,
    ) -> Result<DailyCollectionReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["daily_collection"])
            .start_timer();

        let payments = sqlx::query_as::<_, PaymentListRow>(
            r#"
            SELECT p.payment_id, p.transaction_id, p.invoice_id, i.invoice_number,
                   p.amount, p.payment_method, p.status, p.reference_number, p.created_utc,
                   s.first_name, s.last_name, s.class, s.section
            FROM payments p
            JOIN invoices i ON i.invoice_id = p.invoice_id
            JOIN students s ON s.student_id = i.student_id
            WHERE p.status = 'completed'
              AND p.created_utc >= $1::date
              AND p.created_utc <= $1::date + TIME '23:59:59'
            ORDER BY p.created_utc
            "#,
        )
        .bind(date)
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load daily collection: {}", e))
        })?;

        timer.observe_duration();

        let total = payments.iter().map(|p| p.amount).sum();

        Ok(DailyCollectionReport {
            date,
            payments,
            total,
        })
    }

    /// All invoices still owing money, annotated with balance due and the
    /// display status as of a date.
    #[instrument(skip(self))]
    pub async fn pending_fees(&self, as_of: NaiveDate) -> Result<PendingFeesReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["pending_fees"])
            .start_timer();

        let records = sqlx::query_as::<_, PendingFeeRecord>(
            r#"
            SELECT i.invoice_id, i.invoice_number, i.student_id,
                   s.first_name, s.last_name, s.class, s.section,
                   s.parent_name, s.parent_phone,
                   i.amount, i.paid_amount, i.status, i.due_date
            FROM invoices i
            JOIN students s ON s.student_id = i.student_id
            WHERE i.status IN ('pending', 'partial')
            ORDER BY i.due_date, i.invoice_number
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load pending fees: {}", e))
        })?;

        timer.observe_duration();

        let mut total_outstanding = Decimal::ZERO;
        let mut invoices = Vec::with_capacity(records.len());
        for record in records {
            let balance_due = record.amount - record.paid_amount;
            if balance_due < Decimal::ZERO {
                return Err(AppError::InternalError(anyhow::anyhow!(
                    "invoice {} has paid_amount {} exceeding amount {}",
                    record.invoice_number,
                    record.paid_amount,
                    record.amount
                )));
            }
            total_outstanding += balance_due;

            let display_status = if record.due_date < as_of {
                "overdue".to_string()
            } else {
                record.status.clone()
            };

            invoices.push(PendingFeeRow {
                invoice_id: record.invoice_id,
                invoice_number: record.invoice_number,
                student_id: record.student_id,
                first_name: record.first_name,
                last_name: record.last_name,
                class: record.class,
                section: record.section,
                parent_name: record.parent_name,
                parent_phone: record.parent_phone,
                amount: record.amount,
                paid_amount: record.paid_amount,
                balance_due,
                due_date: record.due_date,
                display_status,
            });
        }

        Ok(PendingFeesReport {
            invoices,
            total_outstanding,
        })
    }

    /// Completed payments grouped by student class, descending by total,
    /// with each class's percentage share of the grand total.
    #[instrument(skip(self))]
    pub async fn class_wise_collection(&self) -> Result<ClassWiseReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["class_wise_collection"])
            .start_timer();

        let records = sqlx::query_as::<_, ClassTotalRecord>(
            r#"
            SELECT s.class, COALESCE(SUM(p.amount), 0) AS total
            FROM payments p
            JOIN invoices i ON i.invoice_id = p.invoice_id
            JOIN students s ON s.student_id = i.student_id
            WHERE p.status = 'completed'
            GROUP BY s.class
            ORDER BY total DESC, s.class
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to load class-wise collection: {}",
                e
            ))
        })?;

        timer.observe_duration();

        let grand_total: Decimal = records.iter().map(|r| r.total).sum();
        let hundred = Decimal::from(100);

        let breakdown = records
            .into_iter()
            .map(|r| {
                let pct = if grand_total.is_zero() {
                    Decimal::ZERO
                } else {
                    (r.total / grand_total * hundred).round_dp(1)
                };
                ClassCollectionRow {
                    class: r.class,
                    total: r.total,
                    pct,
                }
            })
            .collect();

        Ok(ClassWiseReport {
            breakdown,
            grand_total,
        })
    }

    /// Completed payments grouped by payment method.
    #[instrument(skip(self))]
    pub async fn payment_mode_breakdown(&self) -> Result<PaymentModeReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["payment_mode_breakdown"])
            .start_timer();

        let records = sqlx::query_as::<_, PaymentModeRecord>(
            r#"
            SELECT payment_method, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS total
            FROM payments
            WHERE status = 'completed'
            GROUP BY payment_method
            ORDER BY total DESC, payment_method
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!(
                "Failed to load payment mode breakdown: {}",
                e
            ))
        })?;

        timer.observe_duration();

        let grand_total: Decimal = records.iter().map(|r| r.total).sum();
        let breakdown = records
            .into_iter()
            .map(|r| PaymentModeRow {
                payment_method: r.payment_method,
                count: r.count,
                total: r.total,
            })
            .collect();

        Ok(PaymentModeReport {
            breakdown,
            grand_total,
        })
    }

    /// A student's billing history: invoices and payments interleaved in
    /// chronological order with a running outstanding balance.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn student_ledger(&self, student_id: Uuid) -> Result<StudentLedgerReport, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["student_ledger"])
            .start_timer();

        let student = self
            .get_student(student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_number, student_id, amount, paid_amount, status,
                   due_date, description, created_by, created_utc, updated_utc
            FROM invoices
            WHERE student_id = $1 AND status <> 'cancelled'
            ORDER BY created_utc
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load invoices: {}", e)))?;

        let payments = sqlx::query_as::<_, PaymentListRow>(
            r#"
            SELECT p.payment_id, p.transaction_id, p.invoice_id, i.invoice_number,
                   p.amount, p.payment_method, p.status, p.reference_number, p.created_utc,
                   s.first_name, s.last_name, s.class, s.section
            FROM payments p
            JOIN invoices i ON i.invoice_id = p.invoice_id
            JOIN students s ON s.student_id = i.student_id
            WHERE i.student_id = $1 AND p.status = 'completed'
            ORDER BY p.created_utc
            "#,
        )
        .bind(student_id)
        .fetch_all(self.pool())
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load payments: {}", e)))?;

        timer.observe_duration();

        let total_billed: Decimal = invoices.iter().map(|i| i.amount).sum();
        let total_paid: Decimal = payments.iter().map(|p| p.amount).sum();

        let mut entries: Vec<StudentLedgerEntry> = Vec::new();
        for invoice in &invoices {
            entries.push(StudentLedgerEntry {
                entry_utc: invoice.created_utc,
                entry_type: "invoice".to_string(),
                reference: invoice.invoice_number.clone(),
                description: invoice.description.clone(),
                debit: Some(invoice.amount),
                credit: None,
                balance: Decimal::ZERO,
            });
        }
        for payment in &payments {
            entries.push(StudentLedgerEntry {
                entry_utc: payment.created_utc,
                entry_type: "payment".to_string(),
                reference: payment.transaction_id.clone(),
                description: payment.reference_number.clone(),
                debit: None,
                credit: Some(payment.amount),
                balance: Decimal::ZERO,
            });
        }
        entries.sort_by_key(|e| e.entry_utc);

        let mut running = Decimal::ZERO;
        for entry in &mut entries {
            running += entry.debit.unwrap_or(Decimal::ZERO);
            running -= entry.credit.unwrap_or(Decimal::ZERO);
            entry.balance = running;
        }

        Ok(StudentLedgerReport {
            student,
            entries,
            total_billed,
            total_paid,
            outstanding: total_billed - total_paid,
        })
    }
}
