//! Invoice model for billing-service.
//!
//! An invoice is a fixed claim against a student: its `amount` is computed
//! from the item list once, at creation, and never recomputed. The only
//! mutation after creation is the payment path raising `paid_amount`
//! (and `cancel`, which is limited to unpaid invoices).

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use sqlx::FromRow;
use uuid::Uuid;

use super::student::Student;

/// Invoice status.
///
/// `Overdue` is a read-time refinement of `Pending`/`Partial` and is never
/// written to the store; it exists here because it is part of the
/// serialized status vocabulary consumers see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "draft" => InvoiceStatus::Draft,
            "partial" => InvoiceStatus::Partial,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            "cancelled" => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Pending,
        }
    }

    /// Status an invoice lands in after its paid amount reaches `new_paid`.
    pub fn after_payment(new_paid: Decimal, amount: Decimal) -> Self {
        if new_paid >= amount {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        }
    }

    /// True for the stored statuses a payment may be recorded against.
    pub fn accepts_payments(&self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Partial)
    }
}

/// Invoice row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub student_id: Uuid,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    /// Outstanding balance: `amount - paid_amount`.
    ///
    /// A negative balance means the stored row violates the payment
    /// invariant; it is reported as an error, never clamped.
    pub fn balance_due(&self) -> Result<Decimal, AppError> {
        let balance = self.amount - self.paid_amount;
        if balance < Decimal::ZERO {
            return Err(AppError::InternalError(anyhow!(
                "invoice {} has paid_amount {} exceeding amount {}",
                self.invoice_number,
                self.paid_amount,
                self.amount
            )));
        }
        Ok(balance)
    }

    /// Effective status as of a date: a pending or partially paid invoice
    /// whose due date has passed displays as overdue. The stored status is
    /// untouched.
    pub fn display_status(&self, as_of: NaiveDate) -> InvoiceStatus {
        let stored = InvoiceStatus::from_string(&self.status);
        if stored.accepts_payments() && self.due_date < as_of {
            InvoiceStatus::Overdue
        } else {
            stored
        }
    }
}

/// Line item on an invoice. Written once, with its invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceItem {
    pub item_id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub amount: Decimal,
    pub created_utc: DateTime<Utc>,
}

/// Fully resolved invoice: the shape document renderers and detail views
/// consume.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub student: Student,
    pub items: Vec<InvoiceItem>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub student_id: Uuid,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub items: Vec<CreateInvoiceItem>,
}

/// Input for one invoice line item.
#[derive(Debug, Clone)]
pub struct CreateInvoiceItem {
    pub description: String,
    pub amount: Decimal,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub student_id: Option<Uuid>,
    pub class: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(amount: i64, paid: i64, status: &str, due: NaiveDate) -> Invoice {
        Invoice {
            invoice_id: Uuid::new_v4(),
            invoice_number: "INV-000001".to_string(),
            student_id: Uuid::new_v4(),
            amount: Decimal::from(amount),
            paid_amount: Decimal::from(paid),
            status: status.to_string(),
            due_date: due,
            description: None,
            created_by: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn balance_due_is_amount_minus_paid() {
        let inv = invoice(15000, 6000, "partial", NaiveDate::from_ymd_opt(2025, 4, 30).unwrap());
        assert_eq!(inv.balance_due().unwrap(), Decimal::from(9000));
    }

    #[test]
    fn negative_balance_is_reported_not_clamped() {
        let mut inv = invoice(1000, 0, "pending", NaiveDate::from_ymd_opt(2025, 4, 30).unwrap());
        inv.paid_amount = Decimal::from(1500);
        assert!(inv.balance_due().is_err());
    }

    #[test]
    fn full_payment_transitions_to_paid() {
        assert_eq!(
            InvoiceStatus::after_payment(Decimal::from(10000), Decimal::from(10000)),
            InvoiceStatus::Paid
        );
    }

    #[test]
    fn partial_payment_transitions_to_partial() {
        assert_eq!(
            InvoiceStatus::after_payment(Decimal::from(4000), Decimal::from(10000)),
            InvoiceStatus::Partial
        );
    }

    #[test]
    fn pending_past_due_displays_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let inv = invoice(5000, 0, "pending", due);
        let today = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();
        assert_eq!(inv.display_status(today), InvoiceStatus::Overdue);
        // Stored status untouched.
        assert_eq!(inv.status, "pending");
    }

    #[test]
    fn partial_past_due_displays_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let inv = invoice(5000, 2000, "partial", due);
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        assert_eq!(inv.display_status(today), InvoiceStatus::Overdue);
    }

    #[test]
    fn due_today_is_not_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let inv = invoice(5000, 0, "pending", due);
        assert_eq!(inv.display_status(due), InvoiceStatus::Pending);
    }

    #[test]
    fn paid_and_cancelled_never_display_overdue() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let paid = invoice(5000, 5000, "paid", due);
        assert_eq!(paid.display_status(today), InvoiceStatus::Paid);
        let cancelled = invoice(5000, 0, "cancelled", due);
        assert_eq!(cancelled.display_status(today), InvoiceStatus::Cancelled);
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Pending,
            InvoiceStatus::Partial,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
            InvoiceStatus::Cancelled,
        ] {
            assert_eq!(InvoiceStatus::from_string(status.as_str()), status);
        }
    }
}
