//! Payment model for billing-service.
//!
//! Payments are immutable once written; reconciliation states (`failed`,
//! `refunded`) are part of the stored vocabulary but no flow in this
//! service moves a payment out of `completed`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    Card,
    Netbanking,
    Cash,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "upi",
            PaymentMethod::Card => "card",
            PaymentMethod::Netbanking => "netbanking",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Cheque => "cheque",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "card" => PaymentMethod::Card,
            "netbanking" => PaymentMethod::Netbanking,
            "cash" => PaymentMethod::Cash,
            "cheque" => PaymentMethod::Cheque,
            _ => PaymentMethod::Upi,
        }
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "pending" => PaymentStatus::Pending,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            _ => PaymentStatus::Completed,
        }
    }
}

/// Payment row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: String,
    pub reference_number: Option<String>,
    /// Gateway payload slot; no gateway is wired up, so this stays NULL.
    pub gateway_response: Option<serde_json::Value>,
    pub created_utc: DateTime<Utc>,
}

/// Payment joined with its invoice and student, for lists and reports.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentListRow {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub amount: Decimal,
    pub payment_method: String,
    pub status: String,
    pub reference_number: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
    pub class: String,
    pub section: String,
}

/// Input for recording a payment against an invoice.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub reference_number: Option<String>,
}

/// Filter parameters for listing payments.
#[derive(Debug, Clone, Default)]
pub struct ListPaymentsFilter {
    pub invoice_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
