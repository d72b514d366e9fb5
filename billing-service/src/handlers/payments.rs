//! Payment handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::access::{capabilities, ActorId};
use crate::dtos::{
    InvoiceResponse, ListPaymentsQuery, RecordPaymentRequest, RecordPaymentResponse,
};
use crate::models::{ListPaymentsFilter, Payment, PaymentListRow, RecordPayment};
use crate::AppState;

pub async fn record_payment(
    State(state): State<AppState>,
    actor_id: ActorId,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<RecordPaymentResponse>), AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::PAYMENT_RECORD)
        .await?;
    payload.validate()?;

    let input = RecordPayment {
        invoice_id: payload.invoice_id,
        amount: payload.amount,
        payment_method: payload.payment_method,
        reference_number: payload.reference_number,
    };

    let (payment, invoice) = state.db.record_payment(&input).await?;

    let today = Utc::now().date_naive();
    Ok((
        StatusCode::CREATED,
        Json(RecordPaymentResponse {
            payment,
            invoice: InvoiceResponse::new(invoice, today)?,
        }),
    ))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    let payment = state
        .db
        .get_payment(payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Payment not found")))?;

    Ok(Json(payment))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<ListPaymentsQuery>,
) -> Result<Json<Vec<PaymentListRow>>, AppError> {
    let filter = ListPaymentsFilter {
        invoice_id: query.invoice_id,
        payment_method: query.payment_method,
        start_date: query.start_date,
        end_date: query.end_date,
        page_size: query.page_size.unwrap_or(50),
        page_token: query.page_token,
    };

    let payments = state.db.list_payments(&filter).await?;

    Ok(Json(payments))
}
