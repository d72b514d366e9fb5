//! Invoice handlers.

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
    CreateInvoiceRequest, InvoiceDetailResponse, InvoiceResponse, InvoicesResponse,
    ListInvoicesQuery,
};
use crate::models::{
    apply_discounts, CreateInvoice, CreateInvoiceItem, InvoiceStatus, ListInvoicesFilter,
};
use crate::AppState;

pub async fn create_invoice(
    State(state): State<AppState>,
    actor_id: ActorId,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceDetailResponse>), AppError> {
    let actor = state
        .gate
        .authorize(actor_id, capabilities::INVOICE_CREATE)
        .await?;
    payload.validate()?;

    let discounts = state.db.get_discounts(&payload.discount_ids).await?;

    let items: Vec<CreateInvoiceItem> = payload
        .items
        .into_iter()
        .map(|item| CreateInvoiceItem {
            description: item.description,
            amount: item.amount,
        })
        .collect();
    let items = apply_discounts(items, &discounts);

    let input = CreateInvoice {
        student_id: payload.student_id,
        due_date: payload.due_date,
        description: payload.description,
        created_by: Some(actor.user_id),
        items,
    };

    let detail = state.db.create_invoice(&input).await?;
    let today = Utc::now().date_naive();

    Ok((
        StatusCode::CREATED,
        Json(InvoiceDetailResponse::new(detail, today)?),
    ))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceDetailResponse>, AppError> {
    let detail = state
        .db
        .get_invoice_detail(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceDetailResponse::new(detail, today)?))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(query): Query<ListInvoicesQuery>,
) -> Result<Json<InvoicesResponse>, AppError> {
    let filter = ListInvoicesFilter {
        status: query.status.as_deref().map(InvoiceStatus::from_string),
        student_id: query.student_id,
        class: query.class,
        page_size: query.page_size.unwrap_or(50),
        page_token: query.page_token,
    };

    let invoices = state.db.list_invoices(&filter).await?;

    let today = Utc::now().date_naive();
    let invoices = invoices
        .into_iter()
        .map(|invoice| InvoiceResponse::new(invoice, today))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(InvoicesResponse { invoices }))
}

pub async fn cancel_invoice(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(invoice_id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::INVOICE_CANCEL)
        .await?;

    let invoice = state
        .db
        .cancel_invoice(invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    let today = Utc::now().date_naive();
    Ok(Json(InvoiceResponse::new(invoice, today)?))
}

pub async fn delete_invoice(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(invoice_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::INVOICE_DELETE)
        .await?;

    if state.db.delete_invoice(invoice_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
    }
}
