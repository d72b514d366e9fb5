//! Fee structure and discount handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::access::{capabilities, ActorId};
use crate::dtos::{
    CreateDiscountRequest, CreateFeeStructureRequest, ListDiscountsQuery, UpdateDiscountRequest,
    UpdateFeeStructureRequest,
};
use crate::models::{Discount, FeeStructure, FeeStructureDetail};
use crate::AppState;

// -----------------------------------------------------------------------------
// Fee structures
// -----------------------------------------------------------------------------

pub async fn create_fee_structure(
    State(state): State<AppState>,
    actor_id: ActorId,
    Json(payload): Json<CreateFeeStructureRequest>,
) -> Result<(StatusCode, Json<FeeStructureDetail>), AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::FEE_STRUCTURE_WRITE)
        .await?;
    payload.validate()?;

    let detail = state.db.create_fee_structure(&payload.into()).await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn get_fee_structure(
    State(state): State<AppState>,
    Path(fee_structure_id): Path<Uuid>,
) -> Result<Json<FeeStructureDetail>, AppError> {
    let detail = state
        .db
        .get_fee_structure(fee_structure_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Fee structure not found")))?;

    Ok(Json(detail))
}

pub async fn list_fee_structures(
    State(state): State<AppState>,
) -> Result<Json<Vec<FeeStructure>>, AppError> {
    let fee_structures = state.db.list_fee_structures().await?;
    Ok(Json(fee_structures))
}

pub async fn update_fee_structure(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(fee_structure_id): Path<Uuid>,
    Json(payload): Json<UpdateFeeStructureRequest>,
) -> Result<Json<FeeStructureDetail>, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::FEE_STRUCTURE_WRITE)
        .await?;
    payload.validate()?;

    let detail = state
        .db
        .update_fee_structure(fee_structure_id, &payload.into())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Fee structure not found")))?;

    Ok(Json(detail))
}

pub async fn delete_fee_structure(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(fee_structure_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::FEE_STRUCTURE_WRITE)
        .await?;

    if state.db.delete_fee_structure(fee_structure_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!(
            "Fee structure not found"
        )))
    }
}

// -----------------------------------------------------------------------------
// Discounts
// -----------------------------------------------------------------------------

pub async fn create_discount(
    State(state): State<AppState>,
    actor_id: ActorId,
    Json(payload): Json<CreateDiscountRequest>,
) -> Result<(StatusCode, Json<Discount>), AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::DISCOUNT_WRITE)
        .await?;
    payload.validate()?;

    let discount = state.db.create_discount(&payload.into()).await?;

    Ok((StatusCode::CREATED, Json(discount)))
}

pub async fn list_discounts(
    State(state): State<AppState>,
    Query(query): Query<ListDiscountsQuery>,
) -> Result<Json<Vec<Discount>>, AppError> {
    let discounts = state
        .db
        .list_discounts(query.active_only.unwrap_or(false))
        .await?;
    Ok(Json(discounts))
}

pub async fn update_discount(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(discount_id): Path<Uuid>,
    Json(payload): Json<UpdateDiscountRequest>,
) -> Result<Json<Discount>, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::DISCOUNT_WRITE)
        .await?;

    let discount = state
        .db
        .update_discount(discount_id, &payload.into())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Discount not found")))?;

    Ok(Json(discount))
}

pub async fn delete_discount(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(discount_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::DISCOUNT_WRITE)
        .await?;

    if state.db.delete_discount(discount_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Discount not found")))
    }
}
