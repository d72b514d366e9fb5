//! Report handlers. All read-only.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::DailyCollectionQuery;
use crate::services::{
    ClassWiseReport, DailyCollectionReport, DashboardCounters, PaymentModeReport,
    PendingFeesReport, StudentLedgerReport,
};
use crate::AppState;

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardCounters>, AppError> {
    let today = Utc::now().date_naive();
    let counters = state.db.dashboard_counters(today).await?;
    Ok(Json(counters))
}

pub async fn daily_collection(
    State(state): State<AppState>,
    Query(query): Query<DailyCollectionQuery>,
) -> Result<Json<DailyCollectionReport>, AppError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let report = state.db.daily_collection(date).await?;
    Ok(Json(report))
}

pub async fn pending_fees(
    State(state): State<AppState>,
) -> Result<Json<PendingFeesReport>, AppError> {
    let today = Utc::now().date_naive();
    let report = state.db.pending_fees(today).await?;
    Ok(Json(report))
}

pub async fn class_wise_collection(
    State(state): State<AppState>,
) -> Result<Json<ClassWiseReport>, AppError> {
    let report = state.db.class_wise_collection().await?;
    Ok(Json(report))
}

pub async fn payment_mode_breakdown(
    State(state): State<AppState>,
) -> Result<Json<PaymentModeReport>, AppError> {
    let report = state.db.payment_mode_breakdown().await?;
    Ok(Json(report))
}

pub async fn student_ledger(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<StudentLedgerReport>, AppError> {
    let report = state.db.student_ledger(student_id).await?;
    Ok(Json(report))
}
