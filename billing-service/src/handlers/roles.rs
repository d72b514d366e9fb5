//! Role assignment handlers.

use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

use crate::access::{capabilities, ActorId};
use crate::dtos::{AssignRoleRequest, RoleQuery};
use crate::models::UserRole;
use crate::AppState;

pub async fn assign_role(
    State(state): State<AppState>,
    actor_id: ActorId,
    Json(payload): Json<AssignRoleRequest>,
) -> Result<Json<UserRole>, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::ROLE_ASSIGN)
        .await?;

    let assignment = state.db.assign_role(payload.user_id, payload.role).await?;

    Ok(Json(assignment))
}

pub async fn get_role(
    State(state): State<AppState>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<UserRole>, AppError> {
    let assignment = state
        .db
        .get_user_role(query.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("No role assigned to this user")))?;

    Ok(Json(assignment))
}
