//! Student administration handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::access::{capabilities, ActorId};
use crate::dtos::{CreateStudentRequest, ListStudentsQuery, StudentsResponse, UpdateStudentRequest};
use crate::models::{ListStudentsFilter, Student};
use crate::AppState;

pub async fn create_student(
    State(state): State<AppState>,
    actor_id: ActorId,
    Json(payload): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::STUDENT_WRITE)
        .await?;
    payload.validate()?;

    let student = state.db.create_student(&payload.into()).await?;

    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn get_student(
    State(state): State<AppState>,
    Path(student_id): Path<Uuid>,
) -> Result<Json<Student>, AppError> {
    let student = state
        .db
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok(Json(student))
}

pub async fn list_students(
    State(state): State<AppState>,
    Query(query): Query<ListStudentsQuery>,
) -> Result<Json<StudentsResponse>, AppError> {
    let filter = ListStudentsFilter {
        class: query.class,
        active_only: query.active_only.unwrap_or(false),
        search: query.search,
        page_size: query.page_size.unwrap_or(50),
        page_token: query.page_token,
    };

    let students = state.db.list_students(&filter).await?;

    Ok(Json(StudentsResponse { students }))
}

pub async fn update_student(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(student_id): Path<Uuid>,
    Json(payload): Json<UpdateStudentRequest>,
) -> Result<Json<Student>, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::STUDENT_WRITE)
        .await?;
    payload.validate()?;

    let student = state
        .db
        .update_student(student_id, &payload.into())
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

    Ok(Json(student))
}

pub async fn delete_student(
    State(state): State<AppState>,
    actor_id: ActorId,
    Path(student_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .gate
        .authorize(actor_id, capabilities::STUDENT_DELETE)
        .await?;

    if state.db.delete_student(student_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(anyhow::anyhow!("Student not found")))
    }
}
