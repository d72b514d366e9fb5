//! Student model for billing-service.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Student row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub student_id: Uuid,
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub class: String,
    pub section: String,
    pub date_of_birth: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    pub parent_name: String,
    pub parent_phone: String,
    pub parent_email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for enrolling a student.
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub admission_number: String,
    pub first_name: String,
    pub last_name: String,
    pub class: String,
    pub section: String,
    pub date_of_birth: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    pub parent_name: String,
    pub parent_phone: String,
    pub parent_email: Option<String>,
    pub address: Option<String>,
}

/// Input for updating a student. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateStudent {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub parent_email: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

/// Filter parameters for listing students.
#[derive(Debug, Clone, Default)]
pub struct ListStudentsFilter {
    pub class: Option<String>,
    pub active_only: bool,
    /// Matches against name or admission number.
    pub search: Option<String>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}
