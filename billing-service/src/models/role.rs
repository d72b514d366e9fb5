//! Role assignment model for billing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Application role. One active role per user, maintained by the
/// assignment path; the read path tolerates duplicates by taking one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Accountant,
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Accountant => "accountant",
            Role::Staff => "staff",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "accountant" => Role::Accountant,
            _ => Role::Staff,
        }
    }
}

/// Role assignment row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    pub role_id: Uuid,
    pub user_id: Uuid,
    pub role: String,
    pub created_utc: DateTime<Utc>,
}

/// The authenticated caller of an operation, resolved per request.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}
