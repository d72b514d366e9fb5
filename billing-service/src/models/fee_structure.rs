//! Fee structure model for billing-service.
//!
//! A fee structure is a named template of billable components for a set of
//! classes. It is reference material for building invoices by hand; nothing
//! generates invoices from it automatically.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing frequency of a fee component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeFrequency {
    Monthly,
    Quarterly,
    Annual,
}

impl FeeFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeFrequency::Monthly => "monthly",
            FeeFrequency::Quarterly => "quarterly",
            FeeFrequency::Annual => "annual",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "quarterly" => FeeFrequency::Quarterly,
            "annual" => FeeFrequency::Annual,
            _ => FeeFrequency::Monthly,
        }
    }
}

/// Fee structure row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeStructure {
    pub fee_structure_id: Uuid,
    pub name: String,
    pub classes: Vec<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Component row under a fee structure.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeeComponent {
    pub component_id: Uuid,
    pub fee_structure_id: Uuid,
    pub name: String,
    pub amount: Decimal,
    pub frequency: String,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// A fee structure with its ordered components.
#[derive(Debug, Clone, Serialize)]
pub struct FeeStructureDetail {
    pub fee_structure: FeeStructure,
    pub components: Vec<FeeComponent>,
}

/// Input for creating a fee structure.
#[derive(Debug, Clone)]
pub struct CreateFeeStructure {
    pub name: String,
    pub classes: Vec<String>,
    pub components: Vec<CreateFeeComponent>,
}

/// Input for one fee component.
#[derive(Debug, Clone)]
pub struct CreateFeeComponent {
    pub name: String,
    pub amount: Decimal,
    pub frequency: FeeFrequency,
}

/// Input for updating a fee structure. Supplying `components` replaces the
/// component list wholesale.
#[derive(Debug, Clone, Default)]
pub struct UpdateFeeStructure {
    pub name: Option<String>,
    pub classes: Option<Vec<String>>,
    pub components: Option<Vec<CreateFeeComponent>>,
}
