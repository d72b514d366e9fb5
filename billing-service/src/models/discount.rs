//! Discount model for billing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::invoice::CreateInvoiceItem;

/// Whether a discount is a percentage of the amount or a fixed deduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "fixed" => DiscountType::Fixed,
            _ => DiscountType::Percentage,
        }
    }
}

/// Discount row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Discount {
    pub discount_id: Uuid,
    pub name: String,
    pub discount_type: String,
    pub value: Decimal,
    pub applicability: Option<String>,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating a discount.
#[derive(Debug, Clone)]
pub struct CreateDiscount {
    pub name: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub applicability: Option<String>,
}

/// Input for updating a discount.
#[derive(Debug, Clone, Default)]
pub struct UpdateDiscount {
    pub name: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub value: Option<Decimal>,
    pub applicability: Option<String>,
    pub is_active: Option<bool>,
}

/// Adjust a draft invoice's items for the given discounts.
///
/// Discounts are catalogued but not applied to invoices anywhere in the
/// system; invoice creation routes its items through here so a future
/// adjustment has a single seam, and today the items come back unchanged.
pub fn apply_discounts(
    items: Vec<CreateInvoiceItem>,
    _discounts: &[Discount],
) -> Vec<CreateInvoiceItem> {
    items
}
