//! Request and response shapes for the HTTP surface.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    CreateDiscount, CreateFeeComponent, CreateFeeStructure, CreateStudent, DiscountType,
    FeeFrequency, Invoice, InvoiceDetail, InvoiceItem, Payment, PaymentMethod, Role, Student,
    UpdateDiscount, UpdateFeeStructure, UpdateStudent,
};

// -----------------------------------------------------------------------------
// Students
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStudentRequest {
    #[validate(length(min = 1, max = 32))]
    pub admission_number: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 16))]
    pub class: String,
    #[validate(length(min = 1, max = 16))]
    pub section: String,
    pub date_of_birth: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    #[validate(length(min = 1, max = 200))]
    pub parent_name: String,
    #[validate(length(min = 1, max = 32))]
    pub parent_phone: String,
    #[validate(email)]
    pub parent_email: Option<String>,
    pub address: Option<String>,
}

impl From<CreateStudentRequest> for CreateStudent {
    fn from(req: CreateStudentRequest) -> Self {
        CreateStudent {
            admission_number: req.admission_number,
            first_name: req.first_name,
            last_name: req.last_name,
            class: req.class,
            section: req.section,
            date_of_birth: req.date_of_birth,
            admission_date: req.admission_date,
            parent_name: req.parent_name,
            parent_phone: req.parent_phone,
            parent_email: req.parent_email,
            address: req.address,
        }
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateStudentRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub admission_date: Option<NaiveDate>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    #[validate(email)]
    pub parent_email: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateStudentRequest> for UpdateStudent {
    fn from(req: UpdateStudentRequest) -> Self {
        UpdateStudent {
            first_name: req.first_name,
            last_name: req.last_name,
            class: req.class,
            section: req.section,
            date_of_birth: req.date_of_birth,
            admission_date: req.admission_date,
            parent_name: req.parent_name,
            parent_phone: req.parent_phone,
            parent_email: req.parent_email,
            address: req.address,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListStudentsQuery {
    pub class: Option<String>,
    pub active_only: Option<bool>,
    pub search: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct StudentsResponse {
    pub students: Vec<Student>,
}

// -----------------------------------------------------------------------------
// Fee structures & discounts
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct FeeComponentInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub amount: Decimal,
    pub frequency: FeeFrequency,
}

impl From<FeeComponentInput> for CreateFeeComponent {
    fn from(input: FeeComponentInput) -> Self {
        CreateFeeComponent {
            name: input.name,
            amount: input.amount,
            frequency: input.frequency,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateFeeStructureRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1))]
    pub classes: Vec<String>,
    #[validate(length(min = 1), nested)]
    pub components: Vec<FeeComponentInput>,
}

impl From<CreateFeeStructureRequest> for CreateFeeStructure {
    fn from(req: CreateFeeStructureRequest) -> Self {
        CreateFeeStructure {
            name: req.name,
            classes: req.classes,
            components: req.components.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateFeeStructureRequest {
    pub name: Option<String>,
    pub classes: Option<Vec<String>>,
    #[validate(nested)]
    pub components: Option<Vec<FeeComponentInput>>,
}

impl From<UpdateFeeStructureRequest> for UpdateFeeStructure {
    fn from(req: UpdateFeeStructureRequest) -> Self {
        UpdateFeeStructure {
            name: req.name,
            classes: req.classes,
            components: req
                .components
                .map(|c| c.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDiscountRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub applicability: Option<String>,
}

impl From<CreateDiscountRequest> for CreateDiscount {
    fn from(req: CreateDiscountRequest) -> Self {
        CreateDiscount {
            name: req.name,
            discount_type: req.discount_type,
            value: req.value,
            applicability: req.applicability,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateDiscountRequest {
    pub name: Option<String>,
    pub discount_type: Option<DiscountType>,
    pub value: Option<Decimal>,
    pub applicability: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateDiscountRequest> for UpdateDiscount {
    fn from(req: UpdateDiscountRequest) -> Self {
        UpdateDiscount {
            name: req.name,
            discount_type: req.discount_type,
            value: req.value,
            applicability: req.applicability,
            is_active: req.is_active,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ListDiscountsQuery {
    pub active_only: Option<bool>,
}

// -----------------------------------------------------------------------------
// Invoices
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct InvoiceItemInput {
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub student_id: Uuid,
    pub due_date: NaiveDate,
    pub description: Option<String>,
    #[validate(length(min = 1), nested)]
    pub items: Vec<InvoiceItemInput>,
    /// Discounts to consider for this invoice. Resolved and routed through
    /// the discount hook; no adjustment is made today.
    #[serde(default)]
    pub discount_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListInvoicesQuery {
    pub status: Option<String>,
    pub student_id: Option<Uuid>,
    pub class: Option<String>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

/// Invoice plus the derived figures every consumer wants alongside it.
#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub balance_due: Decimal,
    pub display_status: String,
}

impl InvoiceResponse {
    pub fn new(invoice: Invoice, as_of: NaiveDate) -> Result<Self, AppError> {
        let balance_due = invoice.balance_due()?;
        let display_status = invoice.display_status(as_of).as_str().to_string();
        Ok(InvoiceResponse {
            invoice,
            balance_due,
            display_status,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceDetailResponse {
    pub invoice: InvoiceResponse,
    pub student: Student,
    pub items: Vec<InvoiceItem>,
}

impl InvoiceDetailResponse {
    pub fn new(detail: InvoiceDetail, as_of: NaiveDate) -> Result<Self, AppError> {
        Ok(InvoiceDetailResponse {
            invoice: InvoiceResponse::new(detail.invoice, as_of)?,
            student: detail.student,
            items: detail.items,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct InvoicesResponse {
    pub invoices: Vec<InvoiceResponse>,
}

// -----------------------------------------------------------------------------
// Payments
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 100))]
    pub reference_number: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecordPaymentResponse {
    pub payment: Payment,
    pub invoice: InvoiceResponse,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListPaymentsQuery {
    pub invoice_id: Option<Uuid>,
    pub payment_method: Option<PaymentMethod>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

// -----------------------------------------------------------------------------
// Reports
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
pub struct DailyCollectionQuery {
    /// Defaults to today when absent.
    pub date: Option<NaiveDate>,
}

// -----------------------------------------------------------------------------
// Roles
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct RoleQuery {
    pub user_id: Uuid,
}
