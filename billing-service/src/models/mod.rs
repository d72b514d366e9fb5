//! Domain models for billing-service.

mod discount;
mod fee_structure;
mod invoice;
mod payment;
mod role;
mod student;

pub use discount::{apply_discounts, CreateDiscount, Discount, DiscountType, UpdateDiscount};
pub use fee_structure::{
    CreateFeeComponent, CreateFeeStructure, FeeComponent, FeeFrequency, FeeStructure,
    FeeStructureDetail, UpdateFeeStructure,
};
pub use invoice::{
    CreateInvoice, CreateInvoiceItem, Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus,
    ListInvoicesFilter,
};
pub use payment::{
    ListPaymentsFilter, Payment, PaymentListRow, PaymentMethod, PaymentStatus, RecordPayment,
};
pub use role::{Actor, Role, UserRole};
pub use student::{CreateStudent, ListStudentsFilter, Student, UpdateStudent};
