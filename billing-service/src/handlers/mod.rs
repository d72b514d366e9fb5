//! HTTP handlers for billing-service.

pub mod fees;
pub mod invoices;
pub mod payments;
pub mod reports;
pub mod roles;
pub mod students;
