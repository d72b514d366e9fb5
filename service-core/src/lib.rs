//! service-core: shared infrastructure for the EduBill billing service.

pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
