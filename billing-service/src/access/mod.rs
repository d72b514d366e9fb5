//! Access policy gate for billing-service.
//!
//! Every mutating operation is authorized before it touches billing data:
//! the caller's id arrives in the `x-actor-id` header (set by the
//! authenticating frontend), the gate resolves it to a role row, and the
//! role is checked against the capability the operation requires. `staff`
//! is read-only across the whole service.

use anyhow::anyhow;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Actor, Role};
use crate::services::Database;

/// Billing service capabilities.
pub mod capabilities {
    /// Create and update students.
    pub const STUDENT_WRITE: &str = "billing.student:write";

    /// Hard-delete students (cascades to their invoices and payments).
    pub const STUDENT_DELETE: &str = "billing.student:delete";

    /// Create, update and delete fee structures.
    pub const FEE_STRUCTURE_WRITE: &str = "billing.fee_structure:write";

    /// Create, update and delete discounts.
    pub const DISCOUNT_WRITE: &str = "billing.discount:write";

    /// Create invoices.
    pub const INVOICE_CREATE: &str = "billing.invoice:create";

    /// Cancel unpaid invoices.
    pub const INVOICE_CANCEL: &str = "billing.invoice:cancel";

    /// Hard-delete invoices (destroys payment history).
    pub const INVOICE_DELETE: &str = "billing.invoice:delete";

    /// Record payments.
    pub const PAYMENT_RECORD: &str = "billing.payment:record";

    /// Assign user roles.
    pub const ROLE_ASSIGN: &str = "billing.role:assign";
}

/// True if `role` may exercise `capability`.
pub fn grants(role: Role, capability: &str) -> bool {
    match role {
        Role::Admin => true,
        Role::Accountant => !matches!(
            capability,
            capabilities::STUDENT_DELETE | capabilities::INVOICE_DELETE | capabilities::ROLE_ASSIGN
        ),
        Role::Staff => false,
    }
}

/// Caller id extracted from the `x-actor-id` request header.
#[derive(Debug, Clone, Copy)]
pub struct ActorId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get("x-actor-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized(anyhow!("Missing x-actor-id header")))?;

        let user_id = Uuid::parse_str(raw)
            .map_err(|_| AppError::Unauthorized(anyhow!("Malformed x-actor-id header")))?;

        Ok(ActorId(user_id))
    }
}

/// Resolves actors to roles and authorizes capabilities.
#[derive(Clone)]
pub struct AccessGate {
    db: Database,
}

impl AccessGate {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve the caller to an actor, failing if no role is assigned.
    pub async fn resolve(&self, actor_id: ActorId) -> Result<Actor, AppError> {
        let assignment = self
            .db
            .get_user_role(actor_id.0)
            .await?
            .ok_or_else(|| AppError::Forbidden(anyhow!("No role assigned to this user")))?;

        Ok(Actor {
            user_id: assignment.user_id,
            role: Role::from_string(&assignment.role),
        })
    }

    /// Resolve the caller and require a capability. Runs before the target
    /// operation reads or writes any billing data.
    pub async fn authorize(&self, actor_id: ActorId, capability: &str) -> Result<Actor, AppError> {
        let actor = self.resolve(actor_id).await?;

        if !grants(actor.role, capability) {
            tracing::warn!(
                user_id = %actor.user_id,
                role = actor.role.as_str(),
                capability = capability,
                "Mutation denied"
            );
            return Err(AppError::Forbidden(anyhow!(
                "Role '{}' is not permitted to perform this operation",
                actor.role.as_str()
            )));
        }

        Ok(actor)
    }
}
