//! Database service for billing-service.
//!
//! All writes go through here. Payment recording is the one operation with
//! real concurrency stakes: it locks the invoice row and re-validates the
//! balance inside the transaction, so two racing payments can never jointly
//! overpay an invoice.

use crate::models::{
    CreateDiscount, CreateFeeStructure, CreateInvoice, CreateStudent, Discount, FeeComponent,
    FeeStructure, FeeStructureDetail, Invoice, InvoiceDetail, InvoiceItem, InvoiceStatus,
    ListInvoicesFilter, ListPaymentsFilter, ListStudentsFilter, Payment, PaymentListRow,
    PaymentStatus, RecordPayment, Role, Student, UpdateDiscount, UpdateFeeStructure, UpdateStudent,
    UserRole,
};
use crate::services::metrics::{
    DB_QUERY_DURATION, INVOICES_TOTAL, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, invoice_number, student_id, amount, paid_amount, \
     status, due_date, description, created_by, created_utc, updated_utc";

const STUDENT_COLUMNS: &str = "student_id, admission_number, first_name, last_name, class, \
     section, date_of_birth, admission_date, parent_name, parent_phone, parent_email, address, \
     is_active, created_utc, updated_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "billing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Student Operations
    // -------------------------------------------------------------------------

    /// Enroll a new student.
    #[instrument(skip(self, input), fields(admission_number = %input.admission_number))]
    pub async fn create_student(&self, input: &CreateStudent) -> Result<Student, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_student"])
            .start_timer();

        let student_id = Uuid::new_v4();
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"
            INSERT INTO students (
                student_id, admission_number, first_name, last_name, class, section,
                date_of_birth, admission_date, parent_name, parent_phone, parent_email, address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {STUDENT_COLUMNS}
            "#,
        ))
        .bind(student_id)
        .bind(&input.admission_number)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.class)
        .bind(&input.section)
        .bind(input.date_of_birth)
        .bind(input.admission_date)
        .bind(&input.parent_name)
        .bind(&input.parent_phone)
        .bind(&input.parent_email)
        .bind(&input.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!(
                    "A student with admission number '{}' already exists",
                    input.admission_number
                ))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create student: {}", e)),
        })?;

        timer.observe_duration();

        info!(student_id = %student.student_id, "Student enrolled");

        Ok(student)
    }

    /// Get a student by ID.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_student"])
            .start_timer();

        let student = sqlx::query_as::<_, Student>(&format!(
            "SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = $1",
        ))
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get student: {}", e)))?;

        timer.observe_duration();

        Ok(student)
    }

    /// List students with optional class/active/search filters.
    #[instrument(skip(self, filter))]
    pub async fn list_students(
        &self,
        filter: &ListStudentsFilter,
    ) -> Result<Vec<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_students"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let search = filter
            .search
            .as_ref()
            .map(|s| format!("%{}%", s.to_lowercase()));

        let students = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Student>(&format!(
                r#"
                SELECT {STUDENT_COLUMNS}
                FROM students
                WHERE ($1::varchar IS NULL OR class = $1)
                  AND ($2::bool = FALSE OR is_active = TRUE)
                  AND ($3::varchar IS NULL
                       OR LOWER(first_name || ' ' || last_name) LIKE $3
                       OR LOWER(admission_number) LIKE $3)
                  AND student_id > $4
                ORDER BY student_id
                LIMIT $5
                "#,
            ))
            .bind(&filter.class)
            .bind(filter.active_only)
            .bind(&search)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Student>(&format!(
                r#"
                SELECT {STUDENT_COLUMNS}
                FROM students
                WHERE ($1::varchar IS NULL OR class = $1)
                  AND ($2::bool = FALSE OR is_active = TRUE)
                  AND ($3::varchar IS NULL
                       OR LOWER(first_name || ' ' || last_name) LIKE $3
                       OR LOWER(admission_number) LIKE $3)
                ORDER BY student_id
                LIMIT $4
                "#,
            ))
            .bind(&filter.class)
            .bind(filter.active_only)
            .bind(&search)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list students: {}", e)))?;

        timer.observe_duration();

        Ok(students)
    }

    /// Update a student.
    #[instrument(skip(self, input), fields(student_id = %student_id))]
    pub async fn update_student(
        &self,
        student_id: Uuid,
        input: &UpdateStudent,
    ) -> Result<Option<Student>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_student"])
            .start_timer();

        let student = sqlx::query_as::<_, Student>(&format!(
            r#"
            UPDATE students
            SET first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                class = COALESCE($4, class),
                section = COALESCE($5, section),
                date_of_birth = COALESCE($6, date_of_birth),
                admission_date = COALESCE($7, admission_date),
                parent_name = COALESCE($8, parent_name),
                parent_phone = COALESCE($9, parent_phone),
                parent_email = COALESCE($10, parent_email),
                address = COALESCE($11, address),
                is_active = COALESCE($12, is_active),
                updated_utc = NOW()
            WHERE student_id = $1
            RETURNING {STUDENT_COLUMNS}
            "#,
        ))
        .bind(student_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.class)
        .bind(&input.section)
        .bind(input.date_of_birth)
        .bind(input.admission_date)
        .bind(&input.parent_name)
        .bind(&input.parent_phone)
        .bind(&input.parent_email)
        .bind(&input.address)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update student: {}", e)))?;

        timer.observe_duration();

        Ok(student)
    }

    /// Hard-delete a student. Cascades to invoices, items and payments.
    #[instrument(skip(self), fields(student_id = %student_id))]
    pub async fn delete_student(&self, student_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_student"])
            .start_timer();

        let result = sqlx::query("DELETE FROM students WHERE student_id = $1")
            .bind(student_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete student: {}", e))
            })?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(student_id = %student_id, "Student deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Fee Structure Operations
    // -------------------------------------------------------------------------

    /// Create a fee structure with its components.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_fee_structure(
        &self,
        input: &CreateFeeStructure,
    ) -> Result<FeeStructureDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_fee_structure"])
            .start_timer();

        if input.components.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "A fee structure needs at least one component"
            )));
        }
        for component in &input.components {
            if component.amount <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Fee component amounts must be positive"
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let fee_structure_id = Uuid::new_v4();
        let fee_structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            INSERT INTO fee_structures (fee_structure_id, name, classes)
            VALUES ($1, $2, $3)
            RETURNING fee_structure_id, name, classes, created_utc, updated_utc
            "#,
        )
        .bind(fee_structure_id)
        .bind(&input.name)
        .bind(&input.classes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to create fee structure: {}", e))
        })?;

        let mut components = Vec::with_capacity(input.components.len());
        for (idx, component) in input.components.iter().enumerate() {
            let row = sqlx::query_as::<_, FeeComponent>(
                r#"
                INSERT INTO fee_components (component_id, fee_structure_id, name, amount, frequency, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING component_id, fee_structure_id, name, amount, frequency, sort_order, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(fee_structure_id)
            .bind(&component.name)
            .bind(component.amount)
            .bind(component.frequency.as_str())
            .bind(idx as i32)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to add fee component: {}", e))
            })?;
            components.push(row);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(fee_structure_id = %fee_structure_id, "Fee structure created");

        Ok(FeeStructureDetail {
            fee_structure,
            components,
        })
    }

    /// Get a fee structure with its components.
    #[instrument(skip(self), fields(fee_structure_id = %fee_structure_id))]
    pub async fn get_fee_structure(
        &self,
        fee_structure_id: Uuid,
    ) -> Result<Option<FeeStructureDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_fee_structure"])
            .start_timer();

        let fee_structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT fee_structure_id, name, classes, created_utc, updated_utc
            FROM fee_structures
            WHERE fee_structure_id = $1
            "#,
        )
        .bind(fee_structure_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get fee structure: {}", e))
        })?;

        let Some(fee_structure) = fee_structure else {
            timer.observe_duration();
            return Ok(None);
        };

        let components = sqlx::query_as::<_, FeeComponent>(
            r#"
            SELECT component_id, fee_structure_id, name, amount, frequency, sort_order, created_utc
            FROM fee_components
            WHERE fee_structure_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(fee_structure_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get fee components: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some(FeeStructureDetail {
            fee_structure,
            components,
        }))
    }

    /// List fee structures.
    #[instrument(skip(self))]
    pub async fn list_fee_structures(&self) -> Result<Vec<FeeStructure>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_fee_structures"])
            .start_timer();

        let fee_structures = sqlx::query_as::<_, FeeStructure>(
            r#"
            SELECT fee_structure_id, name, classes, created_utc, updated_utc
            FROM fee_structures
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list fee structures: {}", e))
        })?;

        timer.observe_duration();

        Ok(fee_structures)
    }

    /// Update a fee structure. A supplied component list replaces the old one.
    #[instrument(skip(self, input), fields(fee_structure_id = %fee_structure_id))]
    pub async fn update_fee_structure(
        &self,
        fee_structure_id: Uuid,
        input: &UpdateFeeStructure,
    ) -> Result<Option<FeeStructureDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_fee_structure"])
            .start_timer();

        if let Some(components) = &input.components {
            if components.is_empty() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "A fee structure needs at least one component"
                )));
            }
            for component in components {
                if component.amount <= Decimal::ZERO {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Fee component amounts must be positive"
                    )));
                }
            }
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let fee_structure = sqlx::query_as::<_, FeeStructure>(
            r#"
            UPDATE fee_structures
            SET name = COALESCE($2, name),
                classes = COALESCE($3, classes),
                updated_utc = NOW()
            WHERE fee_structure_id = $1
            RETURNING fee_structure_id, name, classes, created_utc, updated_utc
            "#,
        )
        .bind(fee_structure_id)
        .bind(&input.name)
        .bind(&input.classes)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to update fee structure: {}", e))
        })?;

        let Some(fee_structure) = fee_structure else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        if let Some(new_components) = &input.components {
            sqlx::query("DELETE FROM fee_components WHERE fee_structure_id = $1")
                .bind(fee_structure_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to replace fee components: {}",
                        e
                    ))
                })?;

            for (idx, component) in new_components.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO fee_components (component_id, fee_structure_id, name, amount, frequency, sort_order)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(fee_structure_id)
                .bind(&component.name)
                .bind(component.amount)
                .bind(component.frequency.as_str())
                .bind(idx as i32)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to add fee component: {}", e))
                })?;
            }
        }

        let components = sqlx::query_as::<_, FeeComponent>(
            r#"
            SELECT component_id, fee_structure_id, name, amount, frequency, sort_order, created_utc
            FROM fee_components
            WHERE fee_structure_id = $1
            ORDER BY sort_order, created_utc
            "#,
        )
        .bind(fee_structure_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get fee components: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some(FeeStructureDetail {
            fee_structure,
            components,
        }))
    }

    /// Delete a fee structure and its components.
    #[instrument(skip(self), fields(fee_structure_id = %fee_structure_id))]
    pub async fn delete_fee_structure(&self, fee_structure_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM fee_structures WHERE fee_structure_id = $1")
            .bind(fee_structure_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete fee structure: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Discount Operations
    // -------------------------------------------------------------------------

    /// Create a discount.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_discount(&self, input: &CreateDiscount) -> Result<Discount, AppError> {
        if input.value <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Discount value must be positive"
            )));
        }

        let discount = sqlx::query_as::<_, Discount>(
            r#"
            INSERT INTO discounts (discount_id, name, discount_type, value, applicability)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING discount_id, name, discount_type, value, applicability, is_active, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(input.discount_type.as_str())
        .bind(input.value)
        .bind(&input.applicability)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create discount: {}", e)))?;

        info!(discount_id = %discount.discount_id, "Discount created");

        Ok(discount)
    }

    /// List discounts.
    #[instrument(skip(self))]
    pub async fn list_discounts(&self, active_only: bool) -> Result<Vec<Discount>, AppError> {
        let discounts = sqlx::query_as::<_, Discount>(
            r#"
            SELECT discount_id, name, discount_type, value, applicability, is_active, created_utc
            FROM discounts
            WHERE ($1::bool = FALSE OR is_active = TRUE)
            ORDER BY name
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list discounts: {}", e)))?;

        Ok(discounts)
    }

    /// Fetch a set of discounts by id.
    #[instrument(skip(self, discount_ids))]
    pub async fn get_discounts(&self, discount_ids: &[Uuid]) -> Result<Vec<Discount>, AppError> {
        if discount_ids.is_empty() {
            return Ok(Vec::new());
        }

        let discounts = sqlx::query_as::<_, Discount>(
            r#"
            SELECT discount_id, name, discount_type, value, applicability, is_active, created_utc
            FROM discounts
            WHERE discount_id = ANY($1)
            "#,
        )
        .bind(discount_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get discounts: {}", e)))?;

        Ok(discounts)
    }

    /// Update a discount.
    #[instrument(skip(self, input), fields(discount_id = %discount_id))]
    pub async fn update_discount(
        &self,
        discount_id: Uuid,
        input: &UpdateDiscount,
    ) -> Result<Option<Discount>, AppError> {
        if let Some(value) = input.value {
            if value <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Discount value must be positive"
                )));
            }
        }

        let discount = sqlx::query_as::<_, Discount>(
            r#"
            UPDATE discounts
            SET name = COALESCE($2, name),
                discount_type = COALESCE($3, discount_type),
                value = COALESCE($4, value),
                applicability = COALESCE($5, applicability),
                is_active = COALESCE($6, is_active)
            WHERE discount_id = $1
            RETURNING discount_id, name, discount_type, value, applicability, is_active, created_utc
            "#,
        )
        .bind(discount_id)
        .bind(&input.name)
        .bind(input.discount_type.map(|t| t.as_str()))
        .bind(input.value)
        .bind(&input.applicability)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update discount: {}", e)))?;

        Ok(discount)
    }

    /// Delete a discount.
    #[instrument(skip(self), fields(discount_id = %discount_id))]
    pub async fn delete_discount(&self, discount_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM discounts WHERE discount_id = $1")
            .bind(discount_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete discount: {}", e))
            })?;

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice with its items.
    ///
    /// The invoice amount is the item sum, fixed here; items are never
    /// editable afterward. The invoice number comes from the store-side
    /// sequence; an allocation conflict gets one retry.
    #[instrument(skip(self, input), fields(student_id = %input.student_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<InvoiceDetail, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        if input.items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "At least one invoice item is required"
            )));
        }
        for item in &input.items {
            if item.description.trim().is_empty() {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoice item descriptions must not be empty"
                )));
            }
            if item.amount <= Decimal::ZERO {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoice item amounts must be positive"
                )));
            }
        }

        let student = self
            .get_student(input.student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let amount: Decimal = input.items.iter().map(|i| i.amount).sum();

        let mut attempt = 0;
        let detail = loop {
            match self.try_insert_invoice(input, &student, amount).await {
                Ok(detail) => break detail,
                Err(AppError::Conflict(_)) if attempt == 0 => {
                    // Invoice number allocation collided; allocate again.
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        timer.observe_duration();

        INVOICES_TOTAL
            .with_label_values(&[InvoiceStatus::Pending.as_str()])
            .inc();

        info!(
            invoice_id = %detail.invoice.invoice_id,
            invoice_number = %detail.invoice.invoice_number,
            amount = %detail.invoice.amount,
            "Invoice created"
        );

        Ok(detail)
    }

    async fn try_insert_invoice(
        &self,
        input: &CreateInvoice,
        student: &Student,
        amount: Decimal,
    ) -> Result<InvoiceDetail, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, invoice_number, student_id, amount, paid_amount, status,
                due_date, description, created_by
            )
            VALUES ($1, next_invoice_number(), $2, $3, 0, 'pending', $4, $5, $6)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(input.student_id)
        .bind(amount)
        .bind(input.due_date)
        .bind(&input.description)
        .bind(input.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Invoice number allocation conflict"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let row = sqlx::query_as::<_, InvoiceItem>(
                r#"
                INSERT INTO invoice_items (item_id, invoice_id, description, amount)
                VALUES ($1, $2, $3, $4)
                RETURNING item_id, invoice_id, description, amount, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(&item.description)
            .bind(item.amount)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to add invoice item: {}", e))
            })?;
            items.push(row);
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        Ok(InvoiceDetail {
            invoice,
            student: student.clone(),
            items,
        })
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1",
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get an invoice joined with its student and items, the shape
    /// document renderers consume.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice_detail(
        &self,
        invoice_id: Uuid,
    ) -> Result<Option<InvoiceDetail>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice_detail"])
            .start_timer();

        let Some(invoice) = self.get_invoice(invoice_id).await? else {
            timer.observe_duration();
            return Ok(None);
        };

        let student = self
            .get_student(invoice.student_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Student not found")))?;

        let items = sqlx::query_as::<_, InvoiceItem>(
            r#"
            SELECT item_id, invoice_id, description, amount, created_utc
            FROM invoice_items
            WHERE invoice_id = $1
            ORDER BY created_utc
            "#,
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice items: {}", e))
        })?;

        timer.observe_duration();

        Ok(Some(InvoiceDetail {
            invoice,
            student,
            items,
        }))
    }

    /// List invoices with optional status/student/class filters.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT i.invoice_id, i.invoice_number, i.student_id, i.amount, i.paid_amount,
                       i.status, i.due_date, i.description, i.created_by, i.created_utc, i.updated_utc
                FROM invoices i
                JOIN students s ON s.student_id = i.student_id
                WHERE ($1::varchar IS NULL OR i.status = $1)
                  AND ($2::uuid IS NULL OR i.student_id = $2)
                  AND ($3::varchar IS NULL OR s.class = $3)
                  AND i.invoice_id > $4
                ORDER BY i.invoice_id
                LIMIT $5
                "#,
            )
            .bind(&status_str)
            .bind(filter.student_id)
            .bind(&filter.class)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(
                r#"
                SELECT i.invoice_id, i.invoice_number, i.student_id, i.amount, i.paid_amount,
                       i.status, i.due_date, i.description, i.created_by, i.created_utc, i.updated_utc
                FROM invoices i
                JOIN students s ON s.student_id = i.student_id
                WHERE ($1::varchar IS NULL OR i.status = $1)
                  AND ($2::uuid IS NULL OR i.student_id = $2)
                  AND ($3::varchar IS NULL OR s.class = $3)
                ORDER BY i.invoice_id
                LIMIT $4
                "#,
            )
            .bind(&status_str)
            .bind(filter.student_id)
            .bind(&filter.class)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Cancel an invoice. Only invoices without recorded payments qualify.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn cancel_invoice(&self, invoice_id: Uuid) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_invoice"])
            .start_timer();

        let existing = self.get_invoice(invoice_id).await?;
        match existing {
            Some(ref inv) if inv.paid_amount > Decimal::ZERO => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoices with recorded payments cannot be cancelled"
                )))
            }
            Some(ref inv) if inv.status == "cancelled" => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invoice is already cancelled"
                )))
            }
            Some(_) => {}
            None => return Ok(None),
        }

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'cancelled',
                updated_utc = NOW()
            WHERE invoice_id = $1 AND paid_amount = 0
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel invoice: {}", e)))?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            INVOICES_TOTAL
                .with_label_values(&[InvoiceStatus::Cancelled.as_str()])
                .inc();
            info!(invoice_id = %inv.invoice_id, "Invoice cancelled");
        }

        Ok(invoice)
    }

    /// Hard-delete an invoice. Cascades to items and payments, destroying
    /// payment history; gated to admins at the policy layer.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, invoice_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM invoices WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e))
            })?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    /// Record a payment against an invoice and advance the invoice's paid
    /// amount and status, atomically.
    ///
    /// The invoice row is locked for the duration of the transaction so the
    /// balance check and the update see the same state; a concurrent payment
    /// waits on the lock and re-reads the raised paid_amount.
    #[instrument(skip(self, input), fields(invoice_id = %input.invoice_id, amount = %input.amount))]
    pub async fn record_payment(
        &self,
        input: &RecordPayment,
    ) -> Result<(Payment, Invoice), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        if input.amount <= Decimal::ZERO {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount must be positive"
            )));
        }

        let mut attempt = 0;
        let (payment, invoice) = loop {
            match self.try_record_payment(input).await {
                Ok(result) => break result,
                Err(AppError::Conflict(_)) if attempt == 0 => {
                    // Transaction id allocation collided; allocate again.
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        };

        timer.observe_duration();

        PAYMENTS_TOTAL
            .with_label_values(&[payment.payment_method.as_str()])
            .inc();
        PAYMENT_AMOUNT_TOTAL
            .with_label_values(&[payment.payment_method.as_str()])
            .inc_by(payment.amount.to_f64().unwrap_or(0.0));

        info!(
            payment_id = %payment.payment_id,
            transaction_id = %payment.transaction_id,
            amount = %payment.amount,
            invoice_status = %invoice.status,
            "Payment recorded"
        );

        Ok((payment, invoice))
    }

    async fn try_record_payment(
        &self,
        input: &RecordPayment,
    ) -> Result<(Payment, Invoice), AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE invoice_id = $1 FOR UPDATE",
        ))
        .bind(input.invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load invoice: {}", e))
        })?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

        let status = InvoiceStatus::from_string(&invoice.status);
        if !status.accepts_payments() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payments can only be recorded against pending or partial invoices"
            )));
        }

        let balance_due = invoice.balance_due()?;
        if input.amount > balance_due {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Payment amount {} exceeds balance due {}",
                input.amount,
                balance_due
            )));
        }

        // Manually entered payments are complete the moment they are saved;
        // there is no asynchronous gateway flow.
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                payment_id, transaction_id, invoice_id, amount, payment_method, status, reference_number
            )
            VALUES ($1, next_transaction_id(), $2, $3, $4, $5, $6)
            RETURNING payment_id, transaction_id, invoice_id, amount, payment_method, status,
                reference_number, gateway_response, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.invoice_id)
        .bind(input.amount)
        .bind(input.payment_method.as_str())
        .bind(PaymentStatus::Completed.as_str())
        .bind(&input.reference_number)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Transaction id allocation conflict"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to record payment: {}", e)),
        })?;

        let new_paid = invoice.paid_amount + input.amount;
        let new_status = InvoiceStatus::after_payment(new_paid, invoice.amount);

        let updated = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET paid_amount = $2,
                status = $3,
                updated_utc = NOW()
            WHERE invoice_id = $1
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(input.invoice_id)
        .bind(new_paid)
        .bind(new_status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        Ok((payment, updated))
    }

    /// Get a payment by ID.
    #[instrument(skip(self), fields(payment_id = %payment_id))]
    pub async fn get_payment(&self, payment_id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, transaction_id, invoice_id, amount, payment_method, status,
                reference_number, gateway_response, created_utc
            FROM payments
            WHERE payment_id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get payment: {}", e)))?;

        Ok(payment)
    }

    /// List payments joined with invoice and student context.
    #[instrument(skip(self, filter))]
    pub async fn list_payments(
        &self,
        filter: &ListPaymentsFilter,
    ) -> Result<Vec<PaymentListRow>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let method_str = filter.payment_method.map(|m| m.as_str().to_string());

        let payments = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, PaymentListRow>(
                r#"
                SELECT p.payment_id, p.transaction_id, p.invoice_id, i.invoice_number,
                       p.amount, p.payment_method, p.status, p.reference_number, p.created_utc,
                       s.first_name, s.last_name, s.class, s.section
                FROM payments p
                JOIN invoices i ON i.invoice_id = p.invoice_id
                JOIN students s ON s.student_id = i.student_id
                WHERE ($1::uuid IS NULL OR p.invoice_id = $1)
                  AND ($2::varchar IS NULL OR p.payment_method = $2)
                  AND ($3::date IS NULL OR p.created_utc >= $3::date)
                  AND ($4::date IS NULL OR p.created_utc < $4::date + INTERVAL '1 day')
                  AND p.payment_id > $5
                ORDER BY p.payment_id
                LIMIT $6
                "#,
            )
            .bind(filter.invoice_id)
            .bind(&method_str)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, PaymentListRow>(
                r#"
                SELECT p.payment_id, p.transaction_id, p.invoice_id, i.invoice_number,
                       p.amount, p.payment_method, p.status, p.reference_number, p.created_utc,
                       s.first_name, s.last_name, s.class, s.section
                FROM payments p
                JOIN invoices i ON i.invoice_id = p.invoice_id
                JOIN students s ON s.student_id = i.student_id
                WHERE ($1::uuid IS NULL OR p.invoice_id = $1)
                  AND ($2::varchar IS NULL OR p.payment_method = $2)
                  AND ($3::date IS NULL OR p.created_utc >= $3::date)
                  AND ($4::date IS NULL OR p.created_utc < $4::date + INTERVAL '1 day')
                ORDER BY p.payment_id
                LIMIT $5
                "#,
            )
            .bind(filter.invoice_id)
            .bind(&method_str)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list payments: {}", e)))?;

        timer.observe_duration();

        Ok(payments)
    }

    // -------------------------------------------------------------------------
    // Role Operations
    // -------------------------------------------------------------------------

    /// Assign a role to a user, replacing any existing assignment.
    #[instrument(skip(self), fields(user_id = %user_id, role = role.as_str()))]
    pub async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<UserRole, AppError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to clear existing role: {}", e))
            })?;

        let assignment = sqlx::query_as::<_, UserRole>(
            r#"
            INSERT INTO user_roles (role_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING role_id, user_id, role, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to assign role: {}", e)))?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        info!(user_id = %user_id, role = role.as_str(), "Role assigned");

        Ok(assignment)
    }

    /// Get a user's role assignment. Duplicate rows are tolerated by taking
    /// one.
    pub async fn get_user_role(&self, user_id: Uuid) -> Result<Option<UserRole>, AppError> {
        let assignment = sqlx::query_as::<_, UserRole>(
            r#"
            SELECT role_id, user_id, role, created_utc
            FROM user_roles
            WHERE user_id = $1
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user role: {}", e)))?;

        Ok(assignment)
    }
}
