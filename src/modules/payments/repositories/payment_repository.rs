use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{MySqlConnection, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::payments::models::{Payment, PaymentAllocation, PaymentMethod};

const SELECT_PAYMENT: &str = r#"
    SELECT id, sale_ref, amount, paid_at, method, reference,
           recorded_by, notes, created_at
    FROM payments
"#;

/// Repository for payments and their installment allocations
#[derive(Clone)]
pub struct PaymentRepository {
    pool: MySqlPool,
}

impl PaymentRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        let sql = format!("{} WHERE id = ?", SELECT_PAYMENT);

        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Payment::try_from).transpose()
    }

    /// Payments of a sale, oldest first
    pub async fn find_by_sale(&self, sale_ref: &str) -> Result<Vec<Payment>> {
        let sql = format!("{} WHERE sale_ref = ? ORDER BY paid_at ASC", SELECT_PAYMENT);

        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(sale_ref)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    pub async fn find_by_id_for_update(conn: &mut MySqlConnection, id: &str) -> Result<Option<Payment>> {
        let sql = format!("{} WHERE id = ? FOR UPDATE", SELECT_PAYMENT);

        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        row.map(Payment::try_from).transpose()
    }

    pub async fn count_by_sale(conn: &mut MySqlConnection, sale_ref: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE sale_ref = ?")
            .bind(sale_ref)
            .fetch_one(conn)
            .await?;

        Ok(count)
    }

    pub async fn insert(conn: &mut MySqlConnection, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, sale_ref, amount, paid_at, method, reference,
                recorded_by, notes, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_ref)
        .bind(payment.amount)
        .bind(payment.paid_at)
        .bind(payment.method.as_str())
        .bind(&payment.reference)
        .bind(&payment.recorded_by)
        .bind(&payment.notes)
        .bind(payment.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn update_notes(conn: &mut MySqlConnection, id: &str, notes: Option<&str>) -> Result<()> {
        let rows_affected = sqlx::query("UPDATE payments SET notes = ? WHERE id = ?")
            .bind(notes)
            .bind(id)
            .execute(conn)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found("Payment not found"));
        }

        Ok(())
    }

    pub async fn delete(conn: &mut MySqlConnection, id: &str) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM payments WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found("Payment not found"));
        }

        Ok(())
    }

    pub async fn insert_allocations(
        conn: &mut MySqlConnection,
        allocations: &[PaymentAllocation],
    ) -> Result<()> {
        for allocation in allocations {
            sqlx::query(
                r#"
                INSERT INTO payment_allocations (id, payment_id, installment_id, amount, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&allocation.id)
            .bind(&allocation.payment_id)
            .bind(&allocation.installment_id)
            .bind(allocation.amount)
            .bind(allocation.created_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    pub async fn find_allocations_for_update(
        conn: &mut MySqlConnection,
        payment_id: &str,
    ) -> Result<Vec<PaymentAllocation>> {
        let rows = sqlx::query_as::<_, AllocationRow>(
            r#"
            SELECT id, payment_id, installment_id, amount, created_at
            FROM payment_allocations
            WHERE payment_id = ?
            ORDER BY created_at ASC
            FOR UPDATE
            "#,
        )
        .bind(payment_id)
        .fetch_all(conn)
        .await?;

        Ok(rows.into_iter().map(PaymentAllocation::from).collect())
    }

    pub async fn delete_allocations(conn: &mut MySqlConnection, payment_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM payment_allocations WHERE payment_id = ?")
            .bind(payment_id)
            .execute(conn)
            .await?;

        Ok(())
    }
}

/// Database row representation for the payments table
#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: String,
    sale_ref: String,
    amount: Decimal,
    paid_at: DateTime<Utc>,
    method: String,
    reference: String,
    recorded_by: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        let method = row
            .method
            .parse::<PaymentMethod>()
            .map_err(AppError::Internal)?;

        Ok(Payment {
            id: row.id,
            sale_ref: row.sale_ref,
            amount: row.amount,
            paid_at: row.paid_at,
            method,
            reference: row.reference,
            recorded_by: row.recorded_by,
            notes: row.notes,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AllocationRow {
    id: String,
    payment_id: String,
    installment_id: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

impl From<AllocationRow> for PaymentAllocation {
    fn from(row: AllocationRow) -> Self {
        PaymentAllocation {
            id: row.id,
            payment_id: row.payment_id,
            installment_id: row.installment_id,
            amount: row.amount,
            created_at: row.created_at,
        }
    }
}
