// Installment persistence
//
// Reads ordered by sequence number, row-locking variants for units of work,
// batch insert/update and the overdue promotion used by the daily sweep.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{MySqlConnection, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::installments::models::{Installment, InstallmentStatus};

const SELECT_INSTALLMENT: &str = r#"
    SELECT id, receivable_id, sequence_number, amount, due_date,
           paid_date, status, created_at, updated_at
    FROM installments
"#;

/// Repository for installment database operations
#[derive(Clone)]
pub struct InstallmentRepository {
    pool: MySqlPool,
}

impl InstallmentRepository {
    /// Create a new installment repository
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Find all installments for a receivable
    ///
    /// # Returns
    /// * `Result<Vec<Installment>>` - Ordered list of installments (by sequence_number)
    pub async fn find_by_receivable(&self, receivable_id: &str) -> Result<Vec<Installment>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_receivable(&mut conn, receivable_id, false).await
    }

    /// Same as [`Self::find_by_receivable`], locking the rows
    pub async fn find_by_receivable_for_update(
        conn: &mut MySqlConnection,
        receivable_id: &str,
    ) -> Result<Vec<Installment>> {
        Self::fetch_by_receivable(conn, receivable_id, true).await
    }

    async fn fetch_by_receivable(
        conn: &mut MySqlConnection,
        receivable_id: &str,
        lock: bool,
    ) -> Result<Vec<Installment>> {
        let sql = format!(
            "{} WHERE receivable_id = ? ORDER BY sequence_number ASC{}",
            SELECT_INSTALLMENT,
            if lock { " FOR UPDATE" } else { "" }
        );

        let rows = sqlx::query_as::<_, InstallmentRow>(&sql)
            .bind(receivable_id)
            .fetch_all(conn)
            .await?;

        rows.into_iter().map(Installment::try_from).collect()
    }

    /// Find a single installment by ID and lock it
    pub async fn find_by_id_for_update(conn: &mut MySqlConnection, id: &str) -> Result<Option<Installment>> {
        let sql = format!("{} WHERE id = ? FOR UPDATE", SELECT_INSTALLMENT);

        let row = sqlx::query_as::<_, InstallmentRow>(&sql)
            .bind(id)
            .fetch_optional(conn)
            .await?;

        row.map(Installment::try_from).transpose()
    }

    /// Insert a batch of installments
    pub async fn insert_batch(conn: &mut MySqlConnection, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            sqlx::query(
                r#"
                INSERT INTO installments (
                    id, receivable_id, sequence_number, amount, due_date,
                    paid_date, status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&installment.id)
            .bind(&installment.receivable_id)
            .bind(installment.sequence_number)
            .bind(installment.amount)
            .bind(installment.due_date)
            .bind(installment.paid_date)
            .bind(installment.status.as_str())
            .bind(installment.created_at)
            .bind(installment.updated_at)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Persist balance, status and paid date of a batch of installments
    pub async fn update_batch(conn: &mut MySqlConnection, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            let rows_affected = sqlx::query(
                r#"
                UPDATE installments
                SET amount = ?, paid_date = ?, status = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(installment.amount)
            .bind(installment.paid_date)
            .bind(installment.status.as_str())
            .bind(installment.updated_at)
            .bind(&installment.id)
            .execute(&mut *conn)
            .await?
            .rows_affected();

            if rows_affected == 0 {
                return Err(AppError::not_found(format!(
                    "Installment {} not found",
                    installment.id
                )));
            }
        }

        Ok(())
    }

    pub async fn delete_by_receivable(conn: &mut MySqlConnection, receivable_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM installments WHERE receivable_id = ?")
            .bind(receivable_id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Promote pending installments due before `today` to overdue
    pub async fn mark_overdue(conn: &mut MySqlConnection, today: NaiveDate) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE installments
            SET status = 'overdue', updated_at = ?
            WHERE status = 'pending' AND due_date < ?
            "#,
        )
        .bind(Utc::now())
        .bind(today)
        .execute(conn)
        .await?;

        Ok(result.rows_affected())
    }
}

/// Database row representation for the installments table
#[derive(sqlx::FromRow)]
struct InstallmentRow {
    id: String,
    receivable_id: String,
    sequence_number: i32,
    amount: Decimal,
    due_date: NaiveDate,
    paid_date: Option<NaiveDate>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstallmentRow> for Installment {
    type Error = AppError;

    fn try_from(row: InstallmentRow) -> Result<Self> {
        let status = row
            .status
            .parse::<InstallmentStatus>()
            .map_err(AppError::Internal)?;

        Ok(Installment {
            id: row.id,
            receivable_id: row.receivable_id,
            sequence_number: row.sequence_number,
            amount: row.amount,
            due_date: row.due_date,
            paid_date: row.paid_date,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
