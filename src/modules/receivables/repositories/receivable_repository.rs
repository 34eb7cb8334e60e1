use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{MySqlConnection, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::receivables::models::{Receivable, ReceivableStatus};

const SELECT_RECEIVABLE: &str = r#"
    SELECT id, sale_ref, total_amount, paid_amount, outstanding_amount,
           due_date, status, created_at, updated_at
    FROM receivables
"#;

/// Repository for receivable database operations
///
/// Reads through the pool take no locks. Functions taking a connection are
/// meant to run inside an open transaction.
#[derive(Clone)]
pub struct ReceivableRepository {
    pool: MySqlPool,
}

impl ReceivableRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Receivable>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_one_where(&mut conn, "id = ?", id, false).await
    }

    pub async fn find_by_sale(&self, sale_ref: &str) -> Result<Option<Receivable>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_one_where(&mut conn, "sale_ref = ?", sale_ref, false).await
    }

    /// Find by id and lock the row (`FOR UPDATE`)
    pub async fn find_by_id_for_update(conn: &mut MySqlConnection, id: &str) -> Result<Option<Receivable>> {
        Self::fetch_one_where(conn, "id = ?", id, true).await
    }

    /// Find by sale reference and lock the row (`FOR UPDATE`)
    pub async fn find_by_sale_for_update(
        conn: &mut MySqlConnection,
        sale_ref: &str,
    ) -> Result<Option<Receivable>> {
        Self::fetch_one_where(conn, "sale_ref = ?", sale_ref, true).await
    }

    async fn fetch_one_where(
        conn: &mut MySqlConnection,
        predicate: &str,
        value: &str,
        lock: bool,
    ) -> Result<Option<Receivable>> {
        let sql = format!(
            "{} WHERE {}{}",
            SELECT_RECEIVABLE,
            predicate,
            if lock { " FOR UPDATE" } else { "" }
        );

        let row = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(value)
            .fetch_optional(conn)
            .await?;

        row.map(Receivable::try_from).transpose()
    }

    /// Not-yet-paid receivables with a due date before `today`, locked
    pub async fn find_past_due_for_update(
        conn: &mut MySqlConnection,
        today: NaiveDate,
    ) -> Result<Vec<Receivable>> {
        let sql = format!(
            "{} WHERE status <> 'paid' AND due_date IS NOT NULL AND due_date < ? ORDER BY id FOR UPDATE",
            SELECT_RECEIVABLE
        );

        let rows = sqlx::query_as::<_, ReceivableRow>(&sql)
            .bind(today)
            .fetch_all(conn)
            .await?;

        rows.into_iter().map(Receivable::try_from).collect()
    }

    pub async fn insert(conn: &mut MySqlConnection, receivable: &Receivable) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO receivables (
                id, sale_ref, total_amount, paid_amount, outstanding_amount,
                due_date, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&receivable.id)
        .bind(&receivable.sale_ref)
        .bind(receivable.total_amount)
        .bind(receivable.paid_amount)
        .bind(receivable.outstanding_amount)
        .bind(receivable.due_date)
        .bind(receivable.status.as_str())
        .bind(receivable.created_at)
        .bind(receivable.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn update(conn: &mut MySqlConnection, receivable: &Receivable) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE receivables
            SET paid_amount = ?, outstanding_amount = ?, due_date = ?, status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(receivable.paid_amount)
        .bind(receivable.outstanding_amount)
        .bind(receivable.due_date)
        .bind(receivable.status.as_str())
        .bind(receivable.updated_at)
        .bind(&receivable.id)
        .execute(conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found("Receivable not found"));
        }

        Ok(())
    }
}

/// Database row representation for the receivables table
#[derive(sqlx::FromRow)]
struct ReceivableRow {
    id: String,
    sale_ref: String,
    total_amount: Decimal,
    paid_amount: Decimal,
    outstanding_amount: Decimal,
    due_date: Option<NaiveDate>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReceivableRow> for Receivable {
    type Error = AppError;

    fn try_from(row: ReceivableRow) -> Result<Self> {
        let status = row
            .status
            .parse::<ReceivableStatus>()
            .map_err(AppError::Internal)?;

        Ok(Receivable {
            id: row.id,
            sale_ref: row.sale_ref,
            total_amount: row.total_amount,
            paid_amount: row.paid_amount,
            outstanding_amount: row.outstanding_amount,
            due_date: row.due_date,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
