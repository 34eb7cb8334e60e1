use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{MySqlConnection, MySqlPool};

use crate::core::{AppError, Result};
use crate::modules::gateways::models::{GatewayTransaction, GatewayTransactionStatus};

const SELECT_TRANSACTION: &str = r#"
    SELECT id, sale_ref, installment_id, external_transaction_id, internal_transaction_id,
           amount, status, payment_id, payment_method_id, payment_method_name,
           qr_image, checkout_url, expiration_date, paid_at, error_message,
           response_data, created_at, updated_at
    FROM gateway_transactions
"#;

/// Gateway transaction repository for database operations
#[derive(Clone)]
pub struct GatewayTransactionRepository {
    pool: MySqlPool,
}

impl GatewayTransactionRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Find by row id, internal transaction id or external transaction id
    pub async fn find_by_key(&self, key: &str) -> Result<Option<GatewayTransaction>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_by_key(&mut conn, key, false).await
    }

    /// Same as [`Self::find_by_key`], locking the row
    pub async fn find_by_key_for_update(
        conn: &mut MySqlConnection,
        key: &str,
    ) -> Result<Option<GatewayTransaction>> {
        Self::fetch_by_key(conn, key, true).await
    }

    async fn fetch_by_key(
        conn: &mut MySqlConnection,
        key: &str,
        lock: bool,
    ) -> Result<Option<GatewayTransaction>> {
        let sql = format!(
            "{} WHERE id = ? OR internal_transaction_id = ? OR external_transaction_id = ? LIMIT 1{}",
            SELECT_TRANSACTION,
            if lock { " FOR UPDATE" } else { "" }
        );

        let row = sqlx::query_as::<_, GatewayTransactionRow>(&sql)
            .bind(key)
            .bind(key)
            .bind(key)
            .fetch_optional(conn)
            .await?;

        row.map(GatewayTransaction::try_from).transpose()
    }

    pub async fn insert(conn: &mut MySqlConnection, transaction: &GatewayTransaction) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gateway_transactions (
                id, sale_ref, installment_id, external_transaction_id, internal_transaction_id,
                amount, status, payment_id, payment_method_id, payment_method_name,
                qr_image, checkout_url, expiration_date, paid_at, error_message,
                response_data, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.sale_ref)
        .bind(&transaction.installment_id)
        .bind(&transaction.external_transaction_id)
        .bind(&transaction.internal_transaction_id)
        .bind(transaction.amount)
        .bind(transaction.status.as_str())
        .bind(&transaction.payment_id)
        .bind(transaction.payment_method_id)
        .bind(&transaction.payment_method_name)
        .bind(&transaction.qr_image)
        .bind(&transaction.checkout_url)
        .bind(transaction.expiration_date)
        .bind(transaction.paid_at)
        .bind(&transaction.error_message)
        .bind(Json(&transaction.response_data))
        .bind(transaction.created_at)
        .bind(transaction.updated_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Persist the mutable columns of a transaction
    pub async fn update(conn: &mut MySqlConnection, transaction: &GatewayTransaction) -> Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE gateway_transactions
            SET external_transaction_id = ?, status = ?, payment_id = ?,
                payment_method_name = ?, paid_at = ?, error_message = ?,
                response_data = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&transaction.external_transaction_id)
        .bind(transaction.status.as_str())
        .bind(&transaction.payment_id)
        .bind(&transaction.payment_method_name)
        .bind(transaction.paid_at)
        .bind(&transaction.error_message)
        .bind(Json(&transaction.response_data))
        .bind(transaction.updated_at)
        .bind(&transaction.id)
        .execute(conn)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            return Err(AppError::not_found("Gateway transaction not found"));
        }

        Ok(())
    }
}

/// Database row representation for the gateway_transactions table
#[derive(sqlx::FromRow)]
struct GatewayTransactionRow {
    id: String,
    sale_ref: String,
    installment_id: Option<String>,
    external_transaction_id: Option<String>,
    internal_transaction_id: String,
    amount: Decimal,
    status: String,
    payment_id: Option<String>,
    payment_method_id: Option<i32>,
    payment_method_name: Option<String>,
    qr_image: Option<String>,
    checkout_url: Option<String>,
    expiration_date: Option<DateTime<Utc>>,
    paid_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    response_data: Option<Json<serde_json::Value>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GatewayTransactionRow> for GatewayTransaction {
    type Error = AppError;

    fn try_from(row: GatewayTransactionRow) -> Result<Self> {
        let status = row
            .status
            .parse::<GatewayTransactionStatus>()
            .map_err(AppError::Internal)?;

        Ok(GatewayTransaction {
            id: row.id,
            sale_ref: row.sale_ref,
            installment_id: row.installment_id,
            external_transaction_id: row.external_transaction_id,
            internal_transaction_id: row.internal_transaction_id,
            amount: row.amount,
            status,
            payment_id: row.payment_id,
            payment_method_id: row.payment_method_id,
            payment_method_name: row.payment_method_name,
            qr_image: row.qr_image,
            checkout_url: row.checkout_url,
            expiration_date: row.expiration_date,
            paid_at: row.paid_at,
            error_message: row.error_message,
            response_data: row
                .response_data
                .map(|Json(value)| value)
                .unwrap_or_else(|| serde_json::Value::Array(Vec::new())),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
