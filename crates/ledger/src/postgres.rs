use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BuyerId, CheckoutId, Money, ProductId, Quantity, SaleId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::store::{SaleLedger, record_append};
use crate::{FailureReason, LedgerError, Result, SaleRecord, SaleStatus};

const SALE_COLUMNS: &str = "id, checkout_id, product_id, quantity, unit_price_cents, \
     line_total_cents, buyer, status, reason, created_at";

/// PostgreSQL-backed sale ledger.
#[derive(Clone)]
pub struct PostgresSaleLedger {
    pool: PgPool,
}

impl PostgresSaleLedger {
    /// Creates a new PostgreSQL sale ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<SaleRecord> {
        let id = SaleId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let raw_quantity: i64 = row.try_get("quantity")?;
        let quantity = Quantity::new(raw_quantity)
            .map_err(|e| LedgerError::CorruptRow(format!("sale {id}: {e}")))?;
        let raw_status: String = row.try_get("status")?;
        let status = SaleStatus::parse(&raw_status)
            .ok_or_else(|| LedgerError::CorruptRow(format!("sale {id}: status {raw_status}")))?;
        let reason = match row.try_get::<Option<String>, _>("reason")? {
            Some(raw) => Some(FailureReason::parse(&raw).ok_or_else(|| {
                LedgerError::CorruptRow(format!("sale {id}: reason {raw}"))
            })?),
            None => None,
        };

        SaleRecord::restore(
            id,
            row.try_get::<Option<Uuid>, _>("checkout_id")?
                .map(CheckoutId::from_uuid),
            row.try_get::<Option<Uuid>, _>("product_id")?
                .map(ProductId::from_uuid),
            quantity,
            Money::from_cents(row.try_get("unit_price_cents")?),
            Money::from_cents(row.try_get("line_total_cents")?),
            BuyerId::new(row.try_get::<String, _>("buyer")?),
            status,
            reason,
            row.try_get::<DateTime<Utc>, _>("created_at")?,
        )
        .ok_or_else(|| LedgerError::CorruptRow(format!("sale {id}: reason/status mismatch")))
    }
}

#[async_trait]
impl SaleLedger for PostgresSaleLedger {
    async fn append(&self, record: SaleRecord) -> Result<SaleId> {
        let id = record.id();

        sqlx::query(
            r#"
            INSERT INTO sales (id, checkout_id, product_id, quantity, unit_price_cents,
                               line_total_cents, buyer, status, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id.as_uuid())
        .bind(record.checkout_id().map(|c| c.as_uuid()))
        .bind(record.product_id().map(|p| p.as_uuid()))
        .bind(i64::from(record.quantity().get()))
        .bind(record.unit_price().cents())
        .bind(record.line_total().cents())
        .bind(record.buyer().as_str())
        .bind(record.status().as_str())
        .bind(record.reason().map(|r| r.as_str()))
        .bind(record.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("sales_pkey")
            {
                return LedgerError::DuplicateSale(id);
            }
            LedgerError::Database(e)
        })?;

        record_append(&record);
        Ok(id)
    }

    async fn get(&self, id: SaleId) -> Result<Option<SaleRecord>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn list_by_buyer(&self, buyer: &BuyerId) -> Result<Vec<SaleRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE buyer = $1
            ORDER BY created_at DESC, seq DESC
            "#
        ))
        .bind(buyer.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<SaleRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            ORDER BY created_at DESC, seq DESC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn list_by_checkout(&self, checkout_id: CheckoutId) -> Result<Vec<SaleRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE checkout_id = $1
            ORDER BY seq ASC
            "#
        ))
        .bind(checkout_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}
