use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, ProductId, Quantity};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::product::normalize_name;
use crate::store::{InventoryStore, Reservation, record_reservation};
use crate::{InventoryError, NewProduct, Product, Result};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_cents, quantity, category, image, created_at";

/// PostgreSQL-backed inventory store.
///
/// Reservations are a single guarded `UPDATE ... WHERE quantity >= $2`, so the
/// database row lock is what serializes concurrent decrements.
#[derive(Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
}

impl PostgresInventoryStore {
    /// Creates a new PostgreSQL inventory store.
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

    fn row_to_product(row: PgRow) -> Result<Product> {
        let raw_quantity: i64 = row.try_get("quantity")?;
        let quantity = u32::try_from(raw_quantity)
            .map_err(|_| InventoryError::CorruptRow(format!("quantity {raw_quantity}")))?;

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            unit_price: Money::from_cents(row.try_get("price_cents")?),
            quantity,
            category: row.try_get("category")?,
            image: row.try_get("image")?,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        })
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    async fn try_reserve(&self, id: ProductId, quantity: Quantity) -> Result<Reservation> {
        let requested = i64::from(quantity.get());

        let updated: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE products
            SET quantity = quantity - $2, updated_at = now()
            WHERE id = $1 AND quantity >= $2
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(requested)
        .fetch_optional(&self.pool)
        .await?;

        let outcome = match updated {
            Some(row) => Reservation::Reserved(Self::row_to_product(row)?),
            None => {
                // Nothing was written; only tell the two rejection cases apart.
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
                        .bind(id.as_uuid())
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Reservation::InsufficientStock
                } else {
                    Reservation::NotFound
                }
            }
        };

        record_reservation(id, quantity, &outcome);
        Ok(outcome)
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Product>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE lower(btrim(name, E' \t\r\n')) = $1
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            "#
        ))
        .bind(normalize_name(name))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let uuids: Vec<Uuid> = ids.iter().map(ProductId::as_uuid).collect();

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn insert(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;
        let product = product.into_product(Utc::now());

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, price_cents, quantity, category, image, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price.cents())
        .bind(i64::from(product.quantity))
        .bind(&product.category)
        .bind(&product.image)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }
}
