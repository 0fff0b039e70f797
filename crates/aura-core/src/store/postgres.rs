//! # Postgres Item Store
//!
//! Production adapter over deadpool-postgres with pgvector search, plus the
//! plain-SQL startup migrations for both tables this service owns.

use async_trait::async_trait;
use aura_types::{Item, ItemMeta, SearchHit, StoreError};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use std::str::FromStr;
use tokio_postgres::NoTls;

use super::{description_snippet, ItemStore};

/// Build a connection pool from a Postgres DSN.
pub fn connect_pool(dsn: &str, pool_size: usize) -> Result<Pool, StoreError> {
    let pg_config = tokio_postgres::Config::from_str(dsn)
        .map_err(|e| StoreError::Unavailable(format!("invalid database url: {e}")))?;
    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    Pool::builder(manager)
        .max_size(pool_size)
        .build()
        .map_err(|e| StoreError::Unavailable(e.to_string()))
}

/// Create tables and indexes if they do not exist yet.
///
/// Idempotent; safe to run on every startup.
pub async fn run_migrations(pool: &Pool, vector_dimension: usize) -> Result<(), StoreError> {
    let client = pool
        .get()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    let ddl = format!(
        r#"
        CREATE EXTENSION IF NOT EXISTS vector;

        CREATE TABLE IF NOT EXISTS inventory_items (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            base_price  DOUBLE PRECISION NOT NULL,
            floor_price DOUBLE PRECISION NOT NULL,
            is_active   BOOLEAN NOT NULL DEFAULT TRUE,
            meta        JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            embedding   vector({vector_dimension})
        );

        CREATE TABLE IF NOT EXISTS locked_deals (
            id                UUID PRIMARY KEY,
            item_id           TEXT NOT NULL,
            item_name         TEXT NOT NULL,
            final_price       DOUBLE PRECISION NOT NULL,
            currency          TEXT NOT NULL,
            crypto_amount     DOUBLE PRECISION NOT NULL,
            payment_memo      TEXT NOT NULL,
            secret_ciphertext TEXT NOT NULL,
            status            TEXT NOT NULL,
            buyer_did         TEXT,
            tx_hash           TEXT,
            block             TEXT,
            from_address      TEXT,
            created_at        TIMESTAMPTZ NOT NULL,
            expires_at        TIMESTAMPTZ NOT NULL,
            paid_at           TIMESTAMPTZ,
            updated_at        TIMESTAMPTZ NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ix_locked_deals_payment_memo
            ON locked_deals (payment_memo);
        CREATE INDEX IF NOT EXISTS ix_locked_deals_status
            ON locked_deals (status);
        CREATE INDEX IF NOT EXISTS ix_locked_deals_expires_at
            ON locked_deals (expires_at);
        CREATE INDEX IF NOT EXISTS ix_locked_deals_item_id
            ON locked_deals (item_id);
        CREATE INDEX IF NOT EXISTS ix_locked_deals_buyer_did
            ON locked_deals (buyer_did);
        "#
    );

    client
        .batch_execute(&ddl)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    tracing::info!(vector_dimension, "migrations_applied");
    Ok(())
}

/// Liveness probe used by the gRPC health service.
pub async fn select_one(pool: &Pool) -> Result<(), StoreError> {
    let client = pool
        .get()
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    Ok(())
}

/// Postgres-backed item repository.
pub struct PgItemStore {
    pool: Pool,
}

impl PgItemStore {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &tokio_postgres::Row) -> Result<Item, StoreError> {
        let meta_json: serde_json::Value = row.get("meta");
        let meta: ItemMeta = serde_json::from_value(meta_json)
            .map_err(|e| StoreError::Corrupt(format!("item meta: {e}")))?;
        let embedding: Option<pgvector::Vector> = row.get("embedding");
        Ok(Item {
            id: row.get("id"),
            name: row.get("name"),
            base_price: row.get("base_price"),
            floor_price: row.get("floor_price"),
            active: row.get("is_active"),
            meta,
            embedding: embedding.map(|v| v.to_vec()),
        })
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn get(&self, item_id: &str) -> Result<Option<Item>, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let row = client
            .query_opt(
                "SELECT id, name, base_price, floor_price, is_active, meta, embedding
                 FROM inventory_items WHERE id = $1",
                &[&item_id],
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn upsert(&self, item: Item) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let meta = serde_json::to_value(&item.meta)
            .map_err(|e| StoreError::Corrupt(format!("item meta: {e}")))?;
        let embedding = item.embedding.clone().map(pgvector::Vector::from);
        client
            .execute(
                "INSERT INTO inventory_items (id, name, base_price, floor_price, is_active, meta, embedding)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (id) DO UPDATE SET
                     name = EXCLUDED.name,
                     base_price = EXCLUDED.base_price,
                     floor_price = EXCLUDED.floor_price,
                     is_active = EXCLUDED.is_active,
                     meta = EXCLUDED.meta,
                     embedding = EXCLUDED.embedding",
                &[
                    &item.id,
                    &item.name,
                    &item.base_price,
                    &item.floor_price,
                    &item.active,
                    &meta,
                    &embedding,
                ],
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: Option<f64>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let vector = pgvector::Vector::from(query.to_vec());
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = client
            .query(
                "SELECT id, name, base_price, floor_price, is_active, meta, embedding,
                        1 - (embedding <=> $1) AS similarity
                 FROM inventory_items
                 WHERE is_active AND embedding IS NOT NULL
                 ORDER BY embedding <=> $1
                 LIMIT $2",
                &[&vector, &limit],
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let similarity: f64 = row.get("similarity");
            if let Some(min) = min_similarity {
                if similarity < min {
                    continue;
                }
            }
            let item = Self::row_to_item(row)?;
            hits.push(SearchHit {
                item_id: item.id.clone(),
                name: item.name.clone(),
                base_price: item.base_price,
                similarity,
                snippet: description_snippet(&item),
            });
        }
        Ok(hits)
    }
}
