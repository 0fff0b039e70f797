//! # Deal Stores
//!
//! Two adapters behind the [`DealStore`] port: Postgres with true
//! `SELECT ... FOR UPDATE` row locks for production, and an in-memory
//! per-row mutex variant for tests and development mode. Both serialize
//! concurrent `check_status` calls on the same deal.

use async_trait::async_trait;
use aura_types::{CryptoCurrency, DealStatus, LockedDeal, StoreError};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tokio_postgres::error::SqlState;
use uuid::Uuid;

use super::ports::{DealLease, DealStore};

// ---------------------------------------------------------------------------
// In-memory adapter
// ---------------------------------------------------------------------------

/// In-memory deal store; rows are individually mutex-guarded.
#[derive(Default)]
pub struct MemoryDealStore {
    deals: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<LockedDeal>>>>,
    memos: Mutex<std::collections::HashSet<String>>,
}

impl MemoryDealStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

struct MemoryLease {
    guard: OwnedMutexGuard<LockedDeal>,
}

#[async_trait]
impl DealLease for MemoryLease {
    fn deal(&self) -> &LockedDeal {
        &self.guard
    }

    async fn commit(mut self: Box<Self>, deal: LockedDeal) -> Result<(), StoreError> {
        *self.guard = deal;
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl DealStore for MemoryDealStore {
    async fn insert(&self, deal: LockedDeal) -> Result<(), StoreError> {
        if !self.memos.lock().insert(deal.payment_memo.clone()) {
            return Err(StoreError::UniqueViolation("payment_memo".to_string()));
        }
        self.deals
            .lock()
            .insert(deal.id, Arc::new(tokio::sync::Mutex::new(deal)));
        Ok(())
    }

    async fn acquire(&self, id: Uuid) -> Result<Option<Box<dyn DealLease>>, StoreError> {
        let row = { self.deals.lock().get(&id).cloned() };
        match row {
            None => Ok(None),
            Some(row) => {
                let guard = row.lock_owned().await;
                Ok(Some(Box::new(MemoryLease { guard })))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Postgres adapter
// ---------------------------------------------------------------------------

/// Postgres deal store; the lease holds an open transaction with the row
/// locked `FOR UPDATE`.
pub struct PgDealStore {
    pool: Pool,
}

impl PgDealStore {
    /// Wrap an existing pool.
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

struct PgLease {
    client: deadpool_postgres::Client,
    deal: LockedDeal,
}

fn row_to_deal(row: &tokio_postgres::Row) -> Result<LockedDeal, StoreError> {
    let currency: String = row.get("currency");
    let status: String = row.get("status");
    Ok(LockedDeal {
        id: row.get("id"),
        item_id: row.get("item_id"),
        item_name: row.get("item_name"),
        final_price: row.get("final_price"),
        currency: CryptoCurrency::from_str(&currency).map_err(StoreError::Corrupt)?,
        crypto_amount: row.get("crypto_amount"),
        payment_memo: row.get("payment_memo"),
        secret_ciphertext: row.get("secret_ciphertext"),
        status: DealStatus::from_str(&status).map_err(StoreError::Corrupt)?,
        buyer_did: row.get("buyer_did"),
        tx_hash: row.get("tx_hash"),
        block: row.get("block"),
        from_address: row.get("from_address"),
        created_at: row.get::<_, DateTime<Utc>>("created_at"),
        expires_at: row.get::<_, DateTime<Utc>>("expires_at"),
        paid_at: row.get("paid_at"),
        updated_at: row.get::<_, DateTime<Utc>>("updated_at"),
    })
}

#[async_trait]
impl DealLease for PgLease {
    fn deal(&self) -> &LockedDeal {
        &self.deal
    }

    async fn commit(self: Box<Self>, deal: LockedDeal) -> Result<(), StoreError> {
        self.client
            .execute(
                "UPDATE locked_deals SET
                     status = $2, tx_hash = $3, block = $4, from_address = $5,
                     paid_at = $6, expires_at = $7, updated_at = $8
                 WHERE id = $1",
                &[
                    &deal.id,
                    &deal.status.as_str(),
                    &deal.tx_hash,
                    &deal.block,
                    &deal.from_address,
                    &deal.paid_at,
                    &deal.expires_at,
                    &deal.updated_at,
                ],
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl DealStore for PgDealStore {
    async fn insert(&self, deal: LockedDeal) -> Result<(), StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let result = client
            .execute(
                "INSERT INTO locked_deals
                     (id, item_id, item_name, final_price, currency, crypto_amount,
                      payment_memo, secret_ciphertext, status, buyer_did,
                      created_at, expires_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                &[
                    &deal.id,
                    &deal.item_id,
                    &deal.item_name,
                    &deal.final_price,
                    &deal.currency.as_str(),
                    &deal.crypto_amount,
                    &deal.payment_memo,
                    &deal.secret_ciphertext,
                    &deal.status.as_str(),
                    &deal.buyer_did,
                    &deal.created_at,
                    &deal.expires_at,
                    &deal.updated_at,
                ],
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
                    Err(StoreError::UniqueViolation("payment_memo".to_string()))
                } else {
                    Err(StoreError::Unavailable(e.to_string()))
                }
            }
        }
    }

    async fn acquire(&self, id: Uuid) -> Result<Option<Box<dyn DealLease>>, StoreError> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let row = client
            .query_opt(
                "SELECT id, item_id, item_name, final_price, currency, crypto_amount,
                        payment_memo, secret_ciphertext, status, buyer_did,
                        tx_hash, block, from_address, created_at, expires_at,
                        paid_at, updated_at
                 FROM locked_deals WHERE id = $1 FOR UPDATE",
                &[&id],
            )
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match row {
            None => {
                client
                    .batch_execute("COMMIT")
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                Ok(None)
            }
            Some(row) => {
                let deal = row_to_deal(&row)?;
                Ok(Some(Box::new(PgLease { client, deal })))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aura_types::LockedDealParams;
    use chrono::Duration;

    fn deal(memo: &str) -> LockedDeal {
        let now = Utc::now();
        LockedDeal::new(LockedDealParams {
            item_id: "hotel_alpha".into(),
            item_name: "Grand Hotel Alpha".into(),
            final_price: 900.0,
            currency: CryptoCurrency::Sol,
            crypto_amount: 9.0,
            payment_memo: memo.into(),
            secret_ciphertext: "token".into(),
            buyer_did: None,
            created_at: now,
            expires_at: now + Duration::seconds(3600),
        })
    }

    #[tokio::test]
    async fn test_memory_insert_and_acquire() {
        let store = MemoryDealStore::new();
        let d = deal("m1");
        let id = d.id;
        store.insert(d).await.unwrap();

        let lease = store.acquire(id).await.unwrap().expect("lease");
        assert_eq!(lease.deal().payment_memo, "m1");
        lease.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_memo_collision() {
        let store = MemoryDealStore::new();
        store.insert(deal("same")).await.unwrap();
        let err = store.insert(deal("same")).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_memory_acquire_missing() {
        let store = MemoryDealStore::new();
        assert!(store.acquire(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_commit_persists() {
        let store = MemoryDealStore::new();
        let d = deal("m2");
        let id = d.id;
        store.insert(d).await.unwrap();

        let lease = store.acquire(id).await.unwrap().unwrap();
        let mut updated = lease.deal().clone();
        updated.mark_expired(Utc::now());
        lease.commit(updated).await.unwrap();

        let lease = store.acquire(id).await.unwrap().unwrap();
        assert_eq!(lease.deal().status, DealStatus::Expired);
        lease.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_lease_serializes_access() {
        let store = Arc::new(MemoryDealStore::new());
        let d = deal("m3");
        let id = d.id;
        store.insert(d).await.unwrap();

        let lease = store.acquire(id).await.unwrap().unwrap();
        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.acquire(id).await.unwrap().unwrap() })
        };
        // The second acquire must block until the first lease resolves.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        lease.release().await.unwrap();
        let second = contender.await.unwrap();
        second.release().await.unwrap();
    }
}
