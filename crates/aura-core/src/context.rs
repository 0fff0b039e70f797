//! # Application Context
//!
//! Construction-time wiring for the core service. Everything a request
//! handler needs hangs off one explicitly-built [`AppContext`]; there are
//! no module-level singletons.
//!
//! The metabolism itself is installed late: the gRPC server starts
//! accepting connections while the reasoner loads, and until
//! [`AppContext::set_metabolism`] runs, negotiation returns UNAVAILABLE
//! and readiness stays red.

use aura_bus::InMemoryEventBus;
use aura_crypto::SecretBox;
use aura_types::CryptoCurrency;
use deadpool_postgres::Pool;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tracing::info;

use crate::config::Settings;
use crate::embeddings::EmbeddingClient;
use crate::error::CoreError;
use crate::hive::{
    HiveAggregator, HiveConnector, HiveEmitter, Membrane, MetabolicLoop, Reasoner, TelemetryCache,
};
use crate::hive::connector::CryptoLock;
use crate::market::{
    MarketService, MemoryDealStore, PgDealStore, PriceConverter, SolanaProvider,
};
use crate::store::{postgres, ItemStore, MemoryItemStore};

/// Shared state for the core service.
pub struct AppContext {
    settings: Settings,
    items: Arc<dyn ItemStore>,
    telemetry: Arc<TelemetryCache>,
    bus: Arc<InMemoryEventBus>,
    embeddings: EmbeddingClient,
    market: Option<Arc<MarketService>>,
    pool: Option<Pool>,
    metabolism: RwLock<Option<Arc<MetabolicLoop>>>,
    workers: Arc<Semaphore>,
}

impl AppContext {
    /// Build stores, market, and supporting clients from settings.
    ///
    /// Connects to Postgres and applies migrations unless the memory DSN is
    /// configured. Does NOT build the metabolism; see [`install_metabolism`].
    ///
    /// [`install_metabolism`]: AppContext::install_metabolism
    pub async fn initialize(settings: Settings) -> Result<Arc<Self>, CoreError> {
        settings.validate()?;

        let (items, pool): (Arc<dyn ItemStore>, Option<Pool>) = if settings.uses_memory_store() {
            info!(event = "store_selected", kind = "memory", "running without a database");
            (Arc::new(MemoryItemStore::new()), None)
        } else {
            let pool = postgres::connect_pool(&settings.database.url, settings.database.pool_size)?;
            postgres::run_migrations(&pool, settings.database.vector_dimension).await?;
            (Arc::new(postgres::PgItemStore::new(pool.clone())), Some(pool))
        };

        let market = if settings.crypto.enabled {
            let provider = Arc::new(
                SolanaProvider::new(
                    &settings.crypto.solana_private_key,
                    &settings.crypto.solana_rpc_url,
                    &settings.crypto.solana_network,
                    &settings.crypto.solana_usdc_mint,
                )
                .map_err(|e| CoreError::Config(e.to_string()))?,
            );
            let store: Arc<dyn crate::market::DealStore> = match &pool {
                Some(pool) => Arc::new(PgDealStore::new(pool.clone())),
                None => Arc::new(MemoryDealStore::new()),
            };
            let secrets = SecretBox::new(&settings.crypto.secret_encryption_key)
                .map_err(|e| CoreError::Config(e.to_string()))?;
            Some(Arc::new(MarketService::new(provider, store, secrets)))
        } else {
            None
        };

        let workers = Arc::new(Semaphore::new(settings.server.grpc_max_workers.max(1)));
        let telemetry = Arc::new(TelemetryCache::new(&settings.server.prometheus_url));
        let embeddings = EmbeddingClient::new(&settings.llm.api_base, &settings.llm.api_key);

        Ok(Arc::new(Self {
            items,
            telemetry,
            bus: Arc::new(InMemoryEventBus::new()),
            embeddings,
            market,
            pool,
            metabolism: RwLock::new(None),
            workers,
            settings,
        }))
    }

    /// Assemble the pipeline and flip the service ready.
    ///
    /// The reasoner load may read a compiled artifact from disk, which is
    /// why this runs after the server is already accepting health checks.
    pub async fn install_metabolism(self: &Arc<Self>) -> Result<(), CoreError> {
        let settings = &self.settings;
        let reasoner = Reasoner::from_settings(&settings.llm, &settings.logic).await;

        let connector = match (&self.market, settings.crypto.enabled) {
            (Some(market), true) => HiveConnector::with_crypto(CryptoLock {
                market: Arc::clone(market),
                converter: PriceConverter::new(settings.crypto.sol_usd_rate),
                currency: settings
                    .crypto
                    .parsed_currency()
                    .unwrap_or(CryptoCurrency::Sol),
                ttl_seconds: settings.crypto.deal_ttl_seconds,
            }),
            _ => HiveConnector::new(),
        };

        let metabolism = MetabolicLoop::new(
            HiveAggregator::new(Arc::clone(&self.items), Arc::clone(&self.telemetry)),
            reasoner,
            Membrane::new(&settings.logic),
            connector,
            Arc::new(HiveEmitter::new(self.bus.clone())),
        );

        *self.metabolism.write() = Some(Arc::new(metabolism));
        info!(event = "metabolism_ready", "pipeline installed; service ready");
        Ok(())
    }

    /// The installed pipeline; `None` while still initializing.
    pub fn metabolism(&self) -> Option<Arc<MetabolicLoop>> {
        self.metabolism.read().clone()
    }

    /// Whether the pipeline is installed.
    pub fn is_ready(&self) -> bool {
        self.metabolism.read().is_some()
    }

    /// Claim a worker slot; `Err` means the budget is exhausted.
    pub fn try_acquire_worker(&self) -> Result<OwnedSemaphorePermit, TryAcquireError> {
        Arc::clone(&self.workers).try_acquire_owned()
    }

    /// The loaded settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Item repository.
    pub fn items(&self) -> &Arc<dyn ItemStore> {
        &self.items
    }

    /// Telemetry cache.
    pub fn telemetry(&self) -> &Arc<TelemetryCache> {
        &self.telemetry
    }

    /// Event bus (consumers subscribe here).
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    /// Embeddings client.
    pub fn embeddings(&self) -> &EmbeddingClient {
        &self.embeddings
    }

    /// Market, when crypto-lock mode is enabled.
    pub fn market(&self) -> Option<&Arc<MarketService>> {
        self.market.as_ref()
    }

    /// Database pool, when Postgres is configured.
    pub fn pool(&self) -> Option<&Pool> {
        self.pool.as_ref()
    }
}
