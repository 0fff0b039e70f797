//! Shared fixtures for the integration suite.

use aura_bus::InMemoryEventBus;
use aura_core::config::{LlmSettings, LogicSettings};
use aura_core::hive::connector::CryptoLock;
use aura_core::hive::{
    HiveAggregator, HiveConnector, HiveEmitter, Membrane, MetabolicLoop, NegotiateSignal,
    Reasoner, TelemetryCache,
};
use aura_core::market::{
    MarketService, MemoryDealStore, MockChainProvider, PriceConverter,
};
use aura_core::store::MemoryItemStore;
use aura_crypto::SecretBox;
use aura_types::{CryptoCurrency, Item, ItemMeta, ValueAdd};
use axum::routing::post;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;

/// The canonical demo item used across scenarios.
pub fn hotel_alpha() -> Item {
    Item {
        id: "hotel_alpha".into(),
        name: "Grand Hotel Alpha (Luxury)".into(),
        base_price: 1000.0,
        floor_price: 800.0,
        active: true,
        meta: ItemMeta {
            internal_cost: Some(600.0),
            occupancy: None,
            value_add_inventory: vec![ValueAdd {
                item: "Late checkout".into(),
                internal_cost: 0.0,
                perceived_value: 40.0,
            }],
            extra: Default::default(),
        },
        embedding: Some(vec![1.0, 0.0, 0.0]),
    }
}

/// A signal with the standard test identity.
pub fn signal(bid: f64, item_id: &str) -> NegotiateSignal {
    NegotiateSignal {
        item_id: item_id.into(),
        bid_amount: bid,
        agent_did: "did:key:ab".into(),
        reputation: 1.0,
        request_id: "req-e2e".into(),
    }
}

/// Pipeline wired with the rule reasoner over an in-memory catalog.
pub async fn rule_pipeline() -> MetabolicLoop {
    pipeline(Reasoner::from_settings(&LlmSettings::default(), &LogicSettings::default()).await, None)
}

/// Pipeline wired with a structured reasoner pointed at a stub LLM that
/// always answers with `decision`.
pub async fn scripted_pipeline(decision: serde_json::Value) -> MetabolicLoop {
    let api_base = spawn_llm_stub(decision).await;
    let mut llm = LlmSettings::default();
    llm.model = "mistral/mistral-large-latest".into();
    llm.api_base = api_base;
    pipeline(
        Reasoner::from_settings(&llm, &LogicSettings::default()).await,
        None,
    )
}

/// Crypto-enabled pipeline plus handles to the market and chain mock.
pub async fn crypto_pipeline() -> (MetabolicLoop, Arc<MarketService>, Arc<MockChainProvider>) {
    let provider = Arc::new(MockChainProvider::new("Wallet111", "devnet"));
    let market = Arc::new(MarketService::new(
        provider.clone(),
        Arc::new(MemoryDealStore::new()),
        SecretBox::new(&SecretBox::generate_key()).unwrap(),
    ));
    let reasoner =
        Reasoner::from_settings(&LlmSettings::default(), &LogicSettings::default()).await;
    let lock = CryptoLock {
        market: Arc::clone(&market),
        converter: PriceConverter::new(100.0),
        currency: CryptoCurrency::Sol,
        ttl_seconds: 3600,
    };
    (pipeline(reasoner, Some(lock)), market, provider)
}

fn pipeline(reasoner: Reasoner, crypto: Option<CryptoLock>) -> MetabolicLoop {
    let items = Arc::new(MemoryItemStore::with_items(vec![hotel_alpha()]));
    let telemetry = Arc::new(TelemetryCache::new("http://127.0.0.1:1"));
    let logic = LogicSettings::default();
    let connector = match crypto {
        Some(lock) => HiveConnector::with_crypto(lock),
        None => HiveConnector::new(),
    };
    MetabolicLoop::new(
        HiveAggregator::new(items, telemetry),
        reasoner,
        Membrane::new(&logic),
        connector,
        Arc::new(HiveEmitter::new(Arc::new(InMemoryEventBus::new()))),
    )
}

/// Spin up a chat-completions stub that always answers with `decision`
/// rendered as the completion content. Returns the API base URL.
pub async fn spawn_llm_stub(decision: serde_json::Value) -> String {
    let content = decision.to_string();
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let content = content.clone();
            async move {
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }))
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
