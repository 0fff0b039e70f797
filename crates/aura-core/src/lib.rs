//! # Aura Core
//!
//! The negotiation metabolism: one bid in, one guarded decision out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        AURA CORE (gRPC)                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Signal ─▶ Membrane(in) ─▶ Aggregator ─▶ Reasoner ─▶           │
//! │            Membrane(out) ─▶ Connector ─▶ Emitter               │
//! │                                 │                               │
//! │                                 ▼ (accept + crypto)             │
//! │                             Market ──▶ CryptoProvider           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline is acyclic: the market is invoked only by the connector,
//! the emitter only by the orchestrator, and no component holds a back
//! edge. All wiring happens once, at construction time, in [`AppContext`].

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod embeddings;
pub mod error;
pub mod hive;
pub mod market;
pub mod rpc;
pub mod store;

pub use config::Settings;
pub use context::AppContext;
pub use error::CoreError;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
