//! Cross-crate integration flows.

pub mod market_flows;
pub mod negotiation_flows;
pub mod signing;
