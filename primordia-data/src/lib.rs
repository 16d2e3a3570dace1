/// Primordia Data - Backend Access Library
///
/// Typed access to the Primordia divergence backend, shared by every dashboard front-end:
/// - Async REST client for regions, signal bundles, health, chat and the waitlist
/// - Data model matching the backend JSON contract
/// - Pure derived metrics (severity, polarity, trend, approximate sparkline)
/// - Static region → market symbol table
pub mod client;
pub mod error;
pub mod metrics;
pub mod model;
pub mod symbols;

// Re-export commonly used types for convenience
pub use client::{SignalClient, SignalClientConfig, SignalSource};
pub use error::DataError;
pub use model::{
    Alert, AlertLevel, ChatMessage, ChatReply, ChatRequest, ChatRole, Health, Region, RegionId,
    SignalBundle, WaitlistResponse,
};

pub use metrics::{Polarity, Severity, SignalView, TrendDirection};
pub use symbols::{MarketSymbol, SymbolRole, market_symbols};
