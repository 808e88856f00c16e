// Expose the modules
pub mod accounts;
pub mod book_side;
pub mod config;
pub mod depth;
pub mod matching_engine;
pub mod orderbook;
pub mod queue;
pub mod replay;
pub mod snapshot;
pub mod types;
pub mod unmatched;
pub mod worker;

// Re-export key types for easier usage
pub use depth::{DepthLevel, DepthSnapshot};
pub use matching_engine::{FundsResult, LimitResult, MarketResult};
pub use orderbook::{OrderBook, OrderbookError};
pub use types::{FOK, Fill, IOC, Order, OrderTraits, Side, VANILLA};
pub use unmatched::{Priority, UnmatchedOrderBook};
pub use worker::{BookClient, WorkerError};
