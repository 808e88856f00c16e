//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the aggregated depth view of the book: per-price levels
// with volume and order count, captured into an immutable snapshot.
//
// | Component      | Description                                               |
// |----------------|-----------------------------------------------------------|
// | DepthLevel     | Aggregated (price, volume, order count) at one level      |
// | DepthSnapshot  | Immutable point-in-time view of both sides                |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents an aggregated price level in the depth view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthLevel {
    /// The price for this level.
    pub price: Decimal,
    /// Total volume at this price level.
    pub volume: Decimal,
    /// Number of orders at this price level.
    pub order_count: usize,
}

impl DepthLevel {
    #[inline]
    pub fn new(price: Decimal, volume: Decimal, order_count: usize) -> Self {
        Self {
            price,
            volume,
            order_count,
        }
    }
}

/// An immutable snapshot of order book depth at a specific point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthSnapshot {
    /// Bid price levels ordered by price descending (best bids first).
    pub bids: Vec<DepthLevel>,
    /// Ask price levels ordered by price ascending (best asks first).
    pub asks: Vec<DepthLevel>,
    /// Timestamp when this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl DepthSnapshot {
    /// Creates a new depth snapshot stamped with the current time.
    #[inline]
    pub fn new(bids: Vec<DepthLevel>, asks: Vec<DepthLevel>) -> Self {
        Self {
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }

    /// Returns the best bid price if available.
    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    /// Returns the best ask price if available.
    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }

    /// Returns the current spread (best ask - best bid).
    #[inline]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_ask(), self.best_bid()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }
}
