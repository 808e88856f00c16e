//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the auxiliary book of orders that could not (fully)
// rest under their traits, kept for later dispatch by the notification layer.
// Each side is a priority-sorted set walked best-first by a filtered pop.
//
// | Component          | Description                                                  |
// |--------------------|--------------------------------------------------------------|
// | Priority           | Record of an unmatched order plus its delivery endpoint      |
// | UnmatchedOrderBook | Two per-side ordered sets, unique by order id                |
//
// The ordering keys are (price, created_at, order_id): best price first
// (highest for bids, lowest for asks), then oldest, then smallest id.
//--------------------------------------------------------------------------------------------------

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, OrderId, Side};

/// Record of an order that did not rest, with the endpoint a notification
/// dispatcher would deliver to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Priority {
    pub size: Decimal,
    pub price: Decimal,
    pub order_id: OrderId,
    pub acct_id: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub ip: IpAddr,
    pub port: u16,
}

/// Internal set element carrying the side so a single ordering impl serves
/// both sets: bids rank higher prices first, asks lower, and ties fall back
/// to the oldest record and then the smallest order id. Equality follows the
/// same key, so the set contract holds.
#[derive(Debug, Clone)]
struct Ranked {
    side: Side,
    record: Priority,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_price = match self.side {
            Side::Bid => self.record.price.cmp(&other.record.price).reverse(),
            Side::Ask => self.record.price.cmp(&other.record.price),
        };
        by_price
            .then(self.record.created_at.cmp(&other.record.created_at))
            .then(self.record.order_id.cmp(&other.record.order_id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Auxiliary priority-ordered book of unmatched orders, one set per side.
///
/// Elements are unique by order id; the id index mirrors the sets so a
/// duplicate insert is refused without scanning.
#[derive(Debug, Default)]
pub struct UnmatchedOrderBook {
    bids: BTreeSet<Ranked>,
    asks: BTreeSet<Ranked>,
    index: HashMap<OrderId, Side>,
}

impl UnmatchedOrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an unmatched record on the given side.
    ///
    /// Returns false (and leaves the book untouched) when a record with the
    /// same order id is already present on either side.
    pub fn insert_unmatched(&mut self, side: Side, record: Priority) -> bool {
        if self.index.contains_key(&record.order_id) {
            return false;
        }
        self.index.insert(record.order_id, side);
        self.set_mut(side).insert(Ranked { side, record });
        true
    }

    /// Removes and returns the best-priority record on `side` for which the
    /// predicate holds, walking the set best-first.
    pub fn pop_unmatched_with_filter<F>(&mut self, side: Side, predicate: F) -> Option<Priority>
    where
        F: Fn(&Priority) -> bool,
    {
        let found = self
            .set_mut(side)
            .iter()
            .find(|ranked| predicate(&ranked.record))
            .cloned()?;
        self.set_mut(side).remove(&found);
        self.index.remove(&found.record.order_id);
        Some(found.record)
    }

    /// Number of records held on one side.
    pub fn len(&self, side: Side) -> usize {
        match side {
            Side::Bid => self.bids.len(),
            Side::Ask => self.asks.len(),
        }
    }

    /// True when neither side holds any record.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    #[inline]
    fn set_mut(&mut self, side: Side) -> &mut BTreeSet<Ranked> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn record(order_id: OrderId, price: Decimal, at_secs: i64) -> Priority {
        Priority {
            size: dec!(1),
            price,
            order_id,
            acct_id: Some(1),
            created_at: Utc.timestamp_opt(at_secs, 0).unwrap(),
            ip: "127.0.0.1".parse().unwrap(),
            port: 9000,
        }
    }

    /// Tests bids pop highest price first, asks lowest.
    #[test]
    fn test_priority_order_by_price() {
        let mut unmatched = UnmatchedOrderBook::new();
        unmatched.insert_unmatched(Side::Bid, record(1, dec!(100), 0));
        unmatched.insert_unmatched(Side::Bid, record(2, dec!(101), 0));
        unmatched.insert_unmatched(Side::Ask, record(3, dec!(105), 0));
        unmatched.insert_unmatched(Side::Ask, record(4, dec!(104), 0));

        let best_bid = unmatched.pop_unmatched_with_filter(Side::Bid, |_| true).unwrap();
        assert_eq!(best_bid.order_id, 2);
        let best_ask = unmatched.pop_unmatched_with_filter(Side::Ask, |_| true).unwrap();
        assert_eq!(best_ask.order_id, 4);
    }

    /// Tests price ties fall back to the oldest record, then the smallest id.
    #[test]
    fn test_tie_breaks() {
        let mut unmatched = UnmatchedOrderBook::new();
        unmatched.insert_unmatched(Side::Bid, record(5, dec!(100), 10));
        unmatched.insert_unmatched(Side::Bid, record(6, dec!(100), 5));
        unmatched.insert_unmatched(Side::Bid, record(4, dec!(100), 10));

        let first = unmatched.pop_unmatched_with_filter(Side::Bid, |_| true).unwrap();
        assert_eq!(first.order_id, 6); // oldest
        let second = unmatched.pop_unmatched_with_filter(Side::Bid, |_| true).unwrap();
        assert_eq!(second.order_id, 4); // same age, smaller id
        let third = unmatched.pop_unmatched_with_filter(Side::Bid, |_| true).unwrap();
        assert_eq!(third.order_id, 5);
    }

    /// Tests the filtered pop skips records the predicate refuses.
    #[test]
    fn test_filtered_pop() {
        let mut unmatched = UnmatchedOrderBook::new();
        unmatched.insert_unmatched(Side::Ask, record(1, dec!(100), 0));
        unmatched.insert_unmatched(Side::Ask, record(2, dec!(101), 0));

        let popped = unmatched
            .pop_unmatched_with_filter(Side::Ask, |p| p.price > dec!(100))
            .unwrap();
        assert_eq!(popped.order_id, 2);
        assert_eq!(unmatched.len(Side::Ask), 1);

        assert!(
            unmatched
                .pop_unmatched_with_filter(Side::Ask, |p| p.price > dec!(200))
                .is_none()
        );
    }

    /// Tests uniqueness by order id across both sides.
    #[test]
    fn test_unique_by_order_id() {
        let mut unmatched = UnmatchedOrderBook::new();
        assert!(unmatched.insert_unmatched(Side::Bid, record(1, dec!(100), 0)));
        assert!(!unmatched.insert_unmatched(Side::Bid, record(1, dec!(101), 1)));
        assert!(!unmatched.insert_unmatched(Side::Ask, record(1, dec!(99), 2)));
        assert_eq!(unmatched.len(Side::Bid), 1);
        assert_eq!(unmatched.len(Side::Ask), 0);

        // Popping frees the id for reinsertion.
        unmatched.pop_unmatched_with_filter(Side::Bid, |_| true).unwrap();
        assert!(unmatched.insert_unmatched(Side::Ask, record(1, dec!(99), 3)));
    }
}
