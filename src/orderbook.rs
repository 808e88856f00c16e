//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the order book for a single trading instrument. It
// composes the two price-sorted sides with the account index, validates every
// submission, and exposes the submit / cancel / query surface. Execution
// itself lives in the matching engine module.
//
// | Component     | Description                                                               |
// |--------------|---------------------------------------------------------------------------|
// | OrderBook    | bid side + ask side + account index + live-id map                         |
// | OrderbookError | Validation and lookup errors surfaced to the caller                     |
//
//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                        | Description                               | Return Type        |
// |-----------------------------|-------------------------------------------|--------------------|
// | submit_limit_order          | Validate and execute a limit order        | Result<LimitResult>|
// | submit_market_order         | Execute a market order by size            | Result<MarketResult>|
// | submit_market_order_by_funds| Execute a market order by quote funds     | Result<FundsResult>|
// | cancel_order                | Remove a resting order by (id, side, price)| Result<Order>     |
// | clear_book                  | Drain both sides                          | Vec<Order>         |
// | book_depth_info             | Aggregated per-level view                 | DepthSnapshot      |
// | get_account                 | Resolve an account's resting orders       | Vec<&Order>        |
//--------------------------------------------------------------------------------------------------

use std::collections::HashMap;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::accounts::{AccountIndex, OrderHandle};
use crate::book_side::OneSidedBook;
use crate::depth::{DepthLevel, DepthSnapshot};
use crate::matching_engine::{FundsResult, LimitResult, MarketResult};
use crate::types::{AccountId, Order, OrderId, OrderTraits, Side};

/// First id of the internal sequence used for market-order takers. Caller ids
/// live below it, so fill records never collide.
pub(crate) const MARKET_TAKER_ID_BASE: OrderId = 1 << 63;

/// Errors that can occur during order book operations. Submissions never
/// partially apply on error: the input is rejected before execution begins.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrderbookError {
    /// The order id already exists somewhere on the book.
    #[error("order id {0} already exists on the book")]
    DuplicateOrderId(OrderId),

    /// The cancel target is absent from the addressed queue.
    #[error("order {0} not found on the book")]
    UnknownOrder(OrderId),

    /// Prices must be strictly positive.
    #[error("invalid price: {0}")]
    InvalidPrice(Decimal),

    /// Sizes (and funds) must be strictly positive.
    #[error("invalid size: {0}")]
    InvalidSize(Decimal),

    /// The cancel addressed the wrong side for this order id.
    #[error("order {order_id} rests on the {actual:?} side, not {requested:?}")]
    SideMismatch {
        order_id: OrderId,
        requested: Side,
        actual: Side,
    },

    /// The order's execution traits could not be honored (e.g. a fill-or-kill
    /// submit against insufficient liquidity, reported by callers that treat
    /// the kill as an error).
    #[error("order {0} violates its execution traits")]
    TraitViolation(OrderId),
}

/// The order book: two price-sorted sides, the account index, and a live-id
/// map for duplicate detection and side validation.
///
/// Every operation is a synchronous, atomic transaction against the book;
/// callers wanting concurrency serialize through one owning thread (see the
/// worker module).
#[derive(Debug)]
pub struct OrderBook {
    /// Buy side, best price = maximum.
    pub(crate) bids: OneSidedBook,
    /// Sell side, best price = minimum.
    pub(crate) asks: OneSidedBook,
    /// Per-account handles of resting orders.
    pub(crate) accounts: AccountIndex,
    /// Location of every resting order, keyed by id.
    pub(crate) order_map: HashMap<OrderId, OrderHandle>,
    /// Internal id sequence for market-order takers.
    pub(crate) next_taker_id: OrderId,
}

impl OrderBook {
    /// Creates a new empty order book.
    pub fn new() -> Self {
        Self {
            bids: OneSidedBook::new(Side::Bid),
            asks: OneSidedBook::new(Side::Ask),
            accounts: AccountIndex::new(),
            order_map: HashMap::new(),
            next_taker_id: MARKET_TAKER_ID_BASE,
        }
    }

    /// Submits a limit order.
    ///
    /// The order is validated, matched against the opposite side under
    /// price-time priority as far as its traits allow, and any residual rests
    /// on its own side when the traits permit.
    ///
    /// # Arguments
    /// * `side` - Side of the incoming order
    /// * `size` - Order size, strictly positive
    /// * `price` - Limit price, strictly positive
    /// * `order_id` - Caller-chosen id, unique for the book's lifetime
    /// * `traits` - Execution flags
    /// * `acct_id` - Optional owning account
    ///
    /// # Errors
    /// `InvalidPrice`, `InvalidSize`, or `DuplicateOrderId`; in each case the
    /// book is untouched.
    pub fn submit_limit_order(
        &mut self,
        side: Side,
        size: Decimal,
        price: Decimal,
        order_id: OrderId,
        traits: OrderTraits,
        acct_id: Option<AccountId>,
    ) -> Result<LimitResult, OrderbookError> {
        if price <= Decimal::ZERO {
            return Err(OrderbookError::InvalidPrice(price));
        }
        if size <= Decimal::ZERO {
            return Err(OrderbookError::InvalidSize(size));
        }
        if self.order_map.contains_key(&order_id) {
            return Err(OrderbookError::DuplicateOrderId(order_id));
        }

        let incoming = Order::new(order_id, acct_id, side, price, size, traits);
        Ok(self.execute_limit_order(incoming))
    }

    /// Submits a market order by size: an unbounded-price walk of the opposite
    /// side that never rests. Returns the fills and whatever size found no
    /// counterparty.
    pub fn submit_market_order(
        &mut self,
        side: Side,
        size: Decimal,
        acct_id: Option<AccountId>,
    ) -> Result<MarketResult, OrderbookError> {
        if size <= Decimal::ZERO {
            return Err(OrderbookError::InvalidSize(size));
        }
        let taker_id = self.allocate_taker_id();
        Ok(self.execute_market_order(taker_id, side, size, acct_id))
    }

    /// Submits a market order by quote funds: the walk buys (or sells) as much
    /// size as the funds afford at each level, rounded down to the book's size
    /// quantum, and returns the unspent funds.
    pub fn submit_market_order_by_funds(
        &mut self,
        side: Side,
        funds: Decimal,
        acct_id: Option<AccountId>,
    ) -> Result<FundsResult, OrderbookError> {
        if funds <= Decimal::ZERO {
            return Err(OrderbookError::InvalidSize(funds));
        }
        let taker_id = self.allocate_taker_id();
        Ok(self.execute_market_order_by_funds(taker_id, side, funds, acct_id))
    }

    /// Cancels a resting order.
    ///
    /// Side and price are required because the book is addressed by price
    /// level; the live-id map is only consulted to report a mismatched side.
    ///
    /// # Errors
    /// * `SideMismatch` - The id rests on the other side
    /// * `UnknownOrder` - No such order at the addressed queue (cancels are
    ///   idempotent in effect: a second cancel reports this)
    pub fn cancel_order(
        &mut self,
        order_id: OrderId,
        side: Side,
        price: Decimal,
        acct_id: Option<AccountId>,
    ) -> Result<Order, OrderbookError> {
        match self.side_book_mut(side).remove(price, order_id) {
            Some(order) => {
                self.order_map.remove(&order_id);
                if let Some(owner) = order.acct_id {
                    self.accounts.unregister(owner, order_id);
                }
                debug!(order_id, ?side, %price, ?acct_id, "cancelled order");
                Ok(order)
            }
            None => match self.order_map.get(&order_id) {
                Some(handle) if handle.side != side => Err(OrderbookError::SideMismatch {
                    order_id,
                    requested: side,
                    actual: handle.side,
                }),
                _ => Err(OrderbookError::UnknownOrder(order_id)),
            },
        }
    }

    /// Drains every resting order off both sides and returns them (bids from
    /// best first, then asks from best).
    pub fn clear_book(&mut self) -> Vec<Order> {
        let mut removed = self.bids.clear();
        removed.extend(self.asks.clear());
        self.accounts.clear();
        self.order_map.clear();
        removed
    }

    /// Returns the best bid and ask prices.
    pub fn best_bid_ask(&self) -> (Option<Decimal>, Option<Decimal>) {
        (self.bids.best_price(), self.asks.best_price())
    }

    /// Returns the total resting volume per side.
    pub fn volume_bid_ask(&self) -> (Decimal, Decimal) {
        (self.bids.total_volume(), self.asks.total_volume())
    }

    /// Returns the number of resting orders per side.
    pub fn n_orders_bid_ask(&self) -> (usize, usize) {
        (self.bids.num_orders(), self.asks.num_orders())
    }

    /// Returns the spread between the best ask and the best bid.
    pub fn spread(&self) -> Option<Decimal> {
        match (self.asks.best_price(), self.bids.best_price()) {
            (Some(ask), Some(bid)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Builds the aggregated depth view, at most `levels` levels per side,
    /// best prices first.
    pub fn book_depth_info(&self, levels: usize) -> DepthSnapshot {
        let collect = |side: &OneSidedBook| {
            side.iter_from_best()
                .take(levels)
                .map(|(price, queue)| DepthLevel::new(*price, queue.total_volume(), queue.num_orders()))
                .collect()
        };
        DepthSnapshot::new(collect(&self.bids), collect(&self.asks))
    }

    /// Resolves the account's resting orders, ordered by order id.
    ///
    /// The account index stores handles only; each handle is resolved against
    /// the owning side here, so there is never a second copy of order state.
    pub fn get_account(&self, acct_id: AccountId) -> Vec<&Order> {
        self.accounts
            .handles(acct_id)
            .into_iter()
            .filter_map(|handle| self.resolve(&handle))
            .collect()
    }

    /// Iterates every resting order: bids from the best price down, then asks
    /// from the best price up, FIFO within each level.
    pub fn resting_orders(&self) -> impl Iterator<Item = &Order> {
        self.bids
            .iter_from_best()
            .flat_map(|(_, q)| q.iter())
            .chain(self.asks.iter_from_best().flat_map(|(_, q)| q.iter()))
    }

    /// Resolves a handle to the live resting order.
    pub(crate) fn resolve(&self, handle: &OrderHandle) -> Option<&Order> {
        self.side_book(handle.side).get(handle.price, handle.order_id)
    }

    #[inline]
    pub(crate) fn side_book(&self, side: Side) -> &OneSidedBook {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    #[inline]
    pub(crate) fn side_book_mut(&mut self, side: Side) -> &mut OneSidedBook {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }

    #[inline]
    fn allocate_taker_id(&mut self) -> OrderId {
        let id = self.next_taker_id;
        self.next_taker_id += 1;
        id
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
