//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements one side of the order book: a price-indexed ordered
// map of FIFO queues, with cached aggregates and a cached best price.
//
// | Component     | Description                                                               |
// |--------------|---------------------------------------------------------------------------|
// | OneSidedBook | BTreeMap of OrderQueue keyed by price, best-price and volume caches       |
// | LevelIter    | Unifies ascending (asks) and descending (bids) traversal from the best    |
//
// The caches are derived views. They are updated in O(1) on every mutation and
// the best price is recomputed from the map extremum only after an empty level
// has been erased.
//--------------------------------------------------------------------------------------------------

use std::collections::BTreeMap;
use std::collections::btree_map;

use rust_decimal::Decimal;
use tracing::debug;

use crate::queue::OrderQueue;
use crate::types::{Order, OrderId, Side};

/// One price-sorted side of the book.
///
/// For bids the best price is the maximum; for asks it is the minimum. The
/// side tag fixes the traversal direction and crossing test once, so callers
/// never branch on side at every step.
#[derive(Debug)]
pub struct OneSidedBook {
    /// Which side of the book this is.
    side: Side,
    /// Price levels in ascending key order.
    levels: BTreeMap<Decimal, OrderQueue>,
    /// Cache of the side's best price (map extremum), None when empty.
    best_price: Option<Decimal>,
    /// Total size across all levels.
    total_volume: Decimal,
    /// Total `price * size` across all levels.
    total_volume_funds: Decimal,
    /// Total number of resting orders across all levels.
    num_orders: usize,
}

/// Internal enum to unify forward and reverse level iteration.
///
/// Asks traverse ascending (lowest price first); bids traverse descending
/// (highest price first).
enum LevelIter<'a> {
    Asc(btree_map::Iter<'a, Decimal, OrderQueue>),
    Desc(std::iter::Rev<btree_map::Iter<'a, Decimal, OrderQueue>>),
}

impl<'a> Iterator for LevelIter<'a> {
    type Item = (&'a Decimal, &'a OrderQueue);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            LevelIter::Asc(iter) => iter.next(),
            LevelIter::Desc(iter) => iter.next(),
        }
    }
}

impl OneSidedBook {
    /// Creates an empty side.
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
            best_price: None,
            total_volume: Decimal::ZERO,
            total_volume_funds: Decimal::ZERO,
            num_orders: 0,
        }
    }

    /// Which side of the book this is.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Inserts an order at the back of the queue for its price, creating the
    /// level if needed, and updates the caches.
    pub fn insert(&mut self, order: Order) {
        let price = order.price;
        self.total_volume += order.size;
        self.total_volume_funds += order.price * order.size;
        self.num_orders += 1;

        self.levels
            .entry(price)
            .or_insert_with(|| OrderQueue::new(price))
            .push_back(order);

        // Update the best price only if the new level surpasses it.
        if self.best_price.map_or(true, |best| self.is_better(price, best)) {
            self.best_price = Some(price);
        }
    }

    /// Returns an order to the *front* of the queue for its price, recreating
    /// the level if it was just erased.
    ///
    /// Used by the matching walk to put a partially consumed queue head back
    /// in place with its time priority intact.
    pub fn insert_front(&mut self, order: Order) {
        let price = order.price;
        self.total_volume += order.size;
        self.total_volume_funds += order.price * order.size;
        self.num_orders += 1;

        self.levels
            .entry(price)
            .or_insert_with(|| OrderQueue::new(price))
            .push_front(order);

        if self.best_price.map_or(true, |best| self.is_better(price, best)) {
            self.best_price = Some(price);
        }
    }

    /// Removes the order with the given id from the queue at `price`.
    ///
    /// Returns the removed order, or None if no such queue or id exists. An
    /// emptied level is erased before the best price is recomputed.
    pub fn remove(&mut self, price: Decimal, order_id: OrderId) -> Option<Order> {
        let queue = self.levels.get_mut(&price)?;
        let order = queue.pop_by_id(order_id)?;

        self.total_volume -= order.size;
        self.total_volume_funds -= order.price * order.size;
        self.num_orders -= 1;

        if queue.is_empty() {
            self.levels.remove(&price);
            debug!(side = ?self.side, %price, "erased empty price level");
            if self.best_price == Some(price) {
                self.recompute_best();
            }
        }
        Some(order)
    }

    /// Removes and returns the head order of the best queue.
    ///
    /// An emptied level is erased and the best price recomputed before
    /// returning.
    pub fn pop_best(&mut self) -> Option<Order> {
        let price = self.best_price?;
        let queue = self.levels.get_mut(&price)?;
        let order = queue.pop_front()?;

        self.total_volume -= order.size;
        self.total_volume_funds -= order.price * order.size;
        self.num_orders -= 1;

        if queue.is_empty() {
            self.levels.remove(&price);
            self.recompute_best();
        }
        Some(order)
    }

    /// Returns the head order of the best queue without removing it.
    pub fn peek_best(&self) -> Option<&Order> {
        let price = self.best_price?;
        self.levels.get(&price).and_then(|q| q.peek_front())
    }

    /// Finds a resting order by its price level and id.
    pub fn get(&self, price: Decimal, order_id: OrderId) -> Option<&Order> {
        self.levels.get(&price).and_then(|q| q.get(order_id))
    }

    /// Returns the queue at a given price, if any.
    pub fn queue_at(&self, price: Decimal) -> Option<&OrderQueue> {
        self.levels.get(&price)
    }

    /// Returns the total volume resting at a given price, if any.
    pub fn volume_at_price(&self, price: Decimal) -> Option<Decimal> {
        self.levels.get(&price).map(|q| q.total_volume())
    }

    /// Returns the number of orders resting at a given price.
    pub fn order_count_at_price(&self, price: Decimal) -> usize {
        self.levels.get(&price).map_or(0, |q| q.num_orders())
    }

    /// Returns the side's best price, or None when the side is empty.
    #[inline]
    pub fn best_price(&self) -> Option<Decimal> {
        self.best_price
    }

    /// Returns the total size resting on this side.
    #[inline]
    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    /// Returns the total `price * size` resting on this side.
    #[inline]
    pub fn total_volume_funds(&self) -> Decimal {
        self.total_volume_funds
    }

    /// Returns the number of orders resting on this side.
    #[inline]
    pub fn num_orders(&self) -> usize {
        self.num_orders
    }

    /// Returns true when no orders rest on this side.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_orders == 0
    }

    /// Iterates the price levels from the best price outward: descending for
    /// bids, ascending for asks.
    pub fn iter_from_best(&self) -> impl Iterator<Item = (&Decimal, &OrderQueue)> {
        match self.side {
            Side::Bid => LevelIter::Desc(self.levels.iter().rev()),
            Side::Ask => LevelIter::Asc(self.levels.iter()),
        }
    }

    /// True when a level at `price` on this side is eligible to trade against
    /// an incoming order limited to `limit` (None for market orders).
    ///
    /// An incoming buy crosses asks priced at or below its limit; an incoming
    /// sell crosses bids priced at or above its limit.
    #[inline]
    pub fn price_eligible(&self, price: Decimal, limit: Option<Decimal>) -> bool {
        match limit {
            None => true,
            Some(limit) => match self.side {
                Side::Ask => price <= limit,
                Side::Bid => price >= limit,
            },
        }
    }

    /// Sums the volume of eligible levels from the best outward, stopping as
    /// soon as the cumulative volume reaches `needed`.
    ///
    /// Used for the all-or-none precheck: the caller only needs to know
    /// whether `needed` is coverable, not the full eligible depth.
    pub fn available_volume(&self, limit: Option<Decimal>, needed: Decimal) -> Decimal {
        let mut available = Decimal::ZERO;
        for (price, queue) in self.iter_from_best() {
            if !self.price_eligible(*price, limit) {
                break;
            }
            available += queue.total_volume();
            if available >= needed {
                break;
            }
        }
        available
    }

    /// Drains every order off this side in from-best, FIFO order and resets
    /// the caches.
    pub fn clear(&mut self) -> Vec<Order> {
        let mut drained = Vec::with_capacity(self.num_orders);
        let mut levels = std::mem::take(&mut self.levels);
        match self.side {
            Side::Bid => {
                for (_, queue) in levels.iter_mut().rev() {
                    drained.extend(queue.drain());
                }
            }
            Side::Ask => {
                for (_, queue) in levels.iter_mut() {
                    drained.extend(queue.drain());
                }
            }
        }
        self.best_price = None;
        self.total_volume = Decimal::ZERO;
        self.total_volume_funds = Decimal::ZERO;
        self.num_orders = 0;
        drained
    }

    /// True when `candidate` is a better price than `incumbent` on this side.
    #[inline]
    fn is_better(&self, candidate: Decimal, incumbent: Decimal) -> bool {
        match self.side {
            Side::Bid => candidate > incumbent,
            Side::Ask => candidate < incumbent,
        }
    }

    /// Recomputes the best price from the map extremum.
    fn recompute_best(&mut self) {
        self.best_price = match self.side {
            Side::Bid => self.levels.keys().next_back().copied(),
            Side::Ask => self.levels.keys().next().copied(),
        };
    }
}
