//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the FIFO queue of orders resting at a single price.
// Orders within the queue are consumed first-in-first-out, and the queue keeps
// its aggregate volume exact across every mutation.
//
// | Component     | Description                                                               |
// |--------------|---------------------------------------------------------------------------|
// | OrderQueue   | FIFO queue at one price with cached total volume and order count          |
//--------------------------------------------------------------------------------------------------

use std::collections::VecDeque;

use rust_decimal::Decimal;

use crate::types::{Order, OrderId};

/// A FIFO queue of orders at a single price level.
///
/// The cached `total_volume` always equals the sum of the sizes of the queued
/// orders; every mutation maintains it in O(1) except `pop_by_id`, which scans
/// the queue.
#[derive(Debug, Clone)]
pub struct OrderQueue {
    /// The price shared by every order in this queue.
    price: Decimal,
    /// Orders in arrival order. The front is next to trade.
    orders: VecDeque<Order>,
    /// Total size of all queued orders.
    total_volume: Decimal,
}

impl OrderQueue {
    /// Creates a new, empty queue for the given price.
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_volume: Decimal::ZERO,
        }
    }

    /// Appends an order at the back of the queue (normal arrival).
    pub fn push_back(&mut self, order: Order) {
        self.total_volume += order.size;
        self.orders.push_back(order);
    }

    /// Returns an order to the front of the queue.
    ///
    /// Used to put a partially consumed head back in place after a match, so
    /// the residual keeps its time priority over everything behind it.
    pub fn push_front(&mut self, order: Order) {
        self.total_volume += order.size;
        self.orders.push_front(order);
    }

    /// Removes and returns the order at the front of the queue.
    pub fn pop_front(&mut self) -> Option<Order> {
        let order = self.orders.pop_front()?;
        self.total_volume -= order.size;
        Some(order)
    }

    /// Removes and returns the order with the given id, scanning the queue.
    ///
    /// O(k) over the queue length; the surrounding book keeps cancels sublinear
    /// by locating the right queue first.
    pub fn pop_by_id(&mut self, order_id: OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == order_id)?;
        let order = self.orders.remove(pos)?;
        self.total_volume -= order.size;
        Some(order)
    }

    /// Returns the next order to trade without removing it.
    #[inline]
    pub fn peek_front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Finds an order by id without removing it.
    pub fn get(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    /// Iterates the queued orders in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter()
    }

    /// Returns true if the queue has no orders.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Returns the number of orders in the queue.
    #[inline]
    pub fn num_orders(&self) -> usize {
        self.orders.len()
    }

    /// Returns the total size of all queued orders.
    #[inline]
    pub fn total_volume(&self) -> Decimal {
        self.total_volume
    }

    /// Returns the price shared by this queue's orders.
    #[inline]
    pub fn price(&self) -> Decimal {
        self.price
    }

    /// Drains every order out of the queue in FIFO order.
    pub fn drain(&mut self) -> Vec<Order> {
        self.total_volume = Decimal::ZERO;
        self.orders.drain(..).collect()
    }
}
