//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the per-account index of resting orders. The index
// stores stable location handles, not order copies; the book resolves a handle
// back to the live order on access, so order state is never duplicated.
//
// | Component     | Description                                                   |
// |--------------|---------------------------------------------------------------|
// | OrderHandle  | (side, price, order id) locator for a resting order           |
// | AccountIndex | account id -> ordered map of order id -> handle               |
//--------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Order, OrderId, Side};

/// Stable locator for a resting order: enough to find its queue in O(log n).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderHandle {
    pub side: Side,
    pub price: Decimal,
    pub order_id: OrderId,
}

impl OrderHandle {
    /// Builds the handle for a resting order.
    pub fn of(order: &Order) -> Self {
        Self {
            side: order.side,
            price: order.price,
            order_id: order.id,
        }
    }
}

/// Maps each account to the set of its resting orders, ordered by order id.
///
/// An order is registered here exactly when it rests on the book and carries
/// an account id; it is unregistered on cancel or full fill.
#[derive(Debug, Default)]
pub struct AccountIndex {
    accounts: HashMap<AccountId, BTreeMap<OrderId, OrderHandle>>,
}

impl AccountIndex {
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// Registers a resting order under its account. Orders without an account
    /// id are ignored.
    pub fn register(&mut self, order: &Order) {
        if let Some(acct_id) = order.acct_id {
            self.accounts
                .entry(acct_id)
                .or_default()
                .insert(order.id, OrderHandle::of(order));
        }
    }

    /// Unregisters an order from an account. Empty account entries are pruned.
    pub fn unregister(&mut self, acct_id: AccountId, order_id: OrderId) -> Option<OrderHandle> {
        let orders = self.accounts.get_mut(&acct_id)?;
        let handle = orders.remove(&order_id);
        if orders.is_empty() {
            self.accounts.remove(&acct_id);
        }
        handle
    }

    /// Returns the account's order handles in ascending order-id order.
    pub fn handles(&self, acct_id: AccountId) -> Vec<OrderHandle> {
        self.accounts
            .get(&acct_id)
            .map(|orders| orders.values().copied().collect())
            .unwrap_or_default()
    }

    /// Total number of registered orders across all accounts.
    pub fn num_registered(&self) -> usize {
        self.accounts.values().map(|orders| orders.len()).sum()
    }

    /// Drops every registration.
    pub fn clear(&mut self) {
        self.accounts.clear();
    }
}
