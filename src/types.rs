//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the core data types used throughout the matching core,
// including orders, execution traits, fills, and the book's numeric conventions.
//
// | Section            | Description                                                      |
// |--------------------|------------------------------------------------------------------|
// | ENUMS              | Discrete sets of values (Side).                                  |
// | TRAIT FLAGS        | The three independent execution flags and their named presets.   |
// | STRUCTS            | Orders and fills.                                                |
// | TESTS              | Unit tests for the defined types.                                |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique order identifier, assigned by the caller for limit orders and by the
/// book's internal sequence for market-order takers.
pub type OrderId = u64;

/// Account identifier. Orders without an account are accepted but are not
/// tracked by the account index.
pub type AccountId = u64;

/// Number of decimal places in the book's size quantum. Market-by-funds
/// execution rounds affordable sizes down to this precision, and CSV snapshots
/// render sizes and prices at it.
pub const SIZE_DP: u32 = 8;

/// Represents the side of an order (Buy or Sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// A buy order (also called bid).
    Bid,
    /// A sell order (also called ask).
    Ask,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Bid => Self::Ask,
            Self::Ask => Self::Bid,
        }
    }
}

/// The three independent execution flags carried by every order.
///
/// The flags combine into the familiar order styles:
///
/// * **fill-or-kill**: `all_or_none` together with `immediate_or_cancel`
/// * **may rest**: the negation of `immediate_or_cancel`
/// * **may partial-fill**: the negation of `all_or_none`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderTraits {
    /// The order must trade its entire size or none of it.
    pub all_or_none: bool,
    /// Whatever cannot trade immediately is discarded instead of resting.
    pub immediate_or_cancel: bool,
    /// The order is allowed to take liquidity from the opposite side. When
    /// false the order is post-only and never initiates a match.
    pub allow_cross: bool,
}

/// Default traits: may partial-fill, may rest.
pub const VANILLA: OrderTraits = OrderTraits {
    all_or_none: false,
    immediate_or_cancel: false,
    allow_cross: true,
};

/// Immediate-or-cancel: execute what is possible now, discard the residual.
pub const IOC: OrderTraits = OrderTraits {
    all_or_none: false,
    immediate_or_cancel: true,
    allow_cross: true,
};

/// Fill-or-kill: execute the entire size atomically or not at all.
pub const FOK: OrderTraits = OrderTraits {
    all_or_none: true,
    immediate_or_cancel: true,
    allow_cross: true,
};

impl OrderTraits {
    /// True when the order must fill completely and immediately or be killed.
    #[inline]
    pub fn is_fill_or_kill(&self) -> bool {
        self.all_or_none && self.immediate_or_cancel
    }

    /// True when an unfilled residual may be placed on the book.
    #[inline]
    pub fn may_rest(&self) -> bool {
        !self.immediate_or_cancel
    }

    /// True when the order may trade a strict subset of its size.
    #[inline]
    pub fn may_partial_fill(&self) -> bool {
        !self.all_or_none
    }
}

impl Default for OrderTraits {
    fn default() -> Self {
        VANILLA
    }
}

/// A limit order, either in flight through the matching walk or resting on the
/// book. Prices and sizes are exact decimals; no floating arithmetic ever
/// changes either.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier for the order within the book's lifetime.
    pub id: OrderId,
    /// Identifier of the account that placed the order, when known.
    pub acct_id: Option<AccountId>,
    /// Side of the order (Bid or Ask).
    pub side: Side,
    /// Limit price. Strictly positive.
    pub price: Decimal,
    /// Remaining size. Strictly positive while the order rests; decremented
    /// only by matches, and the order is removed when it reaches zero.
    pub size: Decimal,
    /// Execution flags for this order.
    pub traits: OrderTraits,
    /// Timestamp of order creation, used for unmatched-priority ordering.
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order stamped with the current time.
    pub fn new(
        id: OrderId,
        acct_id: Option<AccountId>,
        side: Side,
        price: Decimal,
        size: Decimal,
        traits: OrderTraits,
    ) -> Self {
        Self {
            id,
            acct_id,
            side,
            price,
            size,
            traits,
            created_at: Utc::now(),
        }
    }
}

/// Represents a completed fill between an incoming (taker) order and a resting
/// (maker) order. Fills are emitted in walk order by a single submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Unique identifier for the fill.
    pub id: Uuid,
    /// ID of the incoming order that triggered the match.
    pub taker_order_id: OrderId,
    /// ID of the order that was resting on the book.
    pub maker_order_id: OrderId,
    /// Price at which the fill occurred (the maker's price).
    pub price: Decimal,
    /// Size traded.
    pub size: Decimal,
    /// Quote amount, `price * size`.
    pub quote_amount: Decimal,
    /// Timestamp when the fill occurred.
    pub created_at: DateTime<Utc>,
}

impl Fill {
    /// Creates a fill record for a match at `price` for `size`.
    pub fn new(
        taker_order_id: OrderId,
        maker_order_id: OrderId,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            taker_order_id,
            maker_order_id,
            price,
            size,
            quote_amount: price * size,
            created_at: Utc::now(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
//  TESTS
//--------------------------------------------------------------------------------------------------
