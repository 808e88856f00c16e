//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the core matching logic for processing orders and
// generating fills. Matching follows strict price-time priority: better
// prices trade first, and within a price level orders trade in FIFO order.
//
// | Component                | Description                                                |
// |--------------------------|-----------------------------------------------------------|
// | execute_limit_order      | Trait-modified limit execution with residual disposition   |
// | execute_market_order     | Unbounded-price walk by size (never rests)                 |
// | execute_market_order_by_funds | Walk bounded by quote funds instead of size           |
// | LimitResult / MarketResult / FundsResult | Outcomes returned to the submitter         |
//
//--------------------------------------------------------------------------------------------------
// EXECUTION FLOW (limit orders)
//--------------------------------------------------------------------------------------------------
// 1. Post-only guard: a no-cross order that would take liquidity skips the
//    walk entirely and rests or is rejected.
// 2. All-or-none precheck: eligible opposite volume is summed first; if it
//    cannot cover the order, nothing trades (fill-or-kill is killed, a plain
//    all-or-none rests whole).
// 3. Walk: pop the head of the best eligible opposite queue, trade
//    min(head, remaining), push a partially consumed head back to the front.
// 4. Residual disposition: immediate-or-cancel residuals are discarded,
//    anything else rests on the order's own side.
//--------------------------------------------------------------------------------------------------

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, info};

use crate::orderbook::OrderBook;
use crate::types::{AccountId, Fill, Order, OrderId, SIZE_DP, Side};

/// Outcome of a limit order submission.
#[derive(Debug, Clone, Default)]
pub struct LimitResult {
    /// Fills generated by the matching walk, in execution order.
    pub fills: Vec<Fill>,
    /// Size left unfilled after the walk.
    pub residual_size: Decimal,
    /// Whether the residual was placed on the book.
    pub residual_rests: bool,
}

/// Outcome of a market order submitted by size.
#[derive(Debug, Clone, Default)]
pub struct MarketResult {
    /// Fills generated by the walk, in execution order.
    pub fills: Vec<Fill>,
    /// Size left unfilled when the opposite side ran out.
    pub unfilled_size: Decimal,
}

/// Outcome of a market order submitted by quote funds.
#[derive(Debug, Clone, Default)]
pub struct FundsResult {
    /// Fills generated by the walk, in execution order.
    pub fills: Vec<Fill>,
    /// Funds left unspent when the walk terminated.
    pub unfilled_funds: Decimal,
}

impl OrderBook {
    /// Executes a validated limit order against the book.
    ///
    /// The caller has already checked price, size, and id uniqueness; this
    /// method owns the trait dispatch and the price-time walk.
    pub(crate) fn execute_limit_order(&mut self, mut incoming: Order) -> LimitResult {
        let limit = incoming.price;
        let traits = incoming.traits;
        let opposite_side = incoming.side.opposite();
        let mut fills = Vec::new();

        // 1. Post-only guard: without allow_cross the order never takes.
        if !traits.allow_cross {
            let opposite = self.side_book(opposite_side);
            let would_cross = opposite
                .best_price()
                .is_some_and(|best| opposite.price_eligible(best, Some(limit)));
            if would_cross {
                let at_exact_price = opposite.volume_at_price(limit).is_some();
                let residual_size = incoming.size;
                if at_exact_price {
                    // Liquidity already sits at the submitted price: resting
                    // here would cross, so the order is rejected outright.
                    info!(order_id = incoming.id, %limit, "post-only order rejected");
                    return LimitResult {
                        fills,
                        residual_size,
                        residual_rests: false,
                    };
                }
                self.rest_order(incoming);
                return LimitResult {
                    fills,
                    residual_size,
                    residual_rests: true,
                };
            }
        }

        // 2. All-or-none precheck over the eligible opposite levels.
        if traits.all_or_none {
            let available = self
                .side_book(opposite_side)
                .available_volume(Some(limit), incoming.size);
            if available < incoming.size {
                let residual_size = incoming.size;
                if traits.immediate_or_cancel {
                    info!(
                        order_id = incoming.id,
                        %available,
                        needed = %incoming.size,
                        "fill-or-kill order killed",
                    );
                    return LimitResult {
                        fills,
                        residual_size,
                        residual_rests: false,
                    };
                }
                // A plain all-or-none rests whole and waits for liquidity.
                self.rest_order(incoming);
                return LimitResult {
                    fills,
                    residual_size,
                    residual_rests: true,
                };
            }
        }

        // 3. Walk the opposite side best-first.
        let mut remaining = incoming.size;
        while remaining > Decimal::ZERO {
            let opposite = self.side_book_mut(opposite_side);
            let Some(best) = opposite.best_price() else {
                break;
            };
            if !opposite.price_eligible(best, Some(limit)) {
                break;
            }
            let Some(mut head) = opposite.pop_best() else {
                break;
            };

            let traded = head.size.min(remaining);
            remaining -= traded;
            head.size -= traded;
            debug!(
                taker = incoming.id,
                maker = head.id,
                price = %head.price,
                size = %traded,
                "matched",
            );
            fills.push(Fill::new(incoming.id, head.id, head.price, traded));

            if head.size > Decimal::ZERO {
                // The head was only partially consumed; it returns to the
                // front of its queue with time priority intact.
                self.side_book_mut(opposite_side).insert_front(head);
            } else {
                self.release_filled(&head);
            }
        }

        // 4. Residual disposition.
        incoming.size = remaining;
        let residual_rests = remaining > Decimal::ZERO && traits.may_rest();
        if residual_rests {
            self.rest_order(incoming);
        }
        LimitResult {
            fills,
            residual_size: remaining,
            residual_rests,
        }
    }

    /// Executes a market order by size: an immediate-or-cancel walk with no
    /// price bound. The unfilled remainder is returned, never rested.
    pub(crate) fn execute_market_order(
        &mut self,
        taker_id: OrderId,
        side: Side,
        size: Decimal,
        acct_id: Option<AccountId>,
    ) -> MarketResult {
        let opposite_side = side.opposite();
        let mut remaining = size;
        let mut fills = Vec::new();

        while remaining > Decimal::ZERO {
            let Some(mut head) = self.side_book_mut(opposite_side).pop_best() else {
                break;
            };

            let traded = head.size.min(remaining);
            remaining -= traded;
            head.size -= traded;
            fills.push(Fill::new(taker_id, head.id, head.price, traded));

            if head.size > Decimal::ZERO {
                self.side_book_mut(opposite_side).insert_front(head);
            } else {
                self.release_filled(&head);
            }
        }

        debug!(
            taker = taker_id,
            ?side,
            ?acct_id,
            fills = fills.len(),
            unfilled = %remaining,
            "market order executed",
        );
        MarketResult {
            fills,
            unfilled_size: remaining,
        }
    }

    /// Executes a market order bounded by quote funds.
    ///
    /// At each level the affordable size is `funds / price`, rounded down to
    /// the book's size quantum. The walk terminates when the remaining funds
    /// cannot afford one quantum at the best price, or the side is empty.
    pub(crate) fn execute_market_order_by_funds(
        &mut self,
        taker_id: OrderId,
        side: Side,
        funds: Decimal,
        acct_id: Option<AccountId>,
    ) -> FundsResult {
        let opposite_side = side.opposite();
        let mut funds_left = funds;
        let mut fills = Vec::new();

        loop {
            let opposite = self.side_book_mut(opposite_side);
            let Some(best) = opposite.best_price() else {
                break;
            };
            let max_affordable = (funds_left / best)
                .round_dp_with_strategy(SIZE_DP, RoundingStrategy::ToZero);
            if max_affordable <= Decimal::ZERO {
                break;
            }
            let Some(mut head) = opposite.pop_best() else {
                break;
            };

            let traded = head.size.min(max_affordable);
            funds_left -= traded * head.price;
            head.size -= traded;
            fills.push(Fill::new(taker_id, head.id, head.price, traded));

            if head.size > Decimal::ZERO {
                self.side_book_mut(opposite_side).insert_front(head);
            } else {
                self.release_filled(&head);
            }
        }

        debug!(
            taker = taker_id,
            ?side,
            ?acct_id,
            fills = fills.len(),
            unspent = %funds_left,
            "market-by-funds order executed",
        );
        FundsResult {
            fills,
            unfilled_funds: funds_left,
        }
    }

    /// Places an order on its own side and registers it in the indices.
    fn rest_order(&mut self, order: Order) {
        self.order_map
            .insert(order.id, crate::accounts::OrderHandle::of(&order));
        self.accounts.register(&order);
        debug!(order_id = order.id, side = ?order.side, price = %order.price, "order rests");
        self.side_book_mut(order.side).insert(order);
    }

    /// Drops a fully filled maker from the indices.
    fn release_filled(&mut self, order: &Order) {
        self.order_map.remove(&order.id);
        if let Some(acct_id) = order.acct_id {
            self.accounts.unregister(acct_id, order.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FOK, IOC, VANILLA};
    use rust_decimal_macros::dec;

    /// Sums the traded size across a fill list.
    fn filled_size(fills: &[Fill]) -> Decimal {
        fills.iter().map(|f| f.size).sum()
    }

    /// Tests a vanilla order with no counterparty rests whole.
    #[test]
    fn test_no_match_rests() {
        let mut book = OrderBook::new();
        let result = book
            .submit_limit_order(Side::Bid, dec!(10), dec!(100), 1, VANILLA, None)
            .unwrap();

        assert!(result.fills.is_empty());
        assert_eq!(result.residual_size, dec!(10));
        assert!(result.residual_rests);
        assert_eq!(book.best_bid_ask(), (Some(dec!(100)), None));
        assert_eq!(book.n_orders_bid_ask(), (1, 0));
    }

    /// Tests a crossing ask partially consumes the resting bid at its price.
    #[test]
    fn test_partial_fill_of_maker() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Bid, dec!(10), dec!(100), 1, VANILLA, None)
            .unwrap();

        let result = book
            .submit_limit_order(Side::Ask, dec!(4), dec!(100), 2, VANILLA, None)
            .unwrap();

        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].taker_order_id, 2);
        assert_eq!(result.fills[0].maker_order_id, 1);
        assert_eq!(result.fills[0].price, dec!(100));
        assert_eq!(result.fills[0].size, dec!(4));
        assert_eq!(result.residual_size, dec!(0));
        assert!(!result.residual_rests);

        // The maker's residual keeps its place with reduced size.
        assert_eq!(book.volume_bid_ask(), (dec!(6), dec!(0)));
        assert_eq!(book.n_orders_bid_ask(), (1, 0));
    }

    /// Tests an immediate-or-cancel residual is discarded, not rested.
    #[test]
    fn test_ioc_residual_discarded() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Bid, dec!(6), dec!(100), 1, VANILLA, None)
            .unwrap();

        let result = book
            .submit_limit_order(Side::Ask, dec!(10), dec!(100), 3, IOC, None)
            .unwrap();

        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].size, dec!(6));
        assert_eq!(result.residual_size, dec!(4));
        assert!(!result.residual_rests);
        assert_eq!(book.n_orders_bid_ask(), (0, 0));
        assert_eq!(book.best_bid_ask(), (None, None));
    }

    /// Tests price priority across levels, then FIFO within a level.
    #[test]
    fn test_price_then_time_priority() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Bid, dec!(5), dec!(100), 10, VANILLA, None)
            .unwrap();
        book.submit_limit_order(Side::Bid, dec!(5), dec!(101), 11, VANILLA, None)
            .unwrap();

        let result = book
            .submit_limit_order(Side::Ask, dec!(7), dec!(99), 12, VANILLA, None)
            .unwrap();

        // The better-priced bid trades first, then the lower level.
        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].maker_order_id, 11);
        assert_eq!(result.fills[0].price, dec!(101));
        assert_eq!(result.fills[0].size, dec!(5));
        assert_eq!(result.fills[1].maker_order_id, 10);
        assert_eq!(result.fills[1].price, dec!(100));
        assert_eq!(result.fills[1].size, dec!(2));

        assert_eq!(book.best_bid_ask(), (Some(dec!(100)), None));
        assert_eq!(book.volume_bid_ask(), (dec!(3), dec!(0)));
    }

    /// Tests FIFO consumption of two makers queued at the same price.
    #[test]
    fn test_fifo_within_level() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(4), dec!(100), 1, VANILLA, None)
            .unwrap();
        book.submit_limit_order(Side::Ask, dec!(6), dec!(100), 2, VANILLA, None)
            .unwrap();

        let result = book
            .submit_limit_order(Side::Bid, dec!(9), dec!(100), 3, VANILLA, None)
            .unwrap();

        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].maker_order_id, 1);
        assert_eq!(result.fills[0].size, dec!(4));
        assert_eq!(result.fills[1].maker_order_id, 2);
        assert_eq!(result.fills[1].size, dec!(5));

        let remaining = book.asks.queue_at(dec!(100)).unwrap();
        assert_eq!(remaining.peek_front().unwrap().id, 2);
        assert_eq!(remaining.peek_front().unwrap().size, dec!(1));
    }

    /// Tests a fill-or-kill order fills exactly when liquidity suffices.
    #[test]
    fn test_fok_fills_atomically() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(100), 20, VANILLA, None)
            .unwrap();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(101), 21, VANILLA, None)
            .unwrap();

        let result = book
            .submit_limit_order(Side::Bid, dec!(8), dec!(101), 22, FOK, None)
            .unwrap();

        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].maker_order_id, 20);
        assert_eq!(result.fills[0].price, dec!(100));
        assert_eq!(result.fills[0].size, dec!(5));
        assert_eq!(result.fills[1].maker_order_id, 21);
        assert_eq!(result.fills[1].price, dec!(101));
        assert_eq!(result.fills[1].size, dec!(3));
        assert_eq!(filled_size(&result.fills), dec!(8));
        assert_eq!(result.residual_size, dec!(0));

        assert_eq!(book.volume_bid_ask(), (dec!(0), dec!(2)));
        assert_eq!(book.n_orders_bid_ask(), (0, 1));
    }

    /// Tests a fill-or-kill order against insufficient liquidity leaves the
    /// book byte-identical and produces zero fills.
    #[test]
    fn test_fok_killed_without_mutation() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(100), 20, VANILLA, Some(4))
            .unwrap();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(101), 21, VANILLA, Some(4))
            .unwrap();

        let result = book
            .submit_limit_order(Side::Bid, dec!(12), dec!(101), 23, FOK, None)
            .unwrap();

        assert!(result.fills.is_empty());
        assert_eq!(result.residual_size, dec!(12));
        assert!(!result.residual_rests);

        assert_eq!(book.volume_bid_ask(), (dec!(0), dec!(10)));
        assert_eq!(book.n_orders_bid_ask(), (0, 2));
        assert_eq!(book.best_bid_ask(), (None, Some(dec!(100))));
        assert_eq!(book.get_account(4).len(), 2);
    }

    /// Tests a plain all-or-none (not IOC) rests whole when short of
    /// liquidity instead of trading partially.
    #[test]
    fn test_aon_rests_whole_when_short() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(100), 1, VANILLA, None)
            .unwrap();

        let aon = crate::types::OrderTraits {
            all_or_none: true,
            immediate_or_cancel: false,
            allow_cross: true,
        };
        let result = book
            .submit_limit_order(Side::Bid, dec!(8), dec!(100), 2, aon, None)
            .unwrap();

        assert!(result.fills.is_empty());
        assert!(result.residual_rests);
        // Both the untouched ask and the whole resting bid are on the book.
        assert_eq!(book.volume_bid_ask(), (dec!(8), dec!(5)));
    }

    /// Tests market-by-size execution returns the unfilled remainder.
    #[test]
    fn test_market_order_unfilled_remainder() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Bid, dec!(6), dec!(100), 1, VANILLA, None)
            .unwrap();

        let result = book.submit_market_order(Side::Ask, dec!(10), None).unwrap();
        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].size, dec!(6));
        assert_eq!(result.unfilled_size, dec!(4));
        assert_eq!(book.n_orders_bid_ask(), (0, 0));
    }

    /// Tests market-by-size walks multiple levels at the makers' prices.
    #[test]
    fn test_market_order_walks_levels() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(2), dec!(100), 1, VANILLA, None)
            .unwrap();
        book.submit_limit_order(Side::Ask, dec!(3), dec!(102), 2, VANILLA, None)
            .unwrap();

        let result = book.submit_market_order(Side::Bid, dec!(4), None).unwrap();
        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].price, dec!(100));
        assert_eq!(result.fills[1].price, dec!(102));
        assert_eq!(result.fills[1].size, dec!(2));
        assert_eq!(result.unfilled_size, dec!(0));
        assert_eq!(book.volume_bid_ask(), (dec!(0), dec!(1)));
    }

    /// Tests market-by-funds spends across levels and returns the unspent
    /// remainder once the best price is unaffordable.
    #[test]
    fn test_market_by_funds() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(2), dec!(100), 1, VANILLA, None)
            .unwrap();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(110), 2, VANILLA, None)
            .unwrap();

        // 200 buys the whole first level; 130 buys 130/110 of the second,
        // rounded down to the size quantum.
        let result = book
            .submit_market_order_by_funds(Side::Bid, dec!(330), None)
            .unwrap();

        assert_eq!(result.fills.len(), 2);
        assert_eq!(result.fills[0].size, dec!(2));
        assert_eq!(result.fills[0].price, dec!(100));
        let second = result.fills[1].size;
        assert_eq!(second, (dec!(130) / dec!(110)).round_dp_with_strategy(SIZE_DP, RoundingStrategy::ToZero));
        assert_eq!(result.unfilled_funds, dec!(330) - dec!(200) - second * dec!(110));
        // Whatever is left cannot afford a quantum at the best price.
        assert!(result.unfilled_funds < dec!(110) * Decimal::new(1, SIZE_DP));
    }

    /// Tests market-by-funds with an empty opposite side spends nothing.
    #[test]
    fn test_market_by_funds_empty_book() {
        let mut book = OrderBook::new();
        let result = book
            .submit_market_order_by_funds(Side::Bid, dec!(100), None)
            .unwrap();
        assert!(result.fills.is_empty());
        assert_eq!(result.unfilled_funds, dec!(100));
    }

    /// Tests the post-only guard rests when only better-priced liquidity
    /// crosses, and rejects when liquidity sits at the exact price.
    #[test]
    fn test_post_only_guard() {
        let no_cross = crate::types::OrderTraits {
            all_or_none: false,
            immediate_or_cancel: false,
            allow_cross: false,
        };

        // Crossing liquidity strictly better than the limit: the order rests.
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(99), 1, VANILLA, None)
            .unwrap();
        let result = book
            .submit_limit_order(Side::Bid, dec!(5), dec!(100), 2, no_cross, None)
            .unwrap();
        assert!(result.fills.is_empty());
        assert!(result.residual_rests);
        assert_eq!(book.n_orders_bid_ask(), (1, 1));

        // Liquidity at the exact price: the order is rejected outright.
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(5), dec!(100), 1, VANILLA, None)
            .unwrap();
        let result = book
            .submit_limit_order(Side::Bid, dec!(5), dec!(100), 2, no_cross, None)
            .unwrap();
        assert!(result.fills.is_empty());
        assert!(!result.residual_rests);
        assert_eq!(book.n_orders_bid_ask(), (0, 1));
    }

    /// Tests fill conservation: traded size never exceeds the incoming size
    /// and maker volume drops by exactly the filled amount.
    #[test]
    fn test_fill_conservation() {
        let mut book = OrderBook::new();
        book.submit_limit_order(Side::Ask, dec!(3), dec!(100), 1, VANILLA, None)
            .unwrap();
        book.submit_limit_order(Side::Ask, dec!(4), dec!(101), 2, VANILLA, None)
            .unwrap();
        let before = book.volume_bid_ask().1;

        let result = book
            .submit_limit_order(Side::Bid, dec!(5), dec!(101), 3, VANILLA, None)
            .unwrap();

        let traded = filled_size(&result.fills);
        assert_eq!(traded + result.residual_size, dec!(5));
        assert!(traded <= dec!(5));
        assert_eq!(book.volume_bid_ask().1, before - traded);
    }
}
