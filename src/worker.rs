//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the owning-thread worker around the book. The core
// is single-threaded by design; callers wanting concurrency serialize every
// mutation through this mailbox instead of sharing the book.
//
// | Component      | Description                                                 |
// |----------------|-------------------------------------------------------------|
// | BookCommand    | Commands sent to the worker thread                          |
// | BookClient     | Cloneable-sender client; one blocking call per operation    |
// | WorkerError    | Book errors plus mailbox disconnection                      |
//
// After each limit submit the worker feeds residuals that could not rest into
// the unmatched book as notification candidates, and its client reports a
// killed fill-or-kill (or a rejected post-only) as a trait violation.
//--------------------------------------------------------------------------------------------------

use std::net::SocketAddr;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::depth::DepthSnapshot;
use crate::matching_engine::{FundsResult, LimitResult, MarketResult};
use crate::orderbook::{OrderBook, OrderbookError};
use crate::snapshot::snapshot_string;
use crate::types::{AccountId, Order, OrderId, OrderTraits, Side};
use crate::unmatched::{Priority, UnmatchedOrderBook};

/// Errors surfaced by the worker client.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The book refused the operation.
    #[error(transparent)]
    Book(#[from] OrderbookError),

    /// The worker thread is gone.
    #[error("book worker disconnected")]
    Disconnected,
}

/// Commands that can be sent to the worker thread.
enum BookCommand {
    SubmitLimit {
        side: Side,
        size: Decimal,
        price: Decimal,
        order_id: OrderId,
        traits: OrderTraits,
        acct_id: Option<AccountId>,
        origin: SocketAddr,
        reply: Sender<Result<LimitResult, OrderbookError>>,
    },
    SubmitMarket {
        side: Side,
        size: Decimal,
        acct_id: Option<AccountId>,
        reply: Sender<Result<MarketResult, OrderbookError>>,
    },
    SubmitFunds {
        side: Side,
        funds: Decimal,
        acct_id: Option<AccountId>,
        reply: Sender<Result<FundsResult, OrderbookError>>,
    },
    Cancel {
        order_id: OrderId,
        side: Side,
        price: Decimal,
        acct_id: Option<AccountId>,
        reply: Sender<Result<Order, OrderbookError>>,
    },
    Depth {
        levels: usize,
        reply: Sender<DepthSnapshot>,
    },
    BestBidAsk {
        reply: Sender<(Option<Decimal>, Option<Decimal>)>,
    },
    Snapshot {
        reply: Sender<String>,
    },
    Clear {
        reply: Sender<Vec<Order>>,
    },
    PopUnmatched {
        side: Side,
        filter: Box<dyn Fn(&Priority) -> bool + Send>,
        reply: Sender<Option<Priority>>,
    },
    Shutdown,
}

/// Client handle to the worker thread. Each call blocks on its own reply
/// channel; the worker applies operations strictly in mailbox order, which is
/// what makes the whole surface linearizable.
pub struct BookClient {
    tx: Sender<BookCommand>,
    handle: Option<JoinHandle<()>>,
}

impl BookClient {
    /// Starts a worker thread owning a fresh book and returns its client.
    pub fn spawn() -> Self {
        let (tx, rx) = unbounded();
        let handle = thread::Builder::new()
            .name("book-worker".into())
            .spawn(move || worker_loop(rx))
            .expect("failed to spawn book worker thread");
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Submits a limit order. A killed fill-or-kill or rejected post-only
    /// order is reported as `TraitViolation`.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_limit_order(
        &self,
        side: Side,
        size: Decimal,
        price: Decimal,
        order_id: OrderId,
        traits: OrderTraits,
        acct_id: Option<AccountId>,
        origin: SocketAddr,
    ) -> Result<LimitResult, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::SubmitLimit {
            side,
            size,
            price,
            order_id,
            traits,
            acct_id,
            origin,
            reply,
        })?;
        Ok(rx.recv().map_err(|_| WorkerError::Disconnected)??)
    }

    /// Submits a market order by size.
    pub fn submit_market_order(
        &self,
        side: Side,
        size: Decimal,
        acct_id: Option<AccountId>,
    ) -> Result<MarketResult, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::SubmitMarket {
            side,
            size,
            acct_id,
            reply,
        })?;
        Ok(rx.recv().map_err(|_| WorkerError::Disconnected)??)
    }

    /// Submits a market order by quote funds.
    pub fn submit_market_order_by_funds(
        &self,
        side: Side,
        funds: Decimal,
        acct_id: Option<AccountId>,
    ) -> Result<FundsResult, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::SubmitFunds {
            side,
            funds,
            acct_id,
            reply,
        })?;
        Ok(rx.recv().map_err(|_| WorkerError::Disconnected)??)
    }

    /// Cancels a resting order by id, side, and price.
    pub fn cancel_order(
        &self,
        order_id: OrderId,
        side: Side,
        price: Decimal,
        acct_id: Option<AccountId>,
    ) -> Result<Order, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::Cancel {
            order_id,
            side,
            price,
            acct_id,
            reply,
        })?;
        Ok(rx.recv().map_err(|_| WorkerError::Disconnected)??)
    }

    /// Returns the aggregated depth view.
    pub fn depth(&self, levels: usize) -> Result<DepthSnapshot, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::Depth { levels, reply })?;
        rx.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Returns the best bid and ask prices.
    pub fn best_bid_ask(&self) -> Result<(Option<Decimal>, Option<Decimal>), WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::BestBidAsk { reply })?;
        rx.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Renders the CSV snapshot of the resting book.
    pub fn snapshot(&self) -> Result<String, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::Snapshot { reply })?;
        rx.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Drains the whole book.
    pub fn clear_book(&self) -> Result<Vec<Order>, WorkerError> {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::Clear { reply })?;
        rx.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Pops the best unmatched notification candidate on `side` accepted by
    /// the filter.
    pub fn pop_unmatched_with_filter<F>(
        &self,
        side: Side,
        filter: F,
    ) -> Result<Option<Priority>, WorkerError>
    where
        F: Fn(&Priority) -> bool + Send + 'static,
    {
        let (reply, rx) = bounded(1);
        self.send(BookCommand::PopUnmatched {
            side,
            filter: Box::new(filter),
            reply,
        })?;
        rx.recv().map_err(|_| WorkerError::Disconnected)
    }

    /// Stops the worker thread and waits for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn send(&self, command: BookCommand) -> Result<(), WorkerError> {
        self.tx.send(command).map_err(|_| WorkerError::Disconnected)
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.tx.send(BookCommand::Shutdown);
            let _ = handle.join();
            info!("book worker stopped");
        }
    }
}

impl Drop for BookClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The worker loop: one thread exclusively owns the book and the unmatched
/// book, so every invariant is enforced without locks.
fn worker_loop(rx: Receiver<BookCommand>) {
    let mut book = OrderBook::new();
    let mut unmatched = UnmatchedOrderBook::new();
    debug!("book worker started");

    while let Ok(command) = rx.recv() {
        match command {
            BookCommand::SubmitLimit {
                side,
                size,
                price,
                order_id,
                traits,
                acct_id,
                origin,
                reply,
            } => {
                let outcome =
                    book.submit_limit_order(side, size, price, order_id, traits, acct_id);
                let response = match outcome {
                    Ok(result) => {
                        // Residuals that could not rest become notification
                        // candidates for the dispatch layer.
                        if result.residual_size > Decimal::ZERO && !result.residual_rests {
                            unmatched.insert_unmatched(
                                side,
                                Priority {
                                    size: result.residual_size,
                                    price,
                                    order_id,
                                    acct_id,
                                    created_at: Utc::now(),
                                    ip: origin.ip(),
                                    port: origin.port(),
                                },
                            );
                        }
                        let killed = result.fills.is_empty()
                            && result.residual_size > Decimal::ZERO
                            && !result.residual_rests
                            && (traits.is_fill_or_kill() || !traits.allow_cross);
                        if killed {
                            Err(OrderbookError::TraitViolation(order_id))
                        } else {
                            Ok(result)
                        }
                    }
                    Err(err) => Err(err),
                };
                let _ = reply.send(response);
            }
            BookCommand::SubmitMarket {
                side,
                size,
                acct_id,
                reply,
            } => {
                let _ = reply.send(book.submit_market_order(side, size, acct_id));
            }
            BookCommand::SubmitFunds {
                side,
                funds,
                acct_id,
                reply,
            } => {
                let _ = reply.send(book.submit_market_order_by_funds(side, funds, acct_id));
            }
            BookCommand::Cancel {
                order_id,
                side,
                price,
                acct_id,
                reply,
            } => {
                let _ = reply.send(book.cancel_order(order_id, side, price, acct_id));
            }
            BookCommand::Depth { levels, reply } => {
                let _ = reply.send(book.book_depth_info(levels));
            }
            BookCommand::BestBidAsk { reply } => {
                let _ = reply.send(book.best_bid_ask());
            }
            BookCommand::Snapshot { reply } => {
                let _ = reply.send(snapshot_string(&book));
            }
            BookCommand::Clear { reply } => {
                let _ = reply.send(book.clear_book());
            }
            BookCommand::PopUnmatched {
                side,
                filter,
                reply,
            } => {
                let _ = reply.send(unmatched.pop_unmatched_with_filter(side, |p| filter(p)));
            }
            BookCommand::Shutdown => break,
        }
    }
    debug!("book worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FOK, IOC, VANILLA};
    use rust_decimal_macros::dec;

    fn origin() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    /// Tests a submit/cross/cancel sequence through the mailbox.
    #[test]
    fn test_worker_round_trip() {
        let client = BookClient::spawn();

        let rested = client
            .submit_limit_order(Side::Bid, dec!(10), dec!(100), 1, VANILLA, Some(7), origin())
            .unwrap();
        assert!(rested.residual_rests);

        let crossed = client
            .submit_limit_order(Side::Ask, dec!(4), dec!(100), 2, VANILLA, None, origin())
            .unwrap();
        assert_eq!(crossed.fills.len(), 1);

        let depth = client.depth(5).unwrap();
        assert_eq!(depth.bids[0].volume, dec!(6));
        assert_eq!(client.best_bid_ask().unwrap(), (Some(dec!(100)), None));

        let cancelled = client.cancel_order(1, Side::Bid, dec!(100), Some(7)).unwrap();
        assert_eq!(cancelled.id, 1);

        client.shutdown();
    }

    /// Tests a killed fill-or-kill surfaces as a trait violation and leaves a
    /// notification candidate behind.
    #[test]
    fn test_fok_kill_maps_to_trait_violation() {
        let client = BookClient::spawn();
        client
            .submit_limit_order(Side::Ask, dec!(5), dec!(100), 1, VANILLA, None, origin())
            .unwrap();

        let err = client
            .submit_limit_order(Side::Bid, dec!(12), dec!(100), 2, FOK, Some(9), origin())
            .unwrap_err();
        assert!(matches!(
            err,
            WorkerError::Book(OrderbookError::TraitViolation(2))
        ));

        let candidate = client
            .pop_unmatched_with_filter(Side::Bid, |p| p.acct_id == Some(9))
            .unwrap()
            .unwrap();
        assert_eq!(candidate.order_id, 2);
        assert_eq!(candidate.size, dec!(12));
        assert_eq!(candidate.port, 9000);

        client.shutdown();
    }

    /// Tests an IOC partial fill is a normal result whose remainder becomes a
    /// notification candidate.
    #[test]
    fn test_ioc_remainder_recorded() {
        let client = BookClient::spawn();
        client
            .submit_limit_order(Side::Bid, dec!(6), dec!(100), 1, VANILLA, None, origin())
            .unwrap();

        let result = client
            .submit_limit_order(Side::Ask, dec!(10), dec!(100), 2, IOC, None, origin())
            .unwrap();
        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.residual_size, dec!(4));

        let candidate = client
            .pop_unmatched_with_filter(Side::Ask, |_| true)
            .unwrap()
            .unwrap();
        assert_eq!(candidate.order_id, 2);
        assert_eq!(candidate.size, dec!(4));

        // Nothing further queued.
        assert!(
            client
                .pop_unmatched_with_filter(Side::Ask, |_| true)
                .unwrap()
                .is_none()
        );

        client.shutdown();
    }
}
