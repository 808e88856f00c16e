//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module serializes the resting book to its CSV wire format and parses
// it back. Each resting order is one line:
//
//     LMT,<order_id>,<side>,<size>,<price>,<acct_id>
//
// where <side> is rendered "OrderSide(Buy)" or "OrderSide(Sell)", sizes and
// prices are fixed-point decimals at the book's native precision, and a
// missing account id is the empty string. The core never touches files; this
// collaborator works over any reader/writer.
//--------------------------------------------------------------------------------------------------

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::orderbook::{OrderBook, OrderbookError};
use crate::types::{Order, SIZE_DP, Side, VANILLA};

const RECORD_TAG: &str = "LMT";
const BUY_LABEL: &str = "OrderSide(Buy)";
const SELL_LABEL: &str = "OrderSide(Sell)";

/// Errors that can occur while writing or reading a book snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Underlying I/O failure.
    #[error("snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    /// A line did not match the snapshot format.
    #[error("malformed snapshot line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    /// A parsed order was refused by the book while restoring.
    #[error("order rejected while restoring line {line}: {source}")]
    Rejected {
        line: usize,
        source: OrderbookError,
    },
}

/// Renders one resting order as its snapshot line.
pub fn format_order(order: &Order) -> String {
    let side = match order.side {
        Side::Bid => BUY_LABEL,
        Side::Ask => SELL_LABEL,
    };
    let acct = order.acct_id.map(|a| a.to_string()).unwrap_or_default();
    format!(
        "{},{},{},{},{},{}",
        RECORD_TAG,
        order.id,
        side,
        fixed(order.size),
        fixed(order.price),
        acct,
    )
}

/// Writes every resting order (bids from best, then asks from best) to the
/// writer, one line each. Returns the number of lines written.
pub fn write_snapshot<W: Write>(book: &OrderBook, writer: &mut W) -> Result<usize, SnapshotError> {
    let mut lines = 0;
    for order in book.resting_orders() {
        writeln!(writer, "{}", format_order(order))?;
        lines += 1;
    }
    Ok(lines)
}

/// Renders the whole snapshot into a string.
pub fn snapshot_string(book: &OrderBook) -> String {
    book.resting_orders()
        .map(|order| format_order(order) + "\n")
        .collect()
}

/// Parses one snapshot line back into an order (default traits: snapshots
/// only ever contain resting, vanilla liquidity).
pub fn parse_line(line: &str, line_no: usize) -> Result<Order, SnapshotError> {
    let malformed = |reason: &str| SnapshotError::Malformed {
        line: line_no,
        reason: reason.to_string(),
    };

    let fields: Vec<&str> = line.trim().split(',').collect();
    if fields.len() != 6 {
        return Err(malformed("expected 6 comma-separated fields"));
    }
    if fields[0] != RECORD_TAG {
        return Err(malformed("unknown record tag"));
    }

    let id = fields[1]
        .parse()
        .map_err(|_| malformed("unparseable order id"))?;
    let side = match fields[2] {
        BUY_LABEL => Side::Bid,
        SELL_LABEL => Side::Ask,
        _ => return Err(malformed("unknown side")),
    };
    let size = Decimal::from_str(fields[3]).map_err(|_| malformed("unparseable size"))?;
    let price = Decimal::from_str(fields[4]).map_err(|_| malformed("unparseable price"))?;
    let acct_id = if fields[5].is_empty() {
        None
    } else {
        Some(
            fields[5]
                .parse()
                .map_err(|_| malformed("unparseable account id"))?,
        )
    };

    Ok(Order::new(id, acct_id, side, price, size, VANILLA))
}

/// Reads a snapshot, skipping blank lines.
pub fn read_snapshot<R: BufRead>(reader: R) -> Result<Vec<Order>, SnapshotError> {
    let mut orders = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        orders.push(parse_line(&line, idx + 1)?);
    }
    Ok(orders)
}

/// Rebuilds a book from a snapshot by resubmitting every order.
pub fn restore_book<R: BufRead>(reader: R) -> Result<OrderBook, SnapshotError> {
    let mut book = OrderBook::new();
    for (idx, order) in read_snapshot(reader)?.into_iter().enumerate() {
        book.submit_limit_order(
            order.side,
            order.size,
            order.price,
            order.id,
            order.traits,
            order.acct_id,
        )
        .map_err(|source| SnapshotError::Rejected {
            line: idx + 1,
            source,
        })?;
    }
    Ok(book)
}

/// Rescales to the book's native precision for rendering.
fn fixed(value: Decimal) -> Decimal {
    let mut v = value;
    v.rescale(SIZE_DP);
    v
}
