//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module drives the book from a text scenario: a batch file of submit
// and cancel operations, one per line. The core never reads files itself;
// this collaborator parses the script and calls the book's public surface.
//
// Script format (blank lines and lines starting with '#' are skipped):
//
//     limit,<buy|sell>,<size>,<price>,<id>,<vanilla|ioc|fok>[,<acct>]
//     market,<buy|sell>,<size>[,<acct>]
//     funds,<buy|sell>,<funds>[,<acct>]
//     cancel,<id>,<buy|sell>,<price>[,<acct>]
//     clear
//     depth,<levels>
//     snapshot
//
// Parse failures abort with the offending line number. Book-level failures at
// run time (an unknown cancel, a duplicate id) are surfaced in the report and
// logged, and the run continues.
//--------------------------------------------------------------------------------------------------

use std::io::{self, BufRead};
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};

use crate::depth::DepthSnapshot;
use crate::orderbook::{OrderBook, OrderbookError};
use crate::snapshot::snapshot_string;
use crate::types::{AccountId, Fill, FOK, IOC, OrderId, OrderTraits, Side, VANILLA};

/// Errors raised while parsing or running a scenario script.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Underlying I/O failure while reading the script.
    #[error("script I/O error: {0}")]
    Io(#[from] io::Error),

    /// A script line did not parse.
    #[error("malformed script line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// One parsed operation, tagged with its script line for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOp {
    pub line: usize,
    pub op: ReplayOp,
}

/// The operations a scenario script can issue against the book.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOp {
    Limit {
        side: Side,
        size: Decimal,
        price: Decimal,
        order_id: OrderId,
        traits: OrderTraits,
        acct_id: Option<AccountId>,
    },
    Market {
        side: Side,
        size: Decimal,
        acct_id: Option<AccountId>,
    },
    Funds {
        side: Side,
        funds: Decimal,
        acct_id: Option<AccountId>,
    },
    Cancel {
        order_id: OrderId,
        side: Side,
        price: Decimal,
        acct_id: Option<AccountId>,
    },
    Clear,
    Depth { levels: usize },
    Snapshot,
}

/// Everything a script run produced.
#[derive(Debug, Default)]
pub struct ReplayReport {
    /// All fills, in execution order across the whole script.
    pub fills: Vec<Fill>,
    /// One entry per `depth` op.
    pub depths: Vec<DepthSnapshot>,
    /// One rendered CSV document per `snapshot` op.
    pub snapshots: Vec<String>,
    /// Book-level failures encountered at run time, with their script lines.
    pub errors: Vec<(usize, OrderbookError)>,
}

/// Parses a whole script.
pub fn parse_script<R: BufRead>(reader: R) -> Result<Vec<ScriptOp>, ReplayError> {
    let mut ops = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        ops.push(ScriptOp {
            line: line_no,
            op: parse_op(trimmed, line_no)?,
        });
    }
    Ok(ops)
}

/// Applies parsed operations to the book and collects the outcome.
pub fn run_script(book: &mut OrderBook, ops: &[ScriptOp]) -> ReplayReport {
    let mut report = ReplayReport::default();

    for ScriptOp { line, op } in ops {
        match op {
            ReplayOp::Limit {
                side,
                size,
                price,
                order_id,
                traits,
                acct_id,
            } => match book.submit_limit_order(*side, *size, *price, *order_id, *traits, *acct_id)
            {
                Ok(result) => {
                    info!(
                        line,
                        order_id,
                        fills = result.fills.len(),
                        residual = %result.residual_size,
                        rests = result.residual_rests,
                        "limit order processed",
                    );
                    report.fills.extend(result.fills);
                }
                Err(err) => {
                    warn!(line, order_id, %err, "limit order refused");
                    report.errors.push((*line, err));
                }
            },
            ReplayOp::Market { side, size, acct_id } => {
                match book.submit_market_order(*side, *size, *acct_id) {
                    Ok(result) => {
                        info!(
                            line,
                            fills = result.fills.len(),
                            unfilled = %result.unfilled_size,
                            "market order processed",
                        );
                        report.fills.extend(result.fills);
                    }
                    Err(err) => {
                        warn!(line, %err, "market order refused");
                        report.errors.push((*line, err));
                    }
                }
            }
            ReplayOp::Funds { side, funds, acct_id } => {
                match book.submit_market_order_by_funds(*side, *funds, *acct_id) {
                    Ok(result) => {
                        info!(
                            line,
                            fills = result.fills.len(),
                            unspent = %result.unfilled_funds,
                            "market-by-funds order processed",
                        );
                        report.fills.extend(result.fills);
                    }
                    Err(err) => {
                        warn!(line, %err, "market-by-funds order refused");
                        report.errors.push((*line, err));
                    }
                }
            }
            ReplayOp::Cancel {
                order_id,
                side,
                price,
                acct_id,
            } => match book.cancel_order(*order_id, *side, *price, *acct_id) {
                Ok(order) => info!(line, order_id = order.id, "order cancelled"),
                Err(err) => {
                    warn!(line, order_id, %err, "cancel missed");
                    report.errors.push((*line, err));
                }
            },
            ReplayOp::Clear => {
                let removed = book.clear_book();
                info!(line, removed = removed.len(), "book cleared");
            }
            ReplayOp::Depth { levels } => {
                report.depths.push(book.book_depth_info(*levels));
            }
            ReplayOp::Snapshot => {
                report.snapshots.push(snapshot_string(book));
            }
        }
    }

    report
}

fn parse_op(line: &str, line_no: usize) -> Result<ReplayOp, ReplayError> {
    let malformed = |reason: String| ReplayError::Malformed {
        line: line_no,
        reason,
    };

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    match fields[0] {
        "limit" => {
            if fields.len() < 6 || fields.len() > 7 {
                return Err(malformed("limit expects 5 or 6 arguments".into()));
            }
            Ok(ReplayOp::Limit {
                side: parse_side(fields[1], line_no)?,
                size: parse_decimal(fields[2], "size", line_no)?,
                price: parse_decimal(fields[3], "price", line_no)?,
                order_id: parse_u64(fields[4], "order id", line_no)?,
                traits: parse_traits(fields[5], line_no)?,
                acct_id: parse_acct(fields.get(6), line_no)?,
            })
        }
        "market" => {
            if fields.len() < 3 || fields.len() > 4 {
                return Err(malformed("market expects 2 or 3 arguments".into()));
            }
            Ok(ReplayOp::Market {
                side: parse_side(fields[1], line_no)?,
                size: parse_decimal(fields[2], "size", line_no)?,
                acct_id: parse_acct(fields.get(3), line_no)?,
            })
        }
        "funds" => {
            if fields.len() < 3 || fields.len() > 4 {
                return Err(malformed("funds expects 2 or 3 arguments".into()));
            }
            Ok(ReplayOp::Funds {
                side: parse_side(fields[1], line_no)?,
                funds: parse_decimal(fields[2], "funds", line_no)?,
                acct_id: parse_acct(fields.get(3), line_no)?,
            })
        }
        "cancel" => {
            if fields.len() < 4 || fields.len() > 5 {
                return Err(malformed("cancel expects 3 or 4 arguments".into()));
            }
            Ok(ReplayOp::Cancel {
                order_id: parse_u64(fields[1], "order id", line_no)?,
                side: parse_side(fields[2], line_no)?,
                price: parse_decimal(fields[3], "price", line_no)?,
                acct_id: parse_acct(fields.get(4), line_no)?,
            })
        }
        "clear" => Ok(ReplayOp::Clear),
        "depth" => {
            if fields.len() != 2 {
                return Err(malformed("depth expects 1 argument".into()));
            }
            Ok(ReplayOp::Depth {
                levels: fields[1]
                    .parse()
                    .map_err(|_| malformed(format!("unparseable level count '{}'", fields[1])))?,
            })
        }
        "snapshot" => Ok(ReplayOp::Snapshot),
        other => Err(malformed(format!("unknown operation '{other}'"))),
    }
}

fn parse_side(text: &str, line: usize) -> Result<Side, ReplayError> {
    match text {
        "buy" => Ok(Side::Bid),
        "sell" => Ok(Side::Ask),
        _ => Err(ReplayError::Malformed {
            line,
            reason: format!("unknown side '{text}'"),
        }),
    }
}

fn parse_traits(text: &str, line: usize) -> Result<OrderTraits, ReplayError> {
    match text {
        "vanilla" => Ok(VANILLA),
        "ioc" => Ok(IOC),
        "fok" => Ok(FOK),
        _ => Err(ReplayError::Malformed {
            line,
            reason: format!("unknown traits '{text}'"),
        }),
    }
}

fn parse_decimal(text: &str, what: &str, line: usize) -> Result<Decimal, ReplayError> {
    Decimal::from_str(text).map_err(|_| ReplayError::Malformed {
        line,
        reason: format!("unparseable {what} '{text}'"),
    })
}

fn parse_u64(text: &str, what: &str, line: usize) -> Result<u64, ReplayError> {
    text.parse().map_err(|_| ReplayError::Malformed {
        line,
        reason: format!("unparseable {what} '{text}'"),
    })
}

fn parse_acct(field: Option<&&str>, line: usize) -> Result<Option<AccountId>, ReplayError> {
    match field {
        None => Ok(None),
        Some(text) if text.is_empty() => Ok(None),
        Some(text) => text
            .parse()
            .map(Some)
            .map_err(|_| ReplayError::Malformed {
                line,
                reason: format!("unparseable account id '{text}'"),
            }),
    }
}
