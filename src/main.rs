use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use matchbook::config::DisplayConfig;
use matchbook::orderbook::OrderBook;
use matchbook::replay;
use matchbook::snapshot::snapshot_string;

/// Replays a scenario script against a fresh order book and prints the final
/// depth view and CSV snapshot.
#[derive(Parser, Debug)]
#[command(name = "matchbook", about = "Scenario replay driver for the matching core")]
struct Cli {
    /// Path to the scenario script.
    scenario: PathBuf,

    /// Depth levels to display (overrides DEPTH_LEVELS).
    #[arg(long)]
    depth_levels: Option<usize>,

    /// Write the final snapshot here instead of stdout (overrides
    /// SNAPSHOT_PATH).
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = DisplayConfig::from_env();
    let levels = cli.depth_levels.unwrap_or(config.depth_levels);

    let file = File::open(&cli.scenario)
        .with_context(|| format!("failed to open scenario {}", cli.scenario.display()))?;
    let ops = replay::parse_script(BufReader::new(file)).context("failed to parse scenario")?;
    info!(ops = ops.len(), "scenario parsed");

    let mut book = OrderBook::new();
    let report = replay::run_script(&mut book, &ops);
    info!(fills = report.fills.len(), "scenario replayed");
    for (line, err) in &report.errors {
        warn!(line, %err, "operation refused during replay");
    }

    let depth = book.book_depth_info(levels);
    let pretty = config
        .flags
        .get("pretty")
        .map(|v| v == "true")
        .unwrap_or(true);
    let rendered = if pretty {
        serde_json::to_string_pretty(&depth)?
    } else {
        serde_json::to_string(&depth)?
    };
    println!("{rendered}");

    let snapshot = snapshot_string(&book);
    match cli.snapshot.or(config.snapshot_path) {
        Some(path) => {
            let mut out = File::create(&path)
                .with_context(|| format!("failed to create snapshot {}", path.display()))?;
            out.write_all(snapshot.as_bytes())?;
            info!(path = %path.display(), "snapshot written");
        }
        None => print!("{snapshot}"),
    }

    Ok(())
}
