use dotenv::dotenv;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

const DEPTH_LEVELS: &str = "DEPTH_LEVELS";
const SNAPSHOT_PATH: &str = "SNAPSHOT_PATH";
const BOOK_FLAGS: &str = "BOOK_FLAGS";

const DEFAULT_DEPTH_LEVELS: usize = 10;

/// Display settings for the replay driver. The free-form `flags` bag tunes
/// presentation only and deliberately lives here, outside the book itself.
#[derive(Clone, Debug)]
pub struct DisplayConfig {
    pub depth_levels: usize,
    pub snapshot_path: Option<PathBuf>,
    pub flags: HashMap<String, String>,
}

impl DisplayConfig {
    pub fn from_env() -> DisplayConfig {
        // Load .env file
        dotenv().ok();

        let depth_levels = env::var(DEPTH_LEVELS)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_DEPTH_LEVELS);
        let snapshot_path = env::var(SNAPSHOT_PATH).ok().map(PathBuf::from);
        let flags = env::var(BOOK_FLAGS)
            .map(|raw| {
                raw.split(',')
                    .filter_map(|pair| {
                        pair.split_once('=')
                            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        DisplayConfig {
            depth_levels,
            snapshot_path,
            flags,
        }
    }
}
