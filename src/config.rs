// Configuration module for ripple
// Reads from environment variables with sensible defaults

use std::env;
use std::sync::OnceLock;
use tracing::warn;

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Parse worker threads per rebuild (RIPPLE_PARSE_WORKERS)
    pub parse_workers: usize,

    /// Wall-clock budget for one blast-radius traversal in ms (RIPPLE_BLAST_BUDGET_MS)
    pub blast_budget_ms: u64,

    /// Traversal depth used when the caller passes zero (RIPPLE_DEFAULT_DEPTH)
    pub default_depth: usize,

    /// Hard cap on requested traversal depth (RIPPLE_MAX_DEPTH)
    pub max_depth: usize,

    /// Traversal truncates after visiting this many symbols (RIPPLE_NODE_LIMIT)
    pub node_limit: usize,

    /// Files larger than this are recorded but not parsed (RIPPLE_MAX_FILE_SIZE_MB)
    pub max_file_size_mb: u64,

    /// Superseded snapshots kept addressable by id (RIPPLE_RETAINED_SNAPSHOTS)
    pub retained_snapshots: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parse_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            blast_budget_ms: 500,
            default_depth: 3,
            max_depth: 10,
            node_limit: 10_000,
            max_file_size_mb: 10,
            retained_snapshots: 4,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Config::default();

        read_nonzero(
            "RIPPLE_PARSE_WORKERS",
            &mut config.parse_workers,
        );
        read_nonzero_u64("RIPPLE_BLAST_BUDGET_MS", &mut config.blast_budget_ms);
        read_nonzero("RIPPLE_DEFAULT_DEPTH", &mut config.default_depth);
        read_nonzero("RIPPLE_MAX_DEPTH", &mut config.max_depth);
        read_nonzero("RIPPLE_NODE_LIMIT", &mut config.node_limit);
        read_nonzero_u64("RIPPLE_MAX_FILE_SIZE_MB", &mut config.max_file_size_mb);
        read_nonzero("RIPPLE_RETAINED_SNAPSHOTS", &mut config.retained_snapshots);

        if config.default_depth > config.max_depth {
            warn!(
                default_depth = config.default_depth,
                max_depth = config.max_depth,
                "RIPPLE_DEFAULT_DEPTH exceeds RIPPLE_MAX_DEPTH, clamping"
            );
            config.default_depth = config.max_depth;
        }
        config
    }

    /// Get the global configuration instance
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(Config::from_env)
    }
}

fn read_nonzero(name: &str, slot: &mut usize) {
    if let Ok(val) = env::var(name) {
        match val.parse::<usize>() {
            Ok(parsed) if parsed > 0 => *slot = parsed,
            _ => warn!(var = name, value = %val, "invalid value, using default {}", slot),
        }
    }
}

fn read_nonzero_u64(name: &str, slot: &mut u64) {
    if let Ok(val) = env::var(name) {
        match val.parse::<u64>() {
            Ok(parsed) if parsed > 0 => *slot = parsed,
            _ => warn!(var = name, value = %val, "invalid value, using default {}", slot),
        }
    }
}
