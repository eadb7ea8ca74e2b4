//! Environment-driven runtime configuration, read once at startup.

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Minimum per-beacon sample count before a window is considered ready.
    pub count_trigger: usize,
    pub max_window_age_secs: u64,
    pub fire_delete_window_secs: u64,
    /// Readings at or below this threshold are treated as invalid.
    pub rssi_min_valid: f64,
    pub graph_file: String,
    pub targets_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 3001),
            count_trigger: env_or("COUNT_TRIGGER", 10),
            max_window_age_secs: env_or("MAX_WINDOW_AGE_SECS", 10),
            fire_delete_window_secs: env_or("FIRE_DELETE_WINDOW_SECS", 5),
            rssi_min_valid: env_or("RSSI_MIN_VALID", -99.0),
            graph_file: std::env::var("GRAPH_FILE").unwrap_or_else(|_| "graphs.json".to_string()),
            targets_file: std::env::var("TARGETS_FILE").unwrap_or_else(|_| "targets.json".to_string()),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
