use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Header carrying the ingest token on every request
pub const DEFAULT_TOKEN_HEADER: &str = "X-SF-Token";

/// Transfer configuration for metadata fetches and uploads
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Name of the token header (default: "X-SF-Token")
    pub token_header: String,

    /// User agent sent with every request
    pub user_agent: String,

    /// Simulated bandwidth for mock uploads in megabits per second (default: 25)
    pub mock_rate_mbps: f64,

    /// Interval between simulated progress ticks (default: 50 ms)
    pub mock_tick: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            user_agent: format!("rum-symbols/{}", env!("CARGO_PKG_VERSION")),
            mock_rate_mbps: 25.0,
            mock_tick: Duration::from_millis(50),
        }
    }
}

impl TransferConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        Self {
            token_header: lookup("RUM_TOKEN_HEADER")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default.token_header),

            user_agent: lookup("RUM_USER_AGENT").unwrap_or(default.user_agent),

            mock_rate_mbps: lookup("RUM_MOCK_RATE_MBPS")
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|rate| rate.is_finite() && *rate > 0.0)
                .unwrap_or(default.mock_rate_mbps),

            mock_tick: lookup("RUM_MOCK_TICK_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(default.mock_tick),
        }
    }
}

/// Where and how artifacts are staged before upload
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Directory under which staging directories are created (default: OS temp dir)
    pub temp_root: PathBuf,

    /// Archiver type: "zip" (external command) or "builtin" (default: "zip")
    pub archiver: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            temp_root: env::temp_dir(),
            archiver: "zip".to_string(),
        }
    }
}

impl StagingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        Self {
            temp_root: lookup("RUM_STAGING_ROOT")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.temp_root),

            archiver: lookup("RUM_ARCHIVER").unwrap_or(default.archiver),
        }
    }
}
