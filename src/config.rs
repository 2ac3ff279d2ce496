use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipeline::batch_analysis::AnalysisType;

/// Application-level constants
pub const APP_NAME: &str = "Worktrace";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default batch size when a request does not name one.
pub const DEFAULT_BATCH_SIZE: u32 = 30;

/// Upper bound on screenshots per batch (one inference call carries them all).
pub const MAX_BATCH_SIZE: u32 = 100;

/// Inference timeout when `WORKTRACE_INFERENCE_TIMEOUT_SECS` is unset.
pub const DEFAULT_INFERENCE_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_INFERENCE_MODEL: &str = "llava:13b";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

/// Get the application data directory
/// ~/Worktrace/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default SQLite database location
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("worktrace.db")
}

/// Default root for stored screenshot images
pub fn default_image_root() -> PathBuf {
    app_data_dir().join("screenshots")
}

/// Tracing filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "worktrace=info,worktrace_lib=info,tower_http=warn"
}

/// Runtime settings, resolved once at startup from `WORKTRACE_*` variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub image_root: PathBuf,
    pub bind_addr: SocketAddr,
    /// `None` means inference is unconfigured and every batch takes the
    /// heuristic path.
    pub inference_url: Option<String>,
    pub inference_model: String,
    pub inference_timeout: Duration,
    pub default_batch_size: u32,
    pub default_analysis_type: AnalysisType,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            image_root: default_image_root(),
            bind_addr: DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8787))),
            inference_url: None,
            inference_model: DEFAULT_INFERENCE_MODEL.to_string(),
            inference_timeout: Duration::from_secs(DEFAULT_INFERENCE_TIMEOUT_SECS),
            default_batch_size: DEFAULT_BATCH_SIZE,
            default_analysis_type: AnalysisType::Auto,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Unparseable values are
    /// logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(path) = lookup("WORKTRACE_DB_PATH") {
            settings.db_path = PathBuf::from(path);
        }
        if let Some(root) = lookup("WORKTRACE_IMAGE_ROOT") {
            settings.image_root = PathBuf::from(root);
        }
        if let Some(addr) = lookup("WORKTRACE_BIND_ADDR") {
            match addr.parse() {
                Ok(parsed) => settings.bind_addr = parsed,
                Err(e) => tracing::warn!(value = %addr, error = %e, "Ignoring invalid WORKTRACE_BIND_ADDR"),
            }
        }
        settings.inference_url = lookup("WORKTRACE_INFERENCE_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        if let Some(model) = lookup("WORKTRACE_INFERENCE_MODEL").filter(|m| !m.trim().is_empty()) {
            settings.inference_model = model.trim().to_string();
        }
        if let Some(secs) = lookup("WORKTRACE_INFERENCE_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(s) if s > 0 => settings.inference_timeout = Duration::from_secs(s),
                _ => tracing::warn!(value = %secs, "Ignoring invalid WORKTRACE_INFERENCE_TIMEOUT_SECS"),
            }
        }
        if let Some(size) = lookup("WORKTRACE_BATCH_SIZE") {
            match size.parse::<u32>() {
                Ok(n) => settings.default_batch_size = clamp_batch_size(n),
                Err(e) => tracing::warn!(value = %size, error = %e, "Ignoring invalid WORKTRACE_BATCH_SIZE"),
            }
        }
        if let Some(kind) = lookup("WORKTRACE_ANALYSIS_TYPE") {
            match kind.parse::<AnalysisType>() {
                Ok(t) => settings.default_analysis_type = t,
                Err(e) => tracing::warn!(value = %kind, error = %e, "Ignoring invalid WORKTRACE_ANALYSIS_TYPE"),
            }
        }

        settings
    }
}

/// Keep a requested batch size within 1..=MAX_BATCH_SIZE.
pub fn clamp_batch_size(requested: u32) -> u32 {
    requested.clamp(1, MAX_BATCH_SIZE)
}
