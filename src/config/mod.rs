use std::env;

/// Ambient environment-facing configuration.
///
/// This crate exposes no CLI (SPEC_FULL.md §6); `AppConfig::from_env` is the
/// only environment surface, mirroring the `from_env()` + helper-parser
/// pattern used throughout the reference system's config layer.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_config_path: String,
    pub overlay_config_path: String,
    pub strategies_config_path: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            base_config_path: Self::parse_string("CORE_BASE_CONFIG", "config/base.yaml"),
            overlay_config_path: Self::parse_string("CORE_OVERLAY_CONFIG", "config/overlay.yaml"),
            strategies_config_path: Self::parse_string(
                "CORE_STRATEGIES_CONFIG",
                "config/strategies.yaml",
            ),
            log_level: Self::parse_string("RUST_LOG", "info"),
        }
    }

    fn parse_string(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Installs the global tracing subscriber. Call once at process startup;
/// the core itself never installs logging transport (out of scope per
/// SPEC_FULL.md §1) beyond this thin `tracing_subscriber` wiring.
pub fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
