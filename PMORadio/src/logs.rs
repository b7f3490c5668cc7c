//! Initialisation du logging
//!
//! Le niveau minimum vient de `host.logger.min_level` ; `RUST_LOG` a
//! priorité quand il est défini.

use pmoconfig::Config;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Convertit un niveau de la configuration en directive de filtre
fn level_directive(level: &str) -> &'static str {
    match level.trim().to_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.get_log_min_level().unwrap_or_default();
        EnvFilter::new(level_directive(&level))
    });

    let enable_console = config.get_log_enable_console().unwrap_or(true);
    let registry = Registry::default().with(filter);

    if enable_console {
        registry
            .with(fmt::layer().with_target(true).with_level(true).with_ansi(true))
            .init();
    } else {
        registry.init();
    }
}
