//! Initialisation du logging de l'outil.
//!
//! Le niveau minimum vient de `host.logger.min_level` ; `RUST_LOG`, s'il est
//! défini, a priorité. Les logs partent sur stderr pour laisser stdout aux
//! documents XML.

use cdsconfig::Config;
use tracing_subscriber::EnvFilter;

/// Convertit un niveau de la configuration en directive `EnvFilter`
fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "ERROR" => "error",
        "WARN" | "WARNING" => "warn",
        "DEBUG" => "debug",
        "TRACE" => "trace",
        _ => "info",
    }
}

pub fn init_logging(config: &Config, verbose: bool) {
    let directive = if verbose {
        "debug"
    } else {
        level_directive(&config.get_log_min_level())
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if !config.get_log_enable_console().unwrap_or(true) {
        return;
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
