//! Logging initialization using the `tracing` ecosystem.
//!
//! Console output is always on; a daily-rotating file is added when a log
//! directory is configured. `RUST_LOG` overrides the level passed in.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber. Call once at program start.
///
/// - `log_level`: default filter when `RUST_LOG` is unset (e.g. `"info"`)
/// - `log_dir`: optional directory for daily-rotating log files
/// - `module_name`: log file prefix (e.g. `"dashd"`)
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(log_level: &str, log_dir: Option<&str>, module_name: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::daily(dir, module_name))
            .with_ansi(false)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

/// Shorten a secret-bearing token for log output (first 8 chars).
pub fn redact(token: &str) -> String {
    let head: String = token.chars().take(8).collect();
    if head.len() < token.len() { format!("{head}…") } else { head }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_truncates() {
        assert_eq!(redact("abcdefghijkl"), "abcdefgh…");
        assert_eq!(redact("short"), "short");
    }
}
