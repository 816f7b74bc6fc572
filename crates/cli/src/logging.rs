use anyhow::Result;
use sessiongate_core::tracing::{InstrumentationConfig, init_tracing};
use tracing::Level;

/// Initialize logging for the CLI
///
/// Logs go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` overrides the level and `SESSIONGATE_LOG_FORMAT=json` switches
/// to JSON lines.
pub fn init_logging(log_level: Level) -> Result<()> {
    init_tracing(&instrumentation_config(log_level))
}

fn instrumentation_config(log_level: Level) -> InstrumentationConfig {
    InstrumentationConfig {
        service_name: "sessiongate-cli".to_string(),
        log_level: level_filter(log_level),
        stderr: true,
        ..InstrumentationConfig::from_env()
    }
}

fn level_filter(level: Level) -> String {
    let level_str = level.as_str().to_lowercase();
    format!("sessiongate={level_str},sessiongate_core={level_str},sessiongate_http={level_str}")
}
