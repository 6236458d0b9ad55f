// model-linker/src/logging.rs

use log::{warn, LevelFilter};
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::env;
use std::path::Path;

pub const LOG_LEVEL_ENV: &str = "MODEL_LINKER_LOG";

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}";

pub fn level_from_str(value: &str) -> LevelFilter {
    match value.trim().to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn console_config(level: LevelFilter) -> Result<Config, String> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();
    Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|e| format!("Failed to build console logging config: {}", e))
}

/// Loads `log_config` when it exists, otherwise logs to the console at the
/// level named by `MODEL_LINKER_LOG`. Returns a message describing which
/// setup was used. A file that cannot be loaded is reported through the
/// console logger once it is up.
pub fn init_logging(log_config: &Path) -> Result<String, String> {
    let fallback_reason = if log_config.exists() {
        match log4rs::init_file(log_config, Default::default()) {
            Ok(()) => return Ok(format!("Logging configured from {}", log_config.display())),
            Err(e) => format!("Failed to load {}: {}", log_config.display(), e),
        }
    } else {
        format!("No logging config at {}", log_config.display())
    };

    let level = env::var(LOG_LEVEL_ENV)
        .map(|v| level_from_str(&v))
        .unwrap_or(LevelFilter::Info);
    let config = console_config(level)?;
    log4rs::init_config(config).map_err(|e| format!("Failed to initialise logging: {}", e))?;
    warn!("{}. Falling back to console logging.", fallback_reason);
    Ok(format!("Console logging at level {} ({})", level, fallback_reason))
}
