//! Bootstrap utilities for the pulseflow demo binary.
//!
//! Handles CLI flag parsing, config file loading and logging setup so the
//! binary's main can focus on wiring the pipeline.

use crate::config::AppConfig;
use crate::logging::{init_logging, LoggingGuard};

/// Result of the default initialization process.
pub struct BootstrapResult {
    pub config: AppConfig,
    /// Must be kept alive for the lifetime of the application.
    pub logging_guard: LoggingGuard,
    /// First positional argument: the replay file to feed through the demo
    /// pipeline.
    pub replay_file: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct CliFlags {
    config_path: Option<String>,
    replay_file: Option<String>,
}

impl CliFlags {
    fn parse() -> Self {
        let mut flags = Self::default();
        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => {
                    if let Some(val) = args.next() {
                        flags.config_path = Some(val);
                    }
                }
                other if flags.replay_file.is_none() && !other.starts_with("--") => {
                    flags.replay_file = Some(other.to_string());
                }
                _ => {}
            }
        }
        flags
    }
}

/// Parse CLI flags, load the config file (if any) and initialize logging.
pub fn default_init() -> Result<BootstrapResult, Box<dyn std::error::Error + Send + Sync>> {
    let flags = CliFlags::parse();
    let config = match flags.config_path.as_deref() {
        Some(path) => AppConfig::load_required(path)?,
        None => AppConfig::default(),
    };
    let logging_guard = init_logging(&config.logging)?;
    Ok(BootstrapResult {
        config,
        logging_guard,
        replay_file: flags.replay_file,
    })
}
