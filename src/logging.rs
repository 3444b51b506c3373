use crate::config::{LogLevel, LoggingConfig, LoggingOutput};
use tracing_subscriber::filter::LevelFilter;

/// Keeps the non-blocking file writer alive for the process lifetime.
#[derive(Debug)]
pub struct LoggingGuard {
    _worker: Option<tracing_appender::non_blocking::WorkerGuard>,
}

pub fn init_logging(
    cfg: &LoggingConfig,
) -> Result<LoggingGuard, Box<dyn std::error::Error + Send + Sync>> {
    let level = match cfg.level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    };

    match cfg.output {
        LoggingOutput::Stdout => {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_file(cfg.include_source)
                .with_line_number(cfg.include_source)
                .with_ansi(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(LoggingGuard { _worker: None })
        }
        LoggingOutput::File => {
            let appender =
                tracing_appender::rolling::daily(&cfg.file.dir, &cfg.file.file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_file(cfg.include_source)
                .with_line_number(cfg.include_source)
                .with_ansi(false)
                .with_writer(non_blocking)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
            Ok(LoggingGuard {
                _worker: Some(guard),
            })
        }
    }
}
