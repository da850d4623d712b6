use agdirect_transport::TraceLevel;
use clap::ValueEnum;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// The stderr filter: `--log-level`, raised so that events requested by a
/// protocol trace level are not dropped.
pub fn effective_filter(level: LogLevel, trace: TraceLevel) -> LevelFilter {
    let wanted = if trace.values() {
        LevelFilter::TRACE
    } else if trace.calls() {
        LevelFilter::DEBUG
    } else {
        LevelFilter::OFF
    };
    level.as_filter().max(wanted)
}

pub fn init_logging(format: LogFormat, filter: LevelFilter) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(filter)
        .with_ansi(false)
        .with_target(false);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_levels_raise_the_filter() {
        assert_eq!(
            effective_filter(LogLevel::Warn, TraceLevel::Off),
            LevelFilter::WARN
        );
        assert_eq!(
            effective_filter(LogLevel::Warn, TraceLevel::Calls),
            LevelFilter::DEBUG
        );
        assert_eq!(
            effective_filter(LogLevel::Info, TraceLevel::Bytes),
            LevelFilter::TRACE
        );
        assert_eq!(
            effective_filter(LogLevel::Trace, TraceLevel::Calls),
            LevelFilter::TRACE
        );
    }
}
