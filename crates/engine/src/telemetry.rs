use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use taskboard_core::config::{LogFormat, LoggingConfig};

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_new(&config.filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {:?}, using info: {err}", config.filter);
        EnvFilter::new("info")
    })
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let filter = build_filter(config);
    let layer = tracing_subscriber::fmt::layer().with_target(true);

    let result = match config.format {
        LogFormat::Compact => Registry::default()
            .with(filter)
            .with(layer.compact())
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(filter)
            .with(layer.pretty())
            .try_init(),
    };
    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_refused() {
        let config = LoggingConfig::default();
        init(&config);
        assert!(!init(&config));
    }
}
