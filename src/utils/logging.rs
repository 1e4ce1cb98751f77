use clap::ValueEnum;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{fmt, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use crate::config::service::ServiceConfig;
use crate::config::settings::{LogFormat, LoggingConfig};


#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match *self {
            LogLevel::TRACE => "trace",
            LogLevel::DEBUG => "debug",
            LogLevel::INFO => "info",
            LogLevel::WARN => "warn",
            LogLevel::ERROR => "error",
        }
    }
}

/// Logging config from the file, with the CLI level taking precedence.
pub fn resolve(service_config: &ServiceConfig, arg_log_level: Option<LogLevel>) -> LoggingConfig {
    let (level, format) = match service_config.settings.logging.as_ref() {
        Some(config) => (config.level.to_owned(), config.format.to_owned()),
        None => ("info".to_owned(), LogFormat::Compact),
    };
    let level = arg_log_level.map(|l| l.as_str().to_owned()).unwrap_or(level);
    LoggingConfig::new(level, format)
}

pub fn run(service_config: &ServiceConfig, arg_log_level: Option<LogLevel>) {
    init_logging(&resolve(service_config, arg_log_level));
}


/// Initialize tracing with the desired config.
pub fn init_logging(cfg: &LoggingConfig) {
    let env_filter = EnvFilter::try_new(&cfg.level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // Base layer: filter + writer
    let registry = tracing_subscriber::registry().with(env_filter);

    match cfg.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .flatten_event(true)
                .with_ansi(false); // log collectors choke on colour codes

            let _ = registry.with(layer).try_init();
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_timer(UtcTime::rfc_3339())
                .with_ansi(true);

            let _ = registry.with(layer).try_init();
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::endpoints::{EndpointConfig, HttpServiceConfig};
    use crate::config::settings::{MetricsConfig, ServerConfig, SettingsConfig};
    use crate::config::token::TokenConfig;

    fn config(logging: Option<LoggingConfig>) -> ServiceConfig {
        ServiceConfig {
            settings: SettingsConfig {
                server: ServerConfig { host: "127.0.0.1".to_owned(), port: "0".to_owned() },
                metrics: MetricsConfig::default(),
                logging,
                body_limit_bytes: 1024,
            },
            upstream: HttpServiceConfig {
                endpoint: serde_yaml::from_str::<EndpointConfig>("service_name: 127.0.0.1").unwrap(),
                timeout: None,
            },
            token_service: None,
            gateway_service: None,
            token_config: TokenConfig::default(),
        }
    }

    #[test]
    fn cli_level_overrides_file_level() {
        let cfg = config(Some(LoggingConfig::new("warn".to_owned(), LogFormat::Json)));

        let resolved = resolve(&cfg, Some(LogLevel::DEBUG));
        assert_eq!(resolved.level, "debug");
        assert_eq!(resolved.format, LogFormat::Json);

        assert_eq!(resolve(&cfg, None).level, "warn");
    }

    #[test]
    fn missing_logging_section_falls_back_to_info() {
        let resolved = resolve(&config(None), None);
        assert_eq!(resolved.level, "info");
        assert_eq!(resolved.format, LogFormat::Compact);
    }
}
