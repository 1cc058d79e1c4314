use crate::config::AppConfig;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber: a rolling file layer plus a console layer
/// on stderr. Stdout is left to trial reports.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (subscriber, guard) = build_subscriber(config);
    subscriber.init();
    guard
}

/// Builds the subscriber without installing it.
pub fn build_subscriber(config: &AppConfig) -> (Box<dyn Subscriber + Send + Sync>, WorkerGuard) {
    let file_appender = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let registry = tracing_subscriber::registry().with(filter);

    let subscriber: Box<dyn Subscriber + Send + Sync> = if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true) // correctness events are selected by target
            .with_writer(non_blocking)
            .with_ansi(false);
        let stderr_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_ansi(true);
        Box::new(registry.with(file_layer).with(stderr_layer))
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stderr_layer = fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_ansi(true);
        Box::new(registry.with(file_layer).with(stderr_layer))
    };

    (subscriber, guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_one_event(tag: &str, use_json: bool) -> String {
        let dir = PathBuf::from(format!("target/test_logging_{}_{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        let config = AppConfig {
            log_level: "info".to_string(),
            log_dir: dir.display().to_string(),
            log_file: "bench.log".to_string(),
            use_json,
            rotation: "never".to_string(),
            ..AppConfig::default()
        };

        let (subscriber, guard) = build_subscriber(&config);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "correctness", cell = "x", "trial finished");
        });
        drop(guard);

        let text = fs::read_to_string(dir.join("bench.log")).unwrap();
        let _ = fs::remove_dir_all(&dir);
        text
    }

    #[test]
    fn test_plain_subscriber_writes_file() {
        let text = write_one_event("plain", false);
        assert!(text.contains("trial finished"), "{}", text);
    }

    #[test]
    fn test_json_subscriber_keeps_target() {
        let text = write_one_event("json", true);
        let line = text.lines().next().unwrap();
        let event: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(event["target"], "correctness");
        assert_eq!(event["fields"]["message"], "trial finished");
    }
}
