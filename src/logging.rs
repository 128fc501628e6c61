use log::LevelFilter;
use std::io::Write;

/// Install the process-wide `env_logger` backend.
///
/// `level` is the default; `RUST_LOG` directives take precedence. Calling this
/// more than once keeps the first logger.
pub fn init_logging(level: LevelFilter) {
    let result = env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, level)
        .parse_default_env()
        .try_init();

    if let Err(e) = result {
        eprintln!("Logger already initialized: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice_does_not_panic() {
        init_logging(LevelFilter::Debug);
        init_logging(LevelFilter::Info);
        log::info!("logging initialized");
    }
}
