use std::env;

use log::LevelFilter;

pub const ENV_LOG_LEVEL: &str = "LUMEN_LOG";

/// Parse a level name, falling back to `info`
pub fn level_from_str(raw: &str) -> LevelFilter {
    raw.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Route `log` records to stderr. A second call is a no-op.
pub fn init() {
    let level = env::var(ENV_LOG_LEVEL)
        .map(|raw| level_from_str(&raw))
        .unwrap_or(LevelFilter::Info);

    let result = fern::Dispatch::new()
        .level(LevelFilter::Warn)
        .level_for("lumen_downloader", level)
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] [{:<5}] [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr())
        .apply();

    if let Err(e) = result {
        eprintln!("Logger already initialised: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(level_from_str("DEBUG"), LevelFilter::Debug);
        assert_eq!(level_from_str(" warn "), LevelFilter::Warn);
        assert_eq!(level_from_str("off"), LevelFilter::Off);
        assert_eq!(level_from_str("nonsense"), LevelFilter::Info);
        assert_eq!(level_from_str(""), LevelFilter::Info);
    }
}
