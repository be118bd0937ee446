use std::sync::Once;

use log::LevelFilter;

static LOG_ONCE: Once = Once::new();

const DEFAULT_FILTER: &str = "info";

/// Pick the filter directives: `VOLTLOG_LOG` first, then `RUST_LOG`, then info.
/// Blank values count as unset. Both accept full `env_logger` directives such as
/// `voltlog=debug,serialport=warn`.
fn env_filter(voltlog: Option<String>, rust: Option<String>) -> String {
    [voltlog, rust]
        .into_iter()
        .flatten()
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Parse a level name, ignoring case. Unknown names yield `None`.
pub fn parse_level(input: Option<&str>) -> Option<LevelFilter> {
    input.and_then(|s| s.parse::<LevelFilter>().ok())
}

/// Initialize stderr logging from `level` when given, else from
/// `VOLTLOG_LOG`/`RUST_LOG`. Safe to call multiple times; only the first call
/// installs the logger.
pub fn init_logging(level: Option<&str>) {
    let explicit = parse_level(level);
    LOG_ONCE.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match explicit {
            Some(level) => {
                builder.filter_level(level);
            }
            None => {
                let filter = env_filter(
                    std::env::var("VOLTLOG_LOG").ok(),
                    std::env::var("RUST_LOG").ok(),
                );
                builder.parse_filters(&filter);
            }
        }
        builder
            .format_timestamp_millis()
            .format_module_path(true)
            .format_target(true)
            .init();
    });
}
