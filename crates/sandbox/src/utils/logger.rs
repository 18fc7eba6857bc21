use sandbox_config::logger::{LoggerConfig, LoggerFormat};
use tracing_subscriber::EnvFilter;

const WHITELISTED_CRATES: &[&str] = &[
    "sandbox",
    "sandbox_config",
    "sandbox_executor",
    "sandbox_runtime",
];

pub(crate) fn default_env_filter(level: &str) -> String {
    let mut filters: Vec<String> = WHITELISTED_CRATES
        .iter()
        .map(|crate_name| format!("{crate_name}={level}"))
        .collect();

    // Set default level for all other crates to warn
    filters.insert(0, "warn".to_string());

    filters.join(",")
}

/// Installs the global subscriber. Logs go to stderr so stdout only carries
/// script output and the result envelope.
pub(crate) fn init_logger(cfg: &LoggerConfig, verbose: u8, quiet: bool) {
    if !cfg.enabled && verbose == 0 {
        return;
    }

    let level = cfg.level.adjusted(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_env_filter(level.as_str())));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(cfg.colors)
        .with_target(verbose > 0);

    let result = match cfg.format {
        LoggerFormat::Compact => builder.compact().try_init(),
        LoggerFormat::Pretty => builder.pretty().try_init(),
        LoggerFormat::Json => builder.json().try_init(),
    };

    if let Err(e) = result {
        eprintln!("sandbox: Failed initializing logger: {e:?}");
    }
}
