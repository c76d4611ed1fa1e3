use parley_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Base filter: `RUST_LOG` wins, then `logging.level`, then `--verbose`.
/// Per-crate `logging.filters` are appended.
fn filter_directives(env: Option<&str>, config: &LoggingConfig, verbose: bool) -> String {
    let base = match (env, &config.level) {
        (Some(env), _) if !env.trim().is_empty() => env.to_string(),
        (_, Some(level)) => level.clone(),
        _ if verbose => "debug".to_string(),
        _ => "info".to_string(),
    };
    std::iter::once(base)
        .chain(config.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn init(config: &LoggingConfig, verbose: bool) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = EnvFilter::try_new(filter_directives(env.as_deref(), config, verbose))?;
    let json = config.format.eq_ignore_ascii_case("json");
    let stdout = config.output.eq_ignore_ascii_case("stdout");

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match (json, stdout) {
        (true, true) => builder.json().with_writer(std::io::stdout).try_init(),
        (true, false) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, true) => builder.with_writer(std::io::stdout).try_init(),
        (false, false) => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))
}
