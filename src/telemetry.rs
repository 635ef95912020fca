use anyhow::Context;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

const DEFAULT_FILTER: &str = "info,notifier=debug";

/// Installs the global subscriber. `RUST_LOG` overrides the default filter;
/// production emits JSON lines, everything else human-readable output.
pub fn init_tracing(app: &AppConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("invalid tracing filter")?;

    let registry = tracing_subscriber::registry().with(filter);
    if app.is_production() {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(false))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .try_init()
    }
    .context("failed to install tracing subscriber")
}
