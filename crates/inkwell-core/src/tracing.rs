use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset. sqlx logs every statement at `info`,
/// which drowns out request traces.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,sea_orm=warn";

/// JSON log lines on stdout, filtered by `RUST_LOG` (default [`DEFAULT_FILTER`]).
///
/// Only the first call installs a subscriber; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().with_current_span(false))
        .try_init();
}
