pub mod acquire;
pub mod config;
pub mod error;
pub mod fs;
pub mod identity;
pub mod metrics;
pub mod record;
pub mod screener;
pub mod session;
pub mod sink;
pub(crate) mod sql;
pub(crate) mod tui;
pub mod validate;

pub use error::{Error, Result};

/// Shortcut for required API elements.
pub(crate) mod http {
    pub(crate) use deadpool_postgres::Pool as PgPool;
    pub(crate) use reqwest::Client as HttpClient;
}

/// Format the time elapsed since `time` for trailing log messages.
pub(crate) fn time_elapsed(time: std::time::Instant) -> String {
    format!(
        "\x1b[38;5;208melapsed time: {} ms\x1b[0m",
        time.elapsed().as_millis()
    )
}
