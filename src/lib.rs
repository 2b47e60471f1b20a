//! Babe Coffee Shop POS - register core.
//!
//! The register runs entirely against a local SQLite database: the
//! in-progress order, the sales ledger, receipts, and the cached product
//! catalog all live on the machine. The backend API covers accounts and
//! catalog sync; losing it never stops a sale.

use std::path::Path;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod catalog;
pub mod db;
pub mod ledger;
pub mod orders;
pub mod payments;
pub mod receipts;

pub use db::DbState;

/// Initialize structured logging (console + daily rolling file).
///
/// `RUST_LOG` overrides the default filter. Calling this a second time
/// does nothing.
pub fn init_logging(log_dir: &Path) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,babe_pos=debug"));

    std::fs::create_dir_all(log_dir).ok();

    let file_appender = tracing_appender::rolling::daily(log_dir, "pos");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok();

    if installed {
        // Dropping the guard stops the background writer. The register
        // logs until process exit, so the guard is leaked.
        std::mem::forget(guard);
        info!("Babe POS core v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
}
