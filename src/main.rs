//! hn-watch binary entrypoint.
//! Loads config, wires the engine and walks until interrupted.
//!
//! Exit status: 0 on Ctrl-C, 1 when the cursor storage is unusable or the
//! source keeps failing.

use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hn_watch::{RunOutcome, WatchConfig};

/// Logs go to stderr so stdout stays the story feed.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hn_watch=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("hn-watch: cannot start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    hn_watch::block_on_detached(rt, run())
}

async fn run() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match WatchConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("hn-watch: invalid configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = match hn_watch::build_engine(&cfg).await {
        Ok(e) => e,
        Err(e) => {
            eprintln!("hn-watch: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };
    match hn_watch::run_until_interrupted(&mut engine, interrupt).await {
        RunOutcome::Interrupted => {
            eprintln!("\ninterrupted, cursor kept in {}", cfg.state_path.display());
            ExitCode::SUCCESS
        }
        RunOutcome::Failed(e) => {
            eprintln!("\nhn-watch: {e:#}");
            ExitCode::FAILURE
        }
    }
}
