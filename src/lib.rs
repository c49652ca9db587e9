// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod backoff;
pub mod classify;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod gap;
pub mod pacing;
pub mod render;
pub mod source;

// ---- Re-exports for stable public API ----
pub use crate::config::WatchConfig;
pub use crate::engine::{Engine, EngineDeps, EngineSettings, State};

use std::future::Future;
use std::sync::Arc;

use crate::cursor::FileCursorStore;
use crate::gap::StdinPrompt;
use crate::pacing::{SystemClock, TokioSleeper};
use crate::render::ConsoleOutput;
use crate::source::HnClient;

/// Wire the production engine: HTTP source, file cursor, console output,
/// stdin prompt, real clock and sleeps.
pub async fn build_engine(cfg: &WatchConfig) -> anyhow::Result<Engine> {
    let source = HnClient::new(cfg.api_base_url.clone())?.with_timeout(cfg.request_timeout_secs);
    let store = FileCursorStore::open(cfg.state_path.clone(), cfg.cursor_key.clone()).await?;
    tracing::info!(
        api = source.base_url(),
        state = %store.path().display(),
        idle_secs = cfg.idle_interval_secs,
        gap_mode = ?cfg.gap_mode,
        "hn-watch configured"
    );
    let deps = EngineDeps {
        source: Arc::new(source),
        store: Arc::new(store),
        output: Arc::new(ConsoleOutput),
        prompt: Arc::new(StdinPrompt),
        clock: Arc::new(SystemClock),
        sleeper: Arc::new(TokioSleeper),
    };
    Ok(Engine::new(deps, EngineSettings::from_config(cfg)))
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Interrupted,
    Failed(anyhow::Error),
}

/// Walk until `interrupt` resolves or the engine hits a fatal error.
/// An interrupt wins even while the engine is parked in the gap prompt.
pub async fn run_until_interrupted<I>(engine: &mut Engine, interrupt: I) -> RunOutcome
where
    I: Future<Output = ()>,
{
    tokio::select! {
        err = engine.run() => RunOutcome::Failed(err),
        _ = interrupt => RunOutcome::Interrupted,
    }
}

/// Drive `fut` on `rt`, then drop the runtime without joining blocking
/// tasks. A stdin read left behind by the gap prompt never finishes on its
/// own, so waiting for it would keep the process alive after Ctrl-C.
pub fn block_on_detached<F: Future>(rt: tokio::runtime::Runtime, fut: F) -> F::Output {
    let out = rt.block_on(fut);
    rt.shutdown_background();
    out
}
