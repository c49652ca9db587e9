//! # Poll engine
//! Walks the item ID space from a persisted cursor, one ID at a time.
//!
//! States: `Resume` → (`GapConfirm`) → `Walk` ⇄ `IdleWait`. Every network
//! call, sleep and prompt goes through an injected dependency so the whole
//! machine can be stepped in tests without delays or sockets.
//!
//! The cursor is written after an item has been fetched and classified.
//! Holes and idle waits never write it.

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::classify::is_displayable;
use crate::config::WatchConfig;
use crate::cursor::CursorStore;
use crate::gap::{self, GapAssessment, GapDecision, GapMode, GapPrompt};
use crate::pacing::{Clock, Sleeper};
use crate::render::{StoryOutput, StoryView, WalkCounters};
use crate::source::{Item, ItemSource, MalformedItem, MAX_ID_UNKNOWN};

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("hn_watch_items_scanned_total", "Items fetched and classified.");
        describe_counter!("hn_watch_stories_displayed_total", "Stories rendered.");
        describe_counter!("hn_watch_holes_skipped_total", "IDs with no record below the max.");
        describe_counter!("hn_watch_idle_waits_total", "Idle sleeps after catching up.");
        describe_counter!("hn_watch_fetch_retries_total", "Item fetch retries.");
        describe_counter!("hn_watch_items_malformed_total", "Records skipped as undecodable.");
        describe_gauge!("hn_watch_cursor", "Last persisted cursor.");
        describe_histogram!("hn_watch_request_ms", "Source request time in milliseconds.");
    });
}

/// Where the engine is; `step` returns the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Resume,
    GapConfirm { max_id: i64, gap: i64 },
    Walk,
    IdleWait,
}

/// Pacing, gap and retry knobs, usually taken from [`WatchConfig`].
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub idle_interval: Duration,
    pub gap_threshold: i64,
    pub gap_grace: Duration,
    pub gap_mode: GapMode,
    pub retry: RetryPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&WatchConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(cfg: &WatchConfig) -> Self {
        Self {
            idle_interval: cfg.idle_interval(),
            gap_threshold: cfg.gap_threshold,
            gap_grace: cfg.gap_grace(),
            gap_mode: cfg.gap_mode,
            retry: cfg.retry_policy(),
        }
    }
}

/// Everything the engine talks to. Tests swap each one for a fake.
pub struct EngineDeps {
    pub source: Arc<dyn ItemSource>,
    pub store: Arc<dyn CursorStore>,
    pub output: Arc<dyn StoryOutput>,
    pub prompt: Arc<dyn GapPrompt>,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
}

/// Resume/walk state machine over the item ID space.
pub struct Engine {
    deps: EngineDeps,
    settings: EngineSettings,
    state: State,
    id: i64,
    start_id: i64,
    displayed: u64,
    skipped: u64,
    last_max: i64,
}

impl Engine {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> Self {
        ensure_metrics_described();
        Self {
            deps,
            settings,
            state: State::Resume,
            id: 0,
            start_id: 0,
            displayed: 0,
            skipped: 0,
            last_max: MAX_ID_UNKNOWN,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Next ID the walk will fetch.
    pub fn position(&self) -> i64 {
        self.id
    }

    pub fn start_id(&self) -> i64 {
        self.start_id
    }

    pub fn last_max(&self) -> i64 {
        self.last_max
    }

    pub fn counters(&self) -> WalkCounters {
        WalkCounters {
            displayed: self.displayed,
            skipped: self.skipped,
            scanned: self.id - self.start_id,
        }
    }

    /// Run until a fatal error, which is returned. There is no normal exit.
    pub async fn run(&mut self) -> anyhow::Error {
        loop {
            if let Err(e) = self.step().await {
                return e;
            }
        }
    }

    /// Execute the current state's action once and move to the next state.
    pub async fn step(&mut self) -> Result<State> {
        let next = match self.state {
            State::Resume => self.resume().await?,
            State::GapConfirm { max_id, gap } => self.confirm_gap(max_id, gap).await,
            State::Walk => self.walk().await?,
            State::IdleWait => self.idle().await,
        };
        self.state = next;
        Ok(next)
    }

    async fn resume(&mut self) -> Result<State> {
        let cursor = self
            .deps
            .store
            .load()
            .await
            .context("cursor storage is unavailable")?;

        // One snapshot of the max serves both the start point and the gap.
        let max = self.deps.source.fetch_max_id().await;
        self.last_max = max;

        if cursor >= 0 {
            self.id = cursor;
        } else if max != MAX_ID_UNKNOWN {
            self.id = max;
        } else {
            warn!(
                source = self.deps.source.name(),
                "no cursor and max id unavailable, retrying after idle interval"
            );
            self.deps.sleeper.sleep(self.settings.idle_interval).await;
            return Ok(State::Resume);
        }
        if max == MAX_ID_UNKNOWN {
            warn!(id = self.id, "max id unavailable at resume, skipping gap check");
        }

        self.start_id = self.id;
        match gap::assess(self.id, max, self.settings.gap_threshold) {
            GapAssessment::Exceeds { gap } => {
                info!(id = self.id, max_id = max, gap, "large gap since last run");
                Ok(State::GapConfirm { max_id: max, gap })
            }
            GapAssessment::Within { gap } => {
                info!(id = self.id, max_id = max, gap, cursor, "resuming walk");
                Ok(State::Walk)
            }
        }
    }

    async fn confirm_gap(&mut self, max_id: i64, gap: i64) -> State {
        let decision = match self.settings.gap_mode.preset() {
            Some(d) => d,
            None => self.deps.prompt.choose(self.id, max_id, gap).await,
        };
        self.id = gap::resolve(decision, self.id, max_id);
        self.start_id = self.id;
        match decision {
            GapDecision::Replay => info!(id = self.id, gap, "replaying backlog"),
            GapDecision::FastForward => info!(id = self.id, gap, "fast-forwarded past backlog"),
        }
        // grace period so the operator can still abort
        self.deps.sleeper.sleep(self.settings.gap_grace).await;
        State::Walk
    }

    async fn walk(&mut self) -> Result<State> {
        let id = self.id;
        match self.fetch_with_retry(id).await? {
            Fetched::Hole => {
                let max = self.deps.source.fetch_max_id().await;
                self.last_max = max;
                if max != MAX_ID_UNKNOWN && id < max {
                    debug!(id, max_id = max, "hole, skipping");
                    self.skipped += 1;
                    self.id += 1;
                    counter!("hn_watch_holes_skipped_total").increment(1);
                    return Ok(State::Walk);
                }
                debug!(id, max_id = max, "caught up");
                return Ok(State::IdleWait);
            }
            Fetched::Malformed(reason) => {
                // the record exists, so it is walked past like a hidden item
                warn!(id, %reason, "skipping undecodable item");
                counter!("hn_watch_items_malformed_total").increment(1);
            }
            Fetched::Item(item) => {
                counter!("hn_watch_items_scanned_total").increment(1);
                if is_displayable(&item) {
                    self.display(&item).await;
                } else {
                    debug!(id, kind = ?item.kind, "not displayable");
                }
            }
        }

        if self.deps.store.save(id).await {
            gauge!("hn_watch_cursor").set(id as f64);
        } else {
            warn!(id, "cursor not saved");
        }
        self.id = id + 1;
        Ok(State::Walk)
    }

    async fn idle(&mut self) -> State {
        counter!("hn_watch_idle_waits_total").increment(1);
        self.deps.output.show_idle(self.deps.clock.now());
        self.deps.sleeper.sleep(self.settings.idle_interval).await;
        self.deps.output.clear_idle();
        State::Walk
    }

    async fn display(&mut self, item: &Item) {
        let author = match item.by.as_deref() {
            Some(handle) if !handle.is_empty() => self.deps.source.fetch_user(handle).await,
            _ => None,
        };
        self.displayed += 1;
        let view = StoryView::build(item, author.as_ref(), self.counters());
        self.deps.output.show_story(&view);
        counter!("hn_watch_stories_displayed_total").increment(1);
    }

    /// Transport errors are retried with backoff; an undecodable record is
    /// returned at once since refetching yields the same bytes.
    async fn fetch_with_retry(&self, id: i64) -> Result<Fetched> {
        let policy = self.settings.retry;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.deps.source.fetch_item(id).await {
                Ok(Some(item)) => return Ok(Fetched::Item(item)),
                Ok(None) => return Ok(Fetched::Hole),
                Err(e) if e.downcast_ref::<MalformedItem>().is_some() => {
                    return Ok(Fetched::Malformed(format!("{e:#}")))
                }
                Err(e) if policy.should_retry(attempt) => {
                    let delay = policy.delay_after(attempt);
                    warn!(id, attempt, delay_ms = delay.as_millis() as u64, error = ?e, "item fetch failed, retrying");
                    counter!("hn_watch_fetch_retries_total").increment(1);
                    self.deps.sleeper.sleep(delay).await;
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("fetching item {id} failed {attempt} times"))
                }
            }
        }
    }
}

enum Fetched {
    Item(Item),
    Hole,
    Malformed(String),
}
