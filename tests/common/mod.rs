// tests/common/mod.rs
// Shared fakes for engine tests: scripted source, instant sleeps, fixed clock.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hn_watch::cursor::{CursorStore, MemoryCursorStore};
use hn_watch::engine::{Engine, EngineDeps, EngineSettings};
use hn_watch::gap::{GapDecision, GapPrompt};
use hn_watch::pacing::{Clock, Sleeper};
use hn_watch::render::RecordingOutput;
use hn_watch::source::{Item, ItemSource, MalformedItem, UserSummary};

#[derive(Default)]
pub struct FakeSource {
    items: Mutex<HashMap<i64, Item>>,
    max: Mutex<i64>,
    failures: Mutex<HashMap<i64, u32>>,
    malformed: Mutex<HashSet<i64>>,
    users: Mutex<HashMap<String, UserSummary>>,
    pub item_calls: Mutex<Vec<i64>>,
    pub user_calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with_max(max: i64) -> Self {
        let s = Self::default();
        s.set_max(max);
        s
    }

    pub fn set_max(&self, max: i64) {
        *self.max.lock().unwrap() = max;
    }

    pub fn put(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn put_user(&self, handle: &str, user: UserSummary) {
        self.users.lock().unwrap().insert(handle.to_string(), user);
    }

    /// Next `times` fetches of `id` return a transport error.
    pub fn fail_item(&self, id: i64, times: u32) {
        self.failures.lock().unwrap().insert(id, times);
    }

    /// `id` exists but its body never decodes.
    pub fn put_malformed(&self, id: i64) {
        self.malformed.lock().unwrap().insert(id);
    }

    pub fn item_calls(&self) -> Vec<i64> {
        self.item_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ItemSource for FakeSource {
    async fn fetch_max_id(&self) -> i64 {
        *self.max.lock().unwrap()
    }

    async fn fetch_item(&self, id: i64) -> Result<Option<Item>> {
        self.item_calls.lock().unwrap().push(id);
        if let Some(left) = self.failures.lock().unwrap().get_mut(&id) {
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("connection reset"));
            }
        }
        if self.malformed.lock().unwrap().contains(&id) {
            return Err(anyhow::Error::new(MalformedItem::new("invalid type: string \"eight\", expected i64"))
                .context(format!("item {id}")));
        }
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_user(&self, handle: &str) -> Option<UserSummary> {
        self.user_calls.lock().unwrap().push(handle.to_string());
        self.users.lock().unwrap().get(handle).cloned()
    }

    fn name(&self) -> &'static str {
        "Fake"
    }
}

#[derive(Default)]
pub struct InstantSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

impl InstantSleeper {
    pub fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, d: Duration) {
        self.calls.lock().unwrap().push(d);
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Answers every gap question the same way and records the questions.
pub struct ScriptedPrompt {
    answer: GapDecision,
    pub asked: Mutex<Vec<(i64, i64, i64)>>,
}

impl ScriptedPrompt {
    pub fn answering(answer: GapDecision) -> Self {
        Self {
            answer,
            asked: Mutex::new(vec![]),
        }
    }

    pub fn asked(&self) -> Vec<(i64, i64, i64)> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl GapPrompt for ScriptedPrompt {
    async fn choose(&self, current: i64, max: i64, gap: i64) -> GapDecision {
        self.asked.lock().unwrap().push((current, max, gap));
        self.answer
    }
}

/// Storage that cannot be read at all.
pub struct BrokenStore;

#[async_trait]
impl CursorStore for BrokenStore {
    async fn load(&self) -> Result<i64> {
        Err(anyhow!("permission denied"))
    }

    async fn save(&self, _id: i64) -> bool {
        false
    }
}

pub struct Harness {
    pub source: Arc<FakeSource>,
    pub store: Arc<MemoryCursorStore>,
    pub output: Arc<RecordingOutput>,
    pub prompt: Arc<ScriptedPrompt>,
    pub sleeper: Arc<InstantSleeper>,
}

impl Harness {
    pub fn new(cursor: i64, max: i64) -> Self {
        Self {
            source: Arc::new(FakeSource::with_max(max)),
            store: Arc::new(MemoryCursorStore::with_cursor(cursor)),
            output: Arc::new(RecordingOutput::new()),
            prompt: Arc::new(ScriptedPrompt::answering(GapDecision::Replay)),
            sleeper: Arc::new(InstantSleeper::default()),
        }
    }

    pub fn with_prompt(mut self, answer: GapDecision) -> Self {
        self.prompt = Arc::new(ScriptedPrompt::answering(answer));
        self
    }

    pub fn engine(&self) -> Engine {
        self.engine_with(EngineSettings::default())
    }

    pub fn engine_with(&self, settings: EngineSettings) -> Engine {
        let deps = EngineDeps {
            source: self.source.clone(),
            store: self.store.clone(),
            output: self.output.clone(),
            prompt: self.prompt.clone(),
            clock: Arc::new(FixedClock(fixed_now())),
            sleeper: self.sleeper.clone(),
        };
        Engine::new(deps, settings)
    }

    pub fn saves(&self) -> Vec<i64> {
        self.store.saves.lock().unwrap().clone()
    }
}

pub fn live_story(id: i64, by: &str) -> Item {
    let mut it = Item::story(id, &format!("Story {id}"));
    it.by = Some(by.to_string());
    it.deleted = Some(false);
    it.time = Some(1_714_564_800);
    it
}
