//! # Gap policy
//! Decides what to do when the resume point lags far behind the newest ID.
//! The arithmetic is pure; asking the operator goes through [`GapPrompt`].

use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};

pub const DEFAULT_GAP_THRESHOLD: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapDecision {
    /// Walk the whole backlog from the resume point.
    Replay,
    /// Jump to the current maximum and drop the backlog.
    FastForward,
}

/// Configured handling of a large gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapMode {
    #[default]
    Ask,
    Replay,
    FastForward,
}

impl GapMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ask" => Some(Self::Ask),
            "replay" => Some(Self::Replay),
            "fast_forward" | "skip" => Some(Self::FastForward),
            _ => None,
        }
    }

    /// Decision fixed by configuration, `None` when the operator must choose.
    pub fn preset(self) -> Option<GapDecision> {
        match self {
            Self::Ask => None,
            Self::Replay => Some(GapDecision::Replay),
            Self::FastForward => Some(GapDecision::FastForward),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapAssessment {
    Within { gap: i64 },
    Exceeds { gap: i64 },
}

/// Gap between `current` and `max`. A negative `max` is the unknown sentinel
/// and never produces a confirmation.
pub fn assess(current: i64, max: i64, threshold: i64) -> GapAssessment {
    if max < 0 {
        return GapAssessment::Within { gap: 0 };
    }
    let gap = max - current;
    if gap > threshold {
        GapAssessment::Exceeds { gap }
    } else {
        GapAssessment::Within { gap }
    }
}

/// Working ID after applying `decision`.
pub fn resolve(decision: GapDecision, current: i64, max: i64) -> i64 {
    match decision {
        GapDecision::Replay => current,
        GapDecision::FastForward if max > current => max,
        GapDecision::FastForward => current,
    }
}

#[async_trait::async_trait]
pub trait GapPrompt: Send + Sync {
    async fn choose(&self, current: i64, max: i64, gap: i64) -> GapDecision;
}

/// Asks on stdin. Only an answer starting with `y` replays; anything else,
/// including EOF or a read error, fast-forwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

pub fn parse_answer(line: &str) -> GapDecision {
    if line.trim_start().to_ascii_lowercase().starts_with('y') {
        GapDecision::Replay
    } else {
        GapDecision::FastForward
    }
}

#[async_trait::async_trait]
impl GapPrompt for StdinPrompt {
    async fn choose(&self, current: i64, max: i64, gap: i64) -> GapDecision {
        let question = format!(
            "{gap} items were published since the last run (#{current} .. #{max}). Replay them all? [y/N] "
        );
        let answer = tokio::task::spawn_blocking(move || {
            let mut out = std::io::stdout();
            let _ = out.write_all(question.as_bytes());
            let _ = out.flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "could not read answer, fast-forwarding");
                GapDecision::FastForward
            }
            Err(e) => {
                tracing::warn!(error = %e, "prompt task failed, fast-forwarding");
                GapDecision::FastForward
            }
        }
    }
}
