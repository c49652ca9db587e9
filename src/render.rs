// src/render.rs
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::io::Write;
use std::sync::Mutex;

use crate::source::{Item, UserSummary};

pub const UNKNOWN: &str = "UNKNOWN";
const SNIPPET_MAX_CHARS: usize = 280;

/// Counters shown under every story.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkCounters {
    pub displayed: u64,
    pub skipped: u64,
    pub scanned: i64,
}

/// Everything printed for one story, already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryView {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub url: Option<String>,
    pub snippet: Option<String>,
    pub author: String,
    pub author_joined: String,
    pub author_karma: String,
    pub posted_at: String,
    pub score: Option<i64>,
    pub counters: WalkCounters,
}

impl StoryView {
    pub fn build(item: &Item, author: Option<&UserSummary>, counters: WalkCounters) -> Self {
        let title = item
            .title
            .as_deref()
            .map(|t| html_escape::decode_html_entities(t).trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "(untitled)".to_string());
        let snippet = item
            .text
            .as_deref()
            .map(normalize_text)
            .filter(|s| !s.is_empty());

        Self {
            id: item.id,
            title,
            link: item_link(item.id),
            url: item.url.clone().filter(|u| !u.trim().is_empty()),
            snippet,
            author: item.by.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            author_joined: author
                .and_then(|u| u.created)
                .map(format_date)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            author_karma: author
                .and_then(|u| u.karma)
                .map(|k| k.to_string())
                .unwrap_or_else(|| UNKNOWN.to_string()),
            posted_at: item
                .time
                .map(format_timestamp)
                .unwrap_or_else(|| UNKNOWN.to_string()),
            score: item.score,
            counters,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n#{} {}\n", self.id, self.title));
        out.push_str(&format!("  {}\n", self.link));
        match &self.url {
            Some(u) => out.push_str(&format!("  {u}\n")),
            None => out.push_str("  (text post)\n"),
        }
        if let Some(s) = &self.snippet {
            out.push_str(&format!("  {s}\n"));
        }
        out.push_str(&format!(
            "  by {} (joined {}, karma {})\n",
            self.author, self.author_joined, self.author_karma
        ));
        let score = self
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        out.push_str(&format!("  posted {} · score {}\n", self.posted_at, score));
        out.push_str(&format!(
            "  [shown {} · skipped {} · scanned {}]\n",
            self.counters.displayed, self.counters.skipped, self.counters.scanned
        ));
        out
    }
}

pub fn item_link(id: i64) -> String {
    format!("https://news.ycombinator.com/item?id={id}")
}

pub fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn format_date(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

/// Story bodies arrive as HTML: decode entities, strip tags, collapse
/// whitespace, cap the length.
pub fn normalize_text(s: &str) -> String {
    // paragraphs become spaces before tags are stripped
    static RE_BREAK: OnceCell<regex::Regex> = OnceCell::new();
    let re_break = RE_BREAK.get_or_init(|| regex::Regex::new(r"(?i)<p>|<br\s*/?>").unwrap());
    let out = re_break.replace_all(s, " ");

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let out = re_tags.replace_all(&out, "");

    let out = html_escape::decode_html_entities(&out).to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    let out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > SNIPPET_MAX_CHARS {
        let mut cut: String = out.chars().take(SNIPPET_MAX_CHARS).collect();
        cut.push('…');
        cut
    } else {
        out
    }
}

/// Where stories and the idle indicator go.
pub trait StoryOutput: Send + Sync {
    fn show_story(&self, story: &StoryView);
    fn show_idle(&self, checked_at: DateTime<Utc>);
    fn clear_idle(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleOutput;

impl StoryOutput for ConsoleOutput {
    fn show_story(&self, story: &StoryView) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(story.to_text().as_bytes());
        let _ = out.flush();
    }

    fn show_idle(&self, checked_at: DateTime<Utc>) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\rlast checked at {}", checked_at.format("%H:%M:%S"));
        let _ = out.flush();
    }

    fn clear_idle(&self) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, "\r\x1b[2K");
        let _ = out.flush();
    }
}

/// What the engine emitted, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    Story(StoryView),
    Idle(DateTime<Utc>),
    IdleCleared,
}

// --- Test helper ---
#[derive(Debug, Default)]
pub struct RecordingOutput {
    pub events: Mutex<Vec<OutputEvent>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stories(&self) -> Vec<StoryView> {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter_map(|e| match e {
                OutputEvent::Story(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, ev: OutputEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(ev);
    }
}

impl StoryOutput for RecordingOutput {
    fn show_story(&self, story: &StoryView) {
        self.push(OutputEvent::Story(story.clone()));
    }

    fn show_idle(&self, checked_at: DateTime<Utc>) {
        self.push(OutputEvent::Idle(checked_at));
    }

    fn clear_idle(&self) {
        self.push(OutputEvent::IdleCleared);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_and_entities() {
        let s = "<p>Hello&nbsp;&nbsp; <i>world</i>&#x27;s<p>second   para";
        assert_eq!(normalize_text(s), "Hello world's second para");
    }

    #[test]
    fn long_text_is_capped() {
        let s = "a".repeat(1000);
        let out = normalize_text(&s);
        assert_eq!(out.chars().count(), SNIPPET_MAX_CHARS + 1);
        assert!(out.ends_with('…'));
    }

    #[test]
    fn missing_enrichment_reads_unknown() {
        let mut item = Item::story(42, "Show HN: &quot;thing&quot;");
        item.by = Some("alice".into());
        item.time = Some(0);
        let v = StoryView::build(&item, None, WalkCounters::default());
        assert_eq!(v.title, "Show HN: \"thing\"");
        assert_eq!(v.author_joined, UNKNOWN);
        assert_eq!(v.author_karma, UNKNOWN);
        assert_eq!(v.posted_at, "1970-01-01 00:00:00 UTC");
        assert_eq!(v.link, "https://news.ycombinator.com/item?id=42");

        let partial = UserSummary {
            created: None,
            karma: Some(12),
        };
        let v = StoryView::build(&item, Some(&partial), WalkCounters::default());
        assert_eq!(v.author_joined, UNKNOWN);
        assert_eq!(v.author_karma, "12");
    }

    #[test]
    fn text_block_mentions_counters() {
        let item = Item::story(7, "t");
        let v = StoryView::build(
            &item,
            None,
            WalkCounters {
                displayed: 3,
                skipped: 1,
                scanned: 9,
            },
        );
        let txt = v.to_text();
        assert!(txt.contains("(text post)"));
        assert!(txt.contains("shown 3 · skipped 1 · scanned 9"));
    }
}
