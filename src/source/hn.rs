use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, Url};
use std::time::Duration;

use crate::source::types::{Item, ItemSource, MalformedItem, UserSummary, MAX_ID_UNKNOWN};

pub const DEFAULT_API_BASE: &str = "https://hacker-news.firebaseio.com/v0";

/// Parse the `maxitem.json` body. Anything other than a non-negative
/// integer maps to [`MAX_ID_UNKNOWN`].
pub fn parse_max_id(body: &str) -> i64 {
    match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(serde_json::Value::Number(n)) => n
            .as_i64()
            .filter(|v| *v >= 0)
            .unwrap_or(MAX_ID_UNKNOWN),
        _ => MAX_ID_UNKNOWN,
    }
}

/// Parse an `item/<id>.json` body. JSON `null` is a hole.
pub fn parse_item(body: &str) -> std::result::Result<Option<Item>, MalformedItem> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|e| MalformedItem::new(format!("{e}, body: {trimmed}")))
}

/// Parse a `user/<handle>.json` body; missing or malformed users are `None`.
pub fn parse_user(body: &str) -> Option<UserSummary> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Read-only client for the Hacker News Firebase API.
#[derive(Clone)]
pub struct HnClient {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HnClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("hn-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout: Duration::from_secs(10),
        })
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` plus `segments`, each one percent-encoded as a single path segment.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid api base url {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("api base url {} cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, segments: &[&str]) -> Result<String> {
        let url = self.endpoint(segments)?;
        let t0 = std::time::Instant::now();
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned HTTP {status}"));
        }
        let body = resp
            .text()
            .await
            .with_context(|| format!("read body of {url}"))?;
        histogram!("hn_watch_request_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        Ok(body)
    }
}

#[async_trait]
impl ItemSource for HnClient {
    async fn fetch_max_id(&self) -> i64 {
        match self.get_text(&["maxitem.json"]).await {
            Ok(body) => {
                let max = parse_max_id(&body);
                if max == MAX_ID_UNKNOWN {
                    tracing::warn!(body = %body.trim(), "maxitem body is not an id");
                }
                max
            }
            Err(e) => {
                tracing::warn!(error = ?e, "maxitem request failed");
                MAX_ID_UNKNOWN
            }
        }
    }

    async fn fetch_item(&self, id: i64) -> Result<Option<Item>> {
        let body = self.get_text(&["item", &format!("{id}.json")]).await?;
        parse_item(&body).map_err(|e| anyhow::Error::new(e).context(format!("item {id}")))
    }

    async fn fetch_user(&self, handle: &str) -> Option<UserSummary> {
        match self.get_text(&["user", &format!("{handle}.json")]).await {
            Ok(body) => parse_user(&body),
            Err(e) => {
                tracing::debug!(error = ?e, user = handle, "user lookup failed");
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "HackerNews"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::types::ItemKind;

    #[test]
    fn max_id_accepts_integers_only() {
        assert_eq!(parse_max_id("41234567\n"), 41_234_567);
        assert_eq!(parse_max_id("0"), 0);
        assert_eq!(parse_max_id("null"), MAX_ID_UNKNOWN);
        assert_eq!(parse_max_id("\"123\""), MAX_ID_UNKNOWN);
        assert_eq!(parse_max_id("12.5"), MAX_ID_UNKNOWN);
        assert_eq!(parse_max_id("-4"), MAX_ID_UNKNOWN);
        assert_eq!(parse_max_id("<html>"), MAX_ID_UNKNOWN);
    }

    #[test]
    fn null_item_is_a_hole() {
        assert_eq!(parse_item("null").unwrap(), None);
        assert_eq!(parse_item("  ").unwrap(), None);
    }

    #[test]
    fn unknown_type_does_not_fail() {
        let it = parse_item(r#"{"id": 7, "type": "podcast"}"#).unwrap().unwrap();
        assert_eq!(it.kind, Some(ItemKind::Other));
    }

    #[test]
    fn user_handle_is_one_encoded_segment() {
        let c = HnClient::new("https://example.test/v0").unwrap();
        let url = c.endpoint(&["user", "a/b?c d.json"]).unwrap();
        assert_eq!(url.as_str(), "https://example.test/v0/user/a%2Fb%3Fc%20d.json");
        let url = c.endpoint(&["item", "8863.json"]).unwrap();
        assert_eq!(url.as_str(), "https://example.test/v0/item/8863.json");
    }

    #[test]
    fn undecodable_item_is_malformed() {
        let err = parse_item(r#"{"id": "eight"}"#).unwrap_err();
        assert!(err.to_string().starts_with("malformed item record"));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let c = HnClient::new("https://example.test/v0/").unwrap();
        assert_eq!(c.base_url(), "https://example.test/v0");
    }
}
