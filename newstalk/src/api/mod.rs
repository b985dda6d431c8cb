// Backend contract: wire types, error taxonomy and normalisation

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{Article, Side, Turn, TurnDraft, ANALYST_LABEL};
use crate::personas::PersonaRegistry;

pub mod client;

pub use client::NewsApiClient;

/// Failure talking to the backend. Every variant is recovered the same way
/// by the view; the distinction only matters for logs.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("HTTP request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API reported failure: {0}")]
    Unsuccessful(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// One clustered story group within a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subtopic {
    pub id: String,
    pub title: String,
    pub description: String,
    pub article_count: usize,
    pub latest_article: Option<Article>,
}

/// Articles and (optionally) a backend-made conversation for one subtopic.
#[derive(Debug, Clone)]
pub struct SubtopicData {
    pub subtopic: Option<Subtopic>,
    pub articles: Vec<Article>,
    pub conversation: Vec<TurnDraft>,
}

#[derive(Debug, Clone)]
pub struct NewsResult {
    pub articles: Vec<Article>,
    pub total_articles: usize,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub topic: String,
    pub subtopic: String,
    pub articles: Vec<Article>,
    pub history: Vec<Turn>,
    pub style: common::Style,
}

impl ChatRequest {
    /// Builds the payload, keeping only the last `history_limit` turns.
    pub fn new(
        message: impl Into<String>,
        topic: impl Into<String>,
        subtopic: impl Into<String>,
        articles: &[Article],
        history: &[Turn],
        history_limit: usize,
        style: common::Style,
    ) -> Self {
        let start = history.len().saturating_sub(history_limit);
        Self {
            message: message.into(),
            topic: topic.into(),
            subtopic: subtopic.into(),
            articles: articles.to_vec(),
            history: history[start..].to_vec(),
            style,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire structures

#[derive(Debug, Deserialize)]
pub(crate) struct SubtopicsEnvelope {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub subtopics: Option<Vec<WireSubtopic>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubtopicEnvelope {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub subtopic: Option<WireSubtopic>,
    pub articles: Option<Vec<WireArticle>>,
    #[serde(default)]
    pub conversation: Vec<WireTurn>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatEnvelope {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub response: Option<WireTurn>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewsEnvelope {
    pub success: Option<bool>,
    pub message: Option<String>,
    pub articles: Option<Vec<WireArticle>>,
    pub total_articles: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireSubtopic {
    id: Option<serde_json::Value>,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    article_count: Option<usize>,
    #[serde(default)]
    latest_article: Option<WireArticle>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireArticle {
    #[serde(default)]
    id: Option<serde_json::Value>,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<WireSource>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireSource {
    Name(String),
    Object { name: Option<String> },
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireTurn {
    #[serde(default, alias = "speakerLabel")]
    speaker: Option<String>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default, alias = "sourceArticleRef", rename = "sourceArticle")]
    source_article: Option<serde_json::Value>,
    #[serde(default, rename = "isUser")]
    is_user: Option<bool>,
}

// ---------------------------------------------------------------------------
// Normalisation

pub(crate) fn ensure_success(success: Option<bool>, message: Option<String>) -> Result<(), ApiError> {
    match success {
        Some(true) => Ok(()),
        Some(false) => Err(ApiError::Unsuccessful(
            message.unwrap_or_else(|| "no message".to_string()),
        )),
        None => Err(ApiError::Malformed("missing 'success' flag".to_string())),
    }
}

fn value_to_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Articles without a title are dropped; ids fall back to the URL, then the
/// position in the list.
pub(crate) fn normalize_articles(wire: Vec<WireArticle>) -> Vec<Article> {
    wire.into_iter()
        .enumerate()
        .filter_map(|(idx, a)| normalize_article(a, idx))
        .collect()
}

fn normalize_article(a: WireArticle, idx: usize) -> Option<Article> {
    let title = a.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
    let Some(title) = title else {
        debug!(index = idx, "dropping article without title");
        return None;
    };
    let url = a.url.unwrap_or_default();
    let id = a
        .id
        .as_ref()
        .and_then(value_to_id)
        .or_else(|| (!url.is_empty()).then(|| url.clone()))
        .unwrap_or_else(|| (idx + 1).to_string());
    let source = match a.source {
        Some(WireSource::Name(name)) => name,
        Some(WireSource::Object { name }) => name.unwrap_or_default(),
        None => String::new(),
    };
    Some(Article {
        id,
        title,
        description: a.description.unwrap_or_default().trim().to_string(),
        url,
        source,
        published_at: parse_timestamp(a.published_at.as_deref()),
    })
}

pub(crate) fn normalize_subtopic(s: WireSubtopic) -> Result<Subtopic, ApiError> {
    let id = s
        .id
        .as_ref()
        .and_then(value_to_id)
        .ok_or_else(|| ApiError::Malformed("subtopic without id".to_string()))?;
    let latest_article = s.latest_article.and_then(|a| normalize_article(a, 0));
    Ok(Subtopic {
        title: s.title.unwrap_or_else(|| id.clone()),
        id,
        description: s.description.unwrap_or_default(),
        article_count: s.article_count.unwrap_or(0),
        latest_article,
    })
}

/// Validate one incoming turn.
///
/// Text is required. A known persona keeps its own side; otherwise the
/// backend's side is used, then `default_side`. User turns are always right.
pub(crate) fn normalize_turn(
    t: WireTurn,
    registry: &PersonaRegistry,
    default_side: Side,
) -> Result<TurnDraft, ApiError> {
    let text = t
        .text
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Malformed("turn without text".to_string()))?;

    if t.is_user.unwrap_or(false) {
        let mut draft = TurnDraft::user(text);
        if let Some(ts) = parse_timestamp(t.timestamp.as_deref()) {
            draft.timestamp = ts;
        }
        return Ok(draft);
    }

    let speaker = t
        .speaker
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| ANALYST_LABEL.to_string());

    let side = match registry.find_by_label(&speaker) {
        Some(persona) => persona.side_affinity,
        None => match t.side.as_deref().map(str::trim) {
            Some("left") => Side::Left,
            Some("right") => Side::Right,
            _ => default_side,
        },
    };

    let mut draft = TurnDraft::persona(speaker, side, text);
    if let Some(ts) = parse_timestamp(t.timestamp.as_deref()) {
        draft.timestamp = ts;
    }
    draft.source_article = t.source_article.as_ref().and_then(value_to_id);
    Ok(draft)
}

/// Lenient list variant: invalid turns are skipped, positions drive the
/// default side.
pub(crate) fn normalize_conversation(wire: Vec<WireTurn>, registry: &PersonaRegistry) -> Vec<TurnDraft> {
    wire.into_iter()
        .enumerate()
        .filter_map(|(idx, t)| match normalize_turn(t, registry, Side::for_position(idx)) {
            Ok(draft) => Some(draft),
            Err(e) => {
                debug!(index = idx, error = %e, "skipping backend turn");
                None
            }
        })
        .collect()
}
