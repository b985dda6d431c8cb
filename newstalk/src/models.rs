use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A news article as delivered by an article source. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    #[serde(rename = "publishedAt")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// True when both title and description carry text.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.description.trim().is_empty()
    }
}

/// Bubble placement. Layout only, not a semantic stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Positional alternation: even index => left, odd => right.
    pub fn for_position(index: usize) -> Self {
        if index % 2 == 0 {
            Side::Left
        } else {
            Side::Right
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Speaker label used for system / analyst turns.
pub const ANALYST_LABEL: &str = "News Analyst";

/// Speaker label used for turns typed by the reader.
pub const USER_LABEL: &str = "You";

/// One attributed message of a conversation.
///
/// Turns are immutable once created. `id` is assigned by the owning
/// [`Conversation`] and totally orders the sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: u64,
    #[serde(rename = "speaker")]
    pub speaker_label: String,
    pub side: Side,
    pub text: String,
    #[serde(rename = "sourceArticle", skip_serializing_if = "Option::is_none")]
    pub source_article: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "isUser")]
    pub is_user: bool,
}

/// A turn that has been generated but not yet assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnDraft {
    pub speaker_label: String,
    pub side: Side,
    pub text: String,
    pub source_article: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub is_user: bool,
}

impl TurnDraft {
    pub fn persona(speaker: impl Into<String>, side: Side, text: impl Into<String>) -> Self {
        Self {
            speaker_label: speaker.into(),
            side,
            text: text.into(),
            source_article: None,
            timestamp: Utc::now(),
            is_user: false,
        }
    }

    /// User-authored turns are always placed on the right.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker_label: USER_LABEL.to_string(),
            side: Side::Right,
            text: text.into(),
            source_article: None,
            timestamp: Utc::now(),
            is_user: true,
        }
    }

    pub fn analyst(text: impl Into<String>) -> Self {
        Self::persona(ANALYST_LABEL, Side::Left, text)
    }

    pub fn with_source(mut self, article_id: impl Into<String>) -> Self {
        self.source_article = Some(article_id.into());
        self
    }

    pub fn into_turn(self, id: u64) -> Turn {
        Turn {
            id,
            speaker_label: self.speaker_label,
            side: self.side,
            text: self.text,
            source_article: self.source_article,
            timestamp: self.timestamp,
            is_user: self.is_user,
        }
    }
}

/// Ordered turn sequence for one (category, subtopic) pair.
///
/// Ids come from a monotonic counter. Ids may be reserved before the turn
/// content exists so that staggered completions still land in initiation order.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    next_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self { turns: Vec::new(), next_id: 1 }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Reserve `n` consecutive ids in initiation order.
    pub fn reserve_ids(&mut self, n: usize) -> Vec<u64> {
        let start = self.next_id.max(1);
        self.next_id = start + n as u64;
        (start..self.next_id).collect()
    }

    /// Append with a freshly allocated id.
    pub fn push(&mut self, draft: TurnDraft) -> &Turn {
        let id = self.reserve_ids(1)[0];
        self.insert(draft.into_turn(id))
    }

    /// Insert a turn carrying a reserved id, keeping the sequence sorted by id.
    pub fn insert(&mut self, turn: Turn) -> &Turn {
        let pos = self.turns.partition_point(|t| t.id < turn.id);
        self.turns.insert(pos, turn);
        &self.turns[pos]
    }

    /// Last `n` turns, oldest first.
    pub fn tail(&self, n: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
