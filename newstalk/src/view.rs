// Conversation view for one category: one session per (category, subtopic)

use serde::Serialize;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::api::Subtopic;
use crate::bias::{shade_text, Shading};
use crate::dialogue::DialogueSynthesizer;
use crate::extension::{ExtendOutcome, ExtensionEngine, SharedConversation, TopicContext};
use crate::facts::{extract_facts, fallback_fact};
use crate::lifetime::{FetchGuard, ViewLifetime};
use crate::models::{Article, Conversation, Turn, TurnDraft};
use crate::playback::{PlayAction, PlaybackSequencer, PlaybackStatus};
use crate::source::ArticleSource;

/// A turn together with its bubble shading.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedTurn {
    #[serde(flatten)]
    pub turn: Turn,
    pub shading: Shading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// The source failed; fallback facts and an explanatory turn are shown.
    Failed,
    /// A fetch for the same subtopic is still outstanding.
    AlreadyLoading,
    /// The session ended while the fetch was running.
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct ViewSettings {
    pub style: common::Style,
    pub fact_count: usize,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            style: common::Style::Casual,
            fact_count: 5,
        }
    }
}

impl ViewSettings {
    pub fn from_config(config: &common::Config) -> Self {
        Self {
            style: config.style(),
            fact_count: config.fact_count(),
        }
    }
}

struct Session {
    subtopic_id: Option<String>,
    subtopic: Option<Subtopic>,
    articles: Arc<Vec<Article>>,
    facts: Vec<String>,
    conversation: SharedConversation,
    engine: Arc<ExtensionEngine>,
    lifetime: ViewLifetime,
}

impl Session {
    fn new(subtopic_id: Option<String>, engine: Arc<ExtensionEngine>, lifetime: ViewLifetime) -> Self {
        Self {
            subtopic_id,
            subtopic: None,
            articles: Arc::new(Vec::new()),
            facts: Vec::new(),
            conversation: Arc::new(AsyncMutex::new(Conversation::new())),
            engine,
            lifetime,
        }
    }
}

pub struct TopicView {
    category: String,
    settings: ViewSettings,
    source: Arc<dyn ArticleSource>,
    synthesizer: DialogueSynthesizer,
    fetches: FetchGuard,
    playback: PlaybackSequencer,
    root: ViewLifetime,
    session: Mutex<Session>,
}

fn resource_key(category: &str, subtopic_id: Option<&str>) -> String {
    format!("{}/{}", category, subtopic_id.unwrap_or("*"))
}

impl TopicView {
    pub fn new(
        category: impl Into<String>,
        source: Arc<dyn ArticleSource>,
        engine: ExtensionEngine,
        playback: PlaybackSequencer,
        settings: ViewSettings,
    ) -> Self {
        let root = ViewLifetime::new();
        let session = Session::new(None, Arc::new(engine), root.child());
        Self {
            category: category.into().trim().to_lowercase(),
            settings,
            source,
            synthesizer: DialogueSynthesizer::default(),
            fetches: FetchGuard::new(),
            playback,
            root,
            session: Mutex::new(session),
        }
    }

    fn session(&self) -> std::sync::MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn subtopic(&self) -> Option<Subtopic> {
        self.session().subtopic.clone()
    }

    pub fn subtopic_id(&self) -> Option<String> {
        self.session().subtopic_id.clone()
    }

    pub fn articles(&self) -> Arc<Vec<Article>> {
        self.session().articles.clone()
    }

    pub fn facts(&self) -> Vec<String> {
        self.session().facts.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.root.is_mounted()
    }

    /// True while the current subtopic is being fetched.
    pub fn is_loading(&self) -> bool {
        let id = self.subtopic_id();
        self.fetches.is_loading(&resource_key(&self.category, id.as_deref()))
    }

    pub fn is_busy(&self) -> bool {
        self.session().engine.is_busy()
    }

    /// Load the current subtopic (or the category's first one when none is
    /// set) and open its conversation.
    ///
    /// The loaded conversation replaces the session wholesale: replies still
    /// pending against the previous conversation die with its lifetime.
    pub async fn open(&self) -> LoadOutcome {
        let (subtopic_id, lifetime) = {
            let s = self.session();
            (s.subtopic_id.clone(), s.lifetime.clone())
        };

        let key = resource_key(&self.category, subtopic_id.as_deref());
        let Some(ticket) = self.fetches.try_begin(key.clone()) else {
            info!(key = %key, "fetch already in flight");
            return LoadOutcome::AlreadyLoading;
        };
        debug!(key = ticket.key(), "fetching subtopic");

        let fetched = self.fetch(subtopic_id.as_deref()).await;

        let mut s = self.session();
        if !lifetime.is_mounted() {
            return LoadOutcome::Suppressed;
        }

        let (outcome, next) = match fetched {
            Ok((resolved_id, subtopic, articles, backend_turns)) => {
                info!(
                    category = %self.category,
                    subtopic = resolved_id.as_deref().unwrap_or("-"),
                    articles = articles.len(),
                    "subtopic loaded"
                );
                let drafts = if backend_turns.is_empty() {
                    self.synthesizer.synthesize_initial(&articles, &self.category)
                } else {
                    backend_turns
                };
                let mut next = self.fresh_session(&s, resolved_id, drafts);
                next.facts = extract_facts(&articles, &self.category, self.settings.fact_count);
                next.subtopic = subtopic;
                next.articles = Arc::new(articles);
                (LoadOutcome::Loaded, next)
            }
            Err(e) => {
                warn!(category = %self.category, error = %e, "failed to load articles");
                let notice = format!(
                    "I couldn't load the latest {} news right now. Please try again in a little while.",
                    self.category
                );
                let mut next = self.fresh_session(&s, subtopic_id, vec![TurnDraft::analyst(notice)]);
                next.facts = vec![fallback_fact(&self.category)];
                (LoadOutcome::Failed, next)
            }
        };

        s.lifetime.teardown();
        *s = next;
        outcome
    }

    fn fresh_session(&self, current: &Session, subtopic_id: Option<String>, drafts: Vec<TurnDraft>) -> Session {
        let mut conversation = Conversation::new();
        for draft in drafts {
            conversation.push(draft);
        }
        let mut session = Session::new(subtopic_id, Arc::new(current.engine.fork()), self.root.child());
        session.conversation = Arc::new(AsyncMutex::new(conversation));
        session
    }

    async fn fetch(
        &self,
        subtopic_id: Option<&str>,
    ) -> anyhow::Result<(Option<String>, Option<Subtopic>, Vec<Article>, Vec<TurnDraft>)> {
        let id = match subtopic_id {
            Some(id) => id.to_string(),
            None => match self.source.subtopics(&self.category).await?.into_iter().next() {
                Some(first) => first.id,
                // nothing clustered for this category: an empty, valid result
                None => return Ok((None, None, Vec::new(), Vec::new())),
            },
        };
        let data = self.source.subtopic(&self.category, &id, self.settings.style).await?;
        Ok((Some(id), data.subtopic, data.articles, data.conversation))
    }

    /// Switch to another subtopic: the current conversation, its pending
    /// reveals and any playback are discarded before the new one loads.
    pub async fn navigate(&self, subtopic_id: impl Into<String>) -> LoadOutcome {
        self.playback.stop();
        {
            let mut s = self.session();
            s.lifetime.teardown();
            let engine = Arc::new(s.engine.fork());
            *s = Session::new(Some(subtopic_id.into()), engine, self.root.child());
        }
        self.open().await
    }

    /// Forward reader input to the extension engine.
    pub async fn send(&self, input: &str) -> ExtendOutcome {
        let (engine, conversation, lifetime, articles, subtopic) = {
            let s = self.session();
            (
                s.engine.clone(),
                s.conversation.clone(),
                s.lifetime.clone(),
                s.articles.clone(),
                s.subtopic
                    .as_ref()
                    .map(|t| t.title.clone())
                    .or_else(|| s.subtopic_id.clone())
                    .unwrap_or_default(),
            )
        };
        let ctx = TopicContext {
            category: &self.category,
            subtopic: &subtopic,
            articles: &articles,
        };
        engine.extend(&conversation, &lifetime, input, ctx).await
    }

    pub async fn turns(&self) -> Vec<Turn> {
        let conversation = self.session().conversation.clone();
        let turns = conversation.lock().await.turns().to_vec();
        turns
    }

    /// Current turns with their shading. Shading depends only on each
    /// turn's text.
    pub async fn render(&self) -> Vec<RenderedTurn> {
        self.turns()
            .await
            .into_iter()
            .map(|turn| RenderedTurn {
                shading: shade_text(&turn.text),
                turn,
            })
            .collect()
    }

    /// Play/stop toggle for spoken playback.
    pub async fn toggle_playback(&self) -> PlayAction {
        let turns = self.turns().await;
        self.playback.play(&turns)
    }

    pub fn stop_playback(&self) {
        self.playback.stop();
    }

    pub fn playback_status(&self) -> PlaybackStatus {
        self.playback.status()
    }

    /// Unmount: stop speech and drop every pending task of every session.
    pub fn teardown(&self) {
        self.playback.stop();
        self.root.teardown();
    }
}

impl Drop for TopicView {
    fn drop(&mut self) {
        self.teardown();
    }
}
