// Follow-up turns in response to reader input.
// Cycle: Idle -> AwaitingUserAppend -> Generating -> Idle (FallbackAppended on failure)

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::api::{ChatRequest, NewsApiClient};
use crate::lifetime::ViewLifetime;
use crate::models::{Article, Conversation, Turn, TurnDraft};
use crate::personas::{Persona, PersonaRegistry};

/// Chance that a local reply comes from two personas instead of one.
pub const TWO_REPLY_PROBABILITY: f64 = 0.35;

/// Context articles a reply may point back to.
pub const CONTEXT_ARTICLES: usize = 3;

/// Non-user turns inspected when favouring fresh speakers.
const RECENT_SPEAKERS: usize = 3;

pub const FALLBACK_MESSAGE: &str =
    "I'm unable to respond right now. Please try again in a moment.";

/// Conversation shared between a view and its timer tasks.
pub type SharedConversation = Arc<AsyncMutex<Conversation>>;

/// Remote generator for a single follow-up turn (the `/api/chat` endpoint).
#[async_trait::async_trait]
pub trait RemoteChat: Send + Sync {
    async fn reply(&self, payload: &ChatRequest) -> Result<TurnDraft>;
}

#[async_trait::async_trait]
impl RemoteChat for NewsApiClient {
    async fn reply(&self, payload: &ChatRequest) -> Result<TurnDraft> {
        Ok(self.chat(payload).await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionPhase {
    Idle,
    AwaitingUserAppend,
    Generating,
    FallbackAppended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtendOutcome {
    Rejected(RejectReason),
    Replied { user: Turn, replies: Vec<Turn> },
    Fallback { user: Turn, notice: Turn },
    /// The view was torn down; nothing (further) was appended.
    Suppressed,
}

/// What the reply is about.
#[derive(Debug, Clone, Copy)]
pub struct TopicContext<'a> {
    pub category: &'a str,
    pub subtopic: &'a str,
    pub articles: &'a [Article],
}

#[derive(Debug, Clone)]
pub struct ExtensionSettings {
    pub reveal_delay: (Duration, Duration),
    pub history_limit: usize,
    pub style: common::Style,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            reveal_delay: (Duration::from_millis(500), Duration::from_millis(1500)),
            history_limit: 5,
            style: common::Style::Casual,
        }
    }
}

impl ExtensionSettings {
    pub fn from_config(config: &common::Config) -> Self {
        Self {
            reveal_delay: config.reveal_delay(),
            history_limit: config.history_limit(),
            style: config.style(),
        }
    }
}

pub struct ExtensionEngine {
    registry: PersonaRegistry,
    remote: Option<Arc<dyn RemoteChat>>,
    settings: ExtensionSettings,
    rng: Mutex<StdRng>,
    phase: Arc<Mutex<ExtensionPhase>>,
}

/// Returns the engine to `Idle` however the cycle ends.
struct CycleGuard {
    phase: Arc<Mutex<ExtensionPhase>>,
}

impl CycleGuard {
    fn set(&self, phase: ExtensionPhase) {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner()) = phase;
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.set(ExtensionPhase::Idle);
    }
}

impl ExtensionEngine {
    /// Local template engine seeded from OS entropy.
    pub fn local(settings: ExtensionSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Local template engine with a fixed seed, for reproducible output.
    pub fn seeded(settings: ExtensionSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: ExtensionSettings, rng: StdRng) -> Self {
        Self {
            registry: PersonaRegistry::standard(),
            remote: None,
            settings,
            rng: Mutex::new(rng),
            phase: Arc::new(Mutex::new(ExtensionPhase::Idle)),
        }
    }

    /// Route follow-ups through a remote chat endpoint.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteChat>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Fresh engine for another conversation: same settings and remote,
    /// its own busy flag, randomness derived from this engine's generator.
    pub fn fork(&self) -> Self {
        let rng = self
            .with_rng_mut(|rng| StdRng::from_rng(rng))
            .unwrap_or_else(|_| StdRng::from_entropy());
        Self {
            registry: self.registry,
            remote: self.remote.clone(),
            settings: self.settings.clone(),
            rng: Mutex::new(rng),
            phase: Arc::new(Mutex::new(ExtensionPhase::Idle)),
        }
    }

    pub fn phase(&self) -> ExtensionPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != ExtensionPhase::Idle
    }

    fn begin_cycle(&self) -> Option<CycleGuard> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if *phase != ExtensionPhase::Idle {
            return None;
        }
        *phase = ExtensionPhase::AwaitingUserAppend;
        Some(CycleGuard { phase: self.phase.clone() })
    }

    fn with_rng_mut<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *rng)
    }

    /// Compose 1-2 local replies from persona sentence banks.
    ///
    /// Speakers of the most recent turns are avoided when possible; when
    /// articles are available each reply mentions one of the first three.
    pub fn compose_replies(&self, history: &[Turn], articles: &[Article]) -> Vec<TurnDraft> {
        self.with_rng_mut(|rng| {
            let count = 1 + usize::from(rng.gen_bool(TWO_REPLY_PROBABILITY));
            let recent: Vec<&Persona> = history
                .iter()
                .rev()
                .filter(|t| !t.is_user)
                .take(RECENT_SPEAKERS)
                .filter_map(|t| self.registry.find_by_label(&t.speaker_label))
                .collect();
            let context = &articles[..articles.len().min(CONTEXT_ARTICLES)];

            self.registry
                .pick(count, &recent, rng)
                .into_iter()
                .map(|persona| compose_reply(persona, context, rng))
                .collect()
        })
    }

    fn reveal_delay(&self) -> Duration {
        let (lo, hi) = self.settings.reveal_delay;
        let (lo, hi) = (lo.as_millis() as u64, hi.as_millis() as u64);
        let ms = if hi > lo {
            self.with_rng_mut(|rng| rng.gen_range(lo..=hi))
        } else {
            lo
        };
        Duration::from_millis(ms)
    }

    /// Run one extension cycle against `conversation`.
    ///
    /// The reader's turn is appended before any reply is generated. Replies
    /// are revealed after a short "typing" delay through `lifetime`, so they
    /// are dropped if the view goes away first. Ids are reserved up front,
    /// keeping replies in initiation order whatever order their timers fire.
    pub async fn extend(
        &self,
        conversation: &SharedConversation,
        lifetime: &ViewLifetime,
        input: &str,
        ctx: TopicContext<'_>,
    ) -> ExtendOutcome {
        let input = input.trim();
        if input.is_empty() {
            return ExtendOutcome::Rejected(RejectReason::EmptyInput);
        }
        let Some(cycle) = self.begin_cycle() else {
            debug!("extension already in flight, input ignored");
            return ExtendOutcome::Rejected(RejectReason::Busy);
        };

        let (user, history) = {
            let mut conv = conversation.lock().await;
            if !lifetime.is_mounted() {
                return ExtendOutcome::Suppressed;
            }
            let history = conv.tail(self.settings.history_limit).to_vec();
            let user = conv.push(TurnDraft::user(input)).clone();
            (user, history)
        };
        cycle.set(ExtensionPhase::Generating);
        info!(category = ctx.category, subtopic = ctx.subtopic, turn_id = user.id, "generating follow-up");

        let drafts = match &self.remote {
            Some(remote) => {
                let payload = ChatRequest::new(
                    input,
                    ctx.category,
                    ctx.subtopic,
                    ctx.articles,
                    &history,
                    self.settings.history_limit,
                    self.settings.style,
                );
                remote.reply(&payload).await.map(|draft| vec![draft])
            }
            None => {
                let mut full_history = history;
                full_history.push(user.clone());
                Ok(self.compose_replies(&full_history, ctx.articles))
            }
        };

        match drafts {
            Ok(drafts) => {
                let replies = self.reveal(conversation, lifetime, drafts).await;
                if !lifetime.is_mounted() {
                    return ExtendOutcome::Suppressed;
                }
                ExtendOutcome::Replied { user, replies }
            }
            Err(e) => {
                warn!(error = %e, "follow-up generation failed, appending fallback");
                let mut conv = conversation.lock().await;
                if !lifetime.is_mounted() {
                    return ExtendOutcome::Suppressed;
                }
                let notice = conv.push(TurnDraft::analyst(FALLBACK_MESSAGE)).clone();
                cycle.set(ExtensionPhase::FallbackAppended);
                ExtendOutcome::Fallback { user, notice }
            }
        }
    }

    async fn reveal(
        &self,
        conversation: &SharedConversation,
        lifetime: &ViewLifetime,
        drafts: Vec<TurnDraft>,
    ) -> Vec<Turn> {
        let ids = conversation.lock().await.reserve_ids(drafts.len());

        let handles: Vec<_> = drafts
            .into_iter()
            .zip(ids)
            .map(|(draft, id)| {
                let delay = self.reveal_delay();
                let conversation = conversation.clone();
                let guard = lifetime.clone();
                lifetime.schedule(delay, async move {
                    let mut conv = conversation.lock().await;
                    if !guard.is_mounted() {
                        return None;
                    }
                    Some(conv.insert(draft.into_turn(id)).clone())
                })
            })
            .collect();

        let mut revealed = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(Some(turn))) => revealed.push(turn),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "reveal task failed"),
            }
        }
        revealed.sort_by_key(|t| t.id);
        revealed
    }
}

fn compose_reply<R: Rng + ?Sized>(persona: &Persona, context: &[Article], rng: &mut R) -> TurnDraft {
    let sentence = persona
        .intent
        .sentences()
        .choose(rng)
        .copied()
        .unwrap_or("That is worth keeping an eye on.");

    match context.choose(rng) {
        Some(article) => TurnDraft::persona(
            persona.label(),
            persona.side_affinity,
            format!("{} Look at \"{}\" for a good example.", sentence, article.title),
        )
        .with_source(article.id.clone()),
        None => TurnDraft::persona(persona.label(), persona.side_affinity, sentence),
    }
}
