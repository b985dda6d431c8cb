use anyhow::Result;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use newstalk::api::{ChatRequest, Subtopic, SubtopicData};
use newstalk::extension::{
    ExtendOutcome, ExtensionEngine, ExtensionSettings, RejectReason, RemoteChat, FALLBACK_MESSAGE,
};
use newstalk::models::{Side, TurnDraft, ANALYST_LABEL};
use newstalk::playback::{PlayAction, PlaybackSequencer, PlaybackStatus, SpeechOutput};
use newstalk::seed::SeedSource;
use newstalk::source::ArticleSource;
use newstalk::view::{LoadOutcome, TopicView, ViewSettings};

fn fast_settings() -> ExtensionSettings {
    ExtensionSettings {
        reveal_delay: (Duration::from_millis(1), Duration::from_millis(5)),
        ..Default::default()
    }
}

#[derive(Default)]
struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    delay_ms: u64,
}

#[async_trait::async_trait]
impl SpeechOutput for RecordingSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        Ok(())
    }

    fn cancel(&self) {}
}

struct DownSource;

#[async_trait::async_trait]
impl ArticleSource for DownSource {
    async fn subtopics(&self, _category: &str) -> Result<Vec<Subtopic>> {
        anyhow::bail!("API error 503: Service Unavailable")
    }

    async fn subtopic(&self, _category: &str, _id: &str, _style: common::Style) -> Result<SubtopicData> {
        anyhow::bail!("API error 503: Service Unavailable")
    }
}

struct EmptySource;

#[async_trait::async_trait]
impl ArticleSource for EmptySource {
    async fn subtopics(&self, _category: &str) -> Result<Vec<Subtopic>> {
        Ok(Vec::new())
    }

    async fn subtopic(&self, _category: &str, id: &str, _style: common::Style) -> Result<SubtopicData> {
        anyhow::bail!("Subtopic not found: {}", id)
    }
}

/// Seed articles delivered after a delay.
struct SlowSource {
    delay: Duration,
}

#[async_trait::async_trait]
impl ArticleSource for SlowSource {
    async fn subtopics(&self, category: &str) -> Result<Vec<Subtopic>> {
        tokio::time::sleep(self.delay).await;
        SeedSource.subtopics(category).await
    }

    async fn subtopic(&self, category: &str, id: &str, style: common::Style) -> Result<SubtopicData> {
        tokio::time::sleep(self.delay).await;
        SeedSource.subtopic(category, id, style).await
    }
}

struct MutedSpeech;

#[async_trait::async_trait]
impl SpeechOutput for MutedSpeech {
    fn is_available(&self) -> bool {
        false
    }

    async fn speak(&self, _text: &str) -> Result<()> {
        anyhow::bail!("no speech device")
    }

    fn cancel(&self) {}
}

struct DownChat;

#[async_trait::async_trait]
impl RemoteChat for DownChat {
    async fn reply(&self, _payload: &ChatRequest) -> Result<TurnDraft> {
        anyhow::bail!("request to /api/chat timed out")
    }
}

fn view_with(source: Arc<dyn ArticleSource>, engine: ExtensionEngine, speech: Arc<dyn SpeechOutput>) -> TopicView {
    TopicView::new(
        "business",
        source,
        engine,
        PlaybackSequencer::new(speech, Duration::from_millis(1)),
        ViewSettings::default(),
    )
}

fn offline_view(seed: u64) -> TopicView {
    view_with(
        Arc::new(SeedSource),
        ExtensionEngine::seeded(fast_settings(), seed),
        Arc::new(RecordingSpeech::default()),
    )
}

#[tokio::test]
async fn test_open_synthesizes_opening_turns() {
    let view = offline_view(1);
    assert_eq!(view.open().await, LoadOutcome::Loaded);

    assert_eq!(view.subtopic_id().as_deref(), Some("business_ipo_0"));
    let facts = view.facts();
    assert!(!facts.is_empty() && facts.len() <= 5);
    assert!(facts[0].starts_with("Figma prepares IPO"));

    let rendered = view.render().await;
    assert_eq!(rendered.len(), view.articles().len().min(3));
    for (i, r) in rendered.iter().enumerate() {
        assert_eq!(r.turn.side, if i % 2 == 0 { Side::Left } else { Side::Right });
        assert!(!r.turn.is_user);
        assert!((0.1..=0.9).contains(&r.shading.opacity));
    }
}

#[tokio::test]
async fn test_extend_appends_user_turn_then_replies() {
    let view = offline_view(7);
    view.open().await;
    let before = view.turns().await;

    let outcome = view.send("What about jobs?").await;
    let ExtendOutcome::Replied { user, replies } = outcome else {
        panic!("expected replies, got {:?}", outcome);
    };
    assert!((1..=2).contains(&replies.len()));

    let after = view.turns().await;
    assert_eq!(after.len(), before.len() + 1 + replies.len());
    assert_eq!(&after[..before.len()], &before[..]);

    let user_turn = &after[before.len()];
    assert_eq!(user_turn.id, user.id);
    assert_eq!(user_turn.text, "What about jobs?");
    assert!(user_turn.is_user);
    assert_eq!(user_turn.side, Side::Right);
    assert!(after[before.len() + 1..].iter().all(|t| !t.is_user));

    let ids: Vec<u64> = after.iter().map(|t| t.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_second_extend_while_pending_is_ignored() {
    let view = offline_view(3);
    view.open().await;
    let opening = view.turns().await.len();

    let (first, second) = tokio::join!(view.send("What about jobs?"), view.send("And wages?"));

    assert_eq!(second, ExtendOutcome::Rejected(RejectReason::Busy));
    let ExtendOutcome::Replied { replies, .. } = first else {
        panic!("first call should reply");
    };
    let turns = view.turns().await;
    assert_eq!(turns.len(), opening + 1 + replies.len());
    assert!(turns.iter().all(|t| t.text != "And wages?"));
    assert!(!view.is_busy());
}

#[tokio::test]
async fn test_remote_failure_appends_single_fallback() {
    let engine = ExtensionEngine::seeded(fast_settings(), 1).with_remote(Arc::new(DownChat));
    let view = view_with(Arc::new(SeedSource), engine, Arc::new(RecordingSpeech::default()));
    view.open().await;
    let opening = view.turns().await.len();

    let outcome = view.send("Is this a bubble?").await;
    assert!(matches!(outcome, ExtendOutcome::Fallback { .. }));

    let turns = view.turns().await;
    assert_eq!(turns.len(), opening + 2);
    let notice = turns.last().unwrap();
    assert_eq!(notice.speaker_label, ANALYST_LABEL);
    assert_eq!(notice.text, FALLBACK_MESSAGE);
    assert_eq!(turns.iter().filter(|t| t.text == FALLBACK_MESSAGE).count(), 1);
    assert!(!view.is_busy());
}

#[tokio::test]
async fn test_failed_load_shows_fallback_content() {
    let view = view_with(
        Arc::new(DownSource),
        ExtensionEngine::seeded(fast_settings(), 1),
        Arc::new(RecordingSpeech::default()),
    );
    assert_eq!(view.open().await, LoadOutcome::Failed);

    assert_eq!(view.facts(), vec!["Recent developments in business are being closely monitored."]);
    let turns = view.turns().await;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].speaker_label, ANALYST_LABEL);
    assert!(!view.is_loading());
}

#[tokio::test]
async fn test_empty_category_yields_one_turn_and_one_fact() {
    let view = view_with(
        Arc::new(EmptySource),
        ExtensionEngine::seeded(fast_settings(), 1),
        Arc::new(RecordingSpeech::default()),
    );
    assert_eq!(view.open().await, LoadOutcome::Loaded);

    assert_eq!(view.facts().len(), 1);
    let turns = view.turns().await;
    assert_eq!(turns.len(), 1);
    assert!(turns[0].text.contains("No recent news was found for business"));
}

#[tokio::test]
async fn test_navigate_starts_a_fresh_conversation() {
    let view = offline_view(5);
    view.open().await;
    view.send("What about jobs?").await;

    assert_eq!(view.navigate("business_earnings_1").await, LoadOutcome::Loaded);
    let turns = view.turns().await;
    assert_eq!(turns.len(), 1);
    assert!(turns[0].text.starts_with("Retail chain posts stronger quarterly earnings"));
    assert!(turns.iter().all(|t| !t.is_user));
}

#[tokio::test]
async fn test_teardown_drops_pending_replies() {
    let settings = ExtensionSettings {
        reveal_delay: (Duration::from_millis(300), Duration::from_millis(300)),
        ..Default::default()
    };
    let view = Arc::new(view_with(
        Arc::new(SeedSource),
        ExtensionEngine::seeded(settings, 2),
        Arc::new(RecordingSpeech::default()),
    ));
    view.open().await;
    let opening = view.turns().await.len();

    let v = view.clone();
    let pending = tokio::spawn(async move { v.send("What happens next?").await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    view.teardown();

    assert_eq!(pending.await.unwrap(), ExtendOutcome::Suppressed);
    tokio::time::sleep(Duration::from_millis(400)).await;
    // only the reader's own turn made it in before teardown
    assert_eq!(view.turns().await.len(), opening + 1);
}

#[tokio::test]
async fn test_play_then_stop_speaks_only_first_turn() {
    let speech = Arc::new(RecordingSpeech { delay_ms: 200, ..Default::default() });
    let view = view_with(Arc::new(SeedSource), ExtensionEngine::seeded(fast_settings(), 1), speech.clone());
    view.open().await;
    assert!(view.turns().await.len() >= 2);

    assert_eq!(view.toggle_playback().await, PlayAction::Started);
    assert_eq!(view.playback_status(), PlaybackStatus::Speaking);
    tokio::time::sleep(Duration::from_millis(20)).await;
    view.stop_playback();
    assert_eq!(view.playback_status(), PlaybackStatus::Idle);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let spoken = speech.spoken.lock().unwrap().clone();
    assert_eq!(spoken.len(), 1);
    assert!(spoken[0].starts_with("Dr. Sarah Chen (Nature) says: Figma prepares IPO"));
}

fn slow_reveal() -> ExtensionSettings {
    ExtensionSettings {
        reveal_delay: (Duration::from_millis(300), Duration::from_millis(300)),
        ..Default::default()
    }
}

fn assert_opening_only(turns: &[newstalk::models::Turn]) {
    assert!(!turns.is_empty());
    assert!(turns.iter().all(|t| !t.is_user));
    assert!(turns[0].text.starts_with("Figma prepares IPO"));
    let ids: Vec<u64> = turns.iter().map(|t| t.id).collect();
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_send_during_slow_load_leaves_no_orphan_reply() {
    let view = Arc::new(view_with(
        Arc::new(SlowSource { delay: Duration::from_millis(100) }),
        ExtensionEngine::seeded(slow_reveal(), 4),
        Arc::new(RecordingSpeech::default()),
    ));

    let v = view.clone();
    let loading = tokio::spawn(async move { v.open().await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(view.is_loading());

    // two source calls of 100ms each finish well before the 300ms reveal
    let outcome = view.send("What about jobs?").await;
    assert_eq!(loading.await.unwrap(), LoadOutcome::Loaded);
    assert_eq!(outcome, ExtendOutcome::Suppressed);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let turns = view.turns().await;
    assert_eq!(turns.len(), view.articles().len().min(3));
    assert_opening_only(&turns);
    assert!(!view.is_busy());
}

#[tokio::test]
async fn test_reopen_discards_pending_reply() {
    let view = Arc::new(view_with(
        Arc::new(SeedSource),
        ExtensionEngine::seeded(slow_reveal(), 8),
        Arc::new(RecordingSpeech::default()),
    ));
    view.open().await;

    let v = view.clone();
    let pending = tokio::spawn(async move { v.send("What about jobs?").await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(view.open().await, LoadOutcome::Loaded);
    assert_eq!(pending.await.unwrap(), ExtendOutcome::Suppressed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_opening_only(&view.turns().await);

    // the reloaded conversation accepts input right away
    let outcome = view.send("And wages?").await;
    assert!(matches!(outcome, ExtendOutcome::Replied { .. }));
}

#[tokio::test]
async fn test_concurrent_open_is_not_issued_twice() {
    let view = view_with(
        Arc::new(SlowSource { delay: Duration::from_millis(100) }),
        ExtensionEngine::seeded(fast_settings(), 1),
        Arc::new(RecordingSpeech::default()),
    );

    let (first, second) = tokio::join!(view.open(), view.open());

    assert_eq!(first, LoadOutcome::Loaded);
    assert_eq!(second, LoadOutcome::AlreadyLoading);
    assert_opening_only(&view.turns().await);
    assert!(!view.is_loading());
}

#[tokio::test]
async fn test_unavailable_speech_keeps_playback_idle() {
    let view = view_with(Arc::new(SeedSource), ExtensionEngine::seeded(fast_settings(), 1), Arc::new(MutedSpeech));
    view.open().await;

    assert_eq!(view.toggle_playback().await, PlayAction::Unavailable);
    assert_eq!(view.playback_status(), PlaybackStatus::Idle);
}
