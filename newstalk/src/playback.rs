// Spoken playback; the sequencer owns the speech device while a session runs

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::Turn;

/// Text-to-speech capability.
#[async_trait::async_trait]
pub trait SpeechOutput: Send + Sync {
    fn is_available(&self) -> bool {
        true
    }

    /// Speak `text`, resolving once the utterance has finished.
    async fn speak(&self, text: &str) -> Result<()>;

    /// Silence whatever is currently being spoken.
    fn cancel(&self);
}

/// Speech stand-in that logs each utterance and waits roughly as long as
/// reading it aloud would take.
#[derive(Debug, Clone)]
pub struct LogSpeech {
    words_per_minute: u32,
}

impl Default for LogSpeech {
    fn default() -> Self {
        Self { words_per_minute: 180 }
    }
}

impl LogSpeech {
    fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count().max(1) as u64;
        Duration::from_millis(words * 60_000 / self.words_per_minute as u64)
    }
}

#[async_trait::async_trait]
impl SpeechOutput for LogSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        info!(target: "speech", "{}", text);
        tokio::time::sleep(self.duration_for(text)).await;
        Ok(())
    }

    fn cancel(&self) {
        debug!(target: "speech", "cancelled");
    }
}

/// Speaks through an external program such as `espeak` or `say`,
/// passing the utterance as the last argument.
#[derive(Debug)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    current: Mutex<CancellationToken>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn fresh_token(&self) -> CancellationToken {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = CancellationToken::new();
        current.clone()
    }
}

#[async_trait::async_trait]
impl SpeechOutput for CommandSpeech {
    fn is_available(&self) -> bool {
        std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(&self.program).is_file()))
            .unwrap_or(false)
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let token = self.fresh_token();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start speech command '{}'", self.program))?;

        tokio::select! {
            status = child.wait() => {
                let status = status.context("Speech command failed")?;
                if !status.success() {
                    anyhow::bail!("Speech command exited with {}", status);
                }
                Ok(())
            }
            _ = token.cancelled() => {
                let _ = child.kill().await;
                Ok(())
            }
        }
    }

    fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Idle,
    Speaking,
}

/// What a call to [`PlaybackSequencer::play`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayAction {
    Started,
    /// A session was already running; the call acted as stop.
    Stopped,
    Empty,
    Unavailable,
}

#[derive(Debug)]
struct PlaybackInner {
    status: PlaybackStatus,
    cursor: usize,
    generation: u64,
    session: Option<CancellationToken>,
    task: Option<JoinHandle<()>>,
}

/// Narrates turns one after another as "<speaker> says: <text>".
pub struct PlaybackSequencer {
    speech: Arc<dyn SpeechOutput>,
    pause: Duration,
    inner: Arc<Mutex<PlaybackInner>>,
}

pub fn utterance_for(turn: &Turn) -> String {
    format!("{} says: {}", turn.speaker_label, turn.text)
}

impl PlaybackSequencer {
    pub fn new(speech: Arc<dyn SpeechOutput>, pause: Duration) -> Self {
        Self {
            speech,
            pause,
            inner: Arc::new(Mutex::new(PlaybackInner {
                status: PlaybackStatus::Idle,
                cursor: 0,
                generation: 0,
                session: None,
                task: None,
            })),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PlaybackInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn status(&self) -> PlaybackStatus {
        self.lock().status
    }

    /// Index of the turn being narrated.
    pub fn cursor(&self) -> usize {
        self.lock().cursor
    }

    /// Start narrating `turns`, or stop if a session is already speaking.
    pub fn play(&self, turns: &[Turn]) -> PlayAction {
        if self.status() == PlaybackStatus::Speaking {
            self.stop();
            return PlayAction::Stopped;
        }
        if turns.is_empty() {
            return PlayAction::Empty;
        }
        if !self.speech.is_available() {
            warn!("speech output unavailable, playback not started");
            return PlayAction::Unavailable;
        }

        let utterances: Vec<String> = turns.iter().map(utterance_for).collect();
        let token = CancellationToken::new();

        let mut inner = self.lock();
        inner.generation += 1;
        inner.status = PlaybackStatus::Speaking;
        inner.cursor = 0;
        inner.session = Some(token.clone());
        let generation = inner.generation;

        info!(turns = utterances.len(), "playback started");
        inner.task = Some(tokio::spawn(run_session(
            self.speech.clone(),
            self.inner.clone(),
            token,
            generation,
            utterances,
            self.pause,
        )));
        PlayAction::Started
    }

    /// Cancel the current session and return to idle immediately.
    pub fn stop(&self) {
        let was_speaking = {
            let mut inner = self.lock();
            inner.generation += 1;
            if let Some(token) = inner.session.take() {
                token.cancel();
            }
            inner.task = None;
            inner.cursor = 0;
            std::mem::replace(&mut inner.status, PlaybackStatus::Idle) == PlaybackStatus::Speaking
        };
        self.speech.cancel();
        if was_speaking {
            info!("playback stopped");
        }
    }

    /// Wait for the running session, if any, to end on its own.
    pub async fn wait(&self) {
        let task = self.lock().task.take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for PlaybackSequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run_session(
    speech: Arc<dyn SpeechOutput>,
    inner: Arc<Mutex<PlaybackInner>>,
    token: CancellationToken,
    generation: u64,
    utterances: Vec<String>,
    pause: Duration,
) {
    let last = utterances.len().saturating_sub(1);
    let mut failed = false;

    for (idx, utterance) in utterances.iter().enumerate() {
        {
            let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
            if guard.generation != generation {
                return;
            }
            guard.cursor = idx;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            res = speech.speak(utterance) => {
                if let Err(e) = res {
                    warn!(error = %e, "speech failed, aborting playback");
                    failed = true;
                    break;
                }
            }
        }

        if idx < last {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
    if guard.generation == generation {
        guard.status = PlaybackStatus::Idle;
        guard.cursor = 0;
        guard.session = None;
        drop(guard);
        if failed {
            speech.cancel();
        } else {
            info!("playback finished");
        }
    }
}
