/*
newstalk - interactive terminal front-end.
Loads a category's subtopic, prints its facts and conversation, and reads
follow-up questions from stdin.
*/

use anyhow::Result;
use clap::Parser;
use common::{Config, Style};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use newstalk::api::NewsApiClient;
use newstalk::extension::{ExtendOutcome, ExtensionEngine, ExtensionSettings, RejectReason};
use newstalk::playback::{CommandSpeech, LogSpeech, PlayAction, PlaybackSequencer, SpeechOutput};
use newstalk::seed::SeedSource;
use newstalk::source::ArticleSource;
use newstalk::view::{LoadOutcome, TopicView, ViewSettings};

#[derive(Parser, Debug)]
#[command(name = "newstalk", about = "News topics as a simulated conversation")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Use the built-in seed articles and local replies (no backend)
    #[arg(long)]
    offline: bool,

    /// Conversation style requested from the backend (casual, genz)
    #[arg(long)]
    style: Option<Style>,

    /// News category to open
    #[arg(default_value = "general")]
    category: String,

    /// Subtopic id; the category's first subtopic when omitted
    subtopic: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let default_path = PathBuf::from("config.default.toml");
    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let mut config = match Config::load_with_defaults(Some(default_path.as_path()), override_path.as_deref()).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    if let Some(style) = args.style {
        config.api.style = Some(style);
    }
    info!(default = ?default_path, override = ?override_path, "configuration loaded");

    let view = build_view(&config, &args.category, args.offline)?;
    let first = match args.subtopic {
        Some(id) => view.navigate(id).await,
        None => view.open().await,
    };
    if first == LoadOutcome::Failed {
        warn!(category = %view.category(), "showing fallback content");
    }
    print_view(&view).await;
    println!("Type a question, or /play, /stop, /topic <id>, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.split_once(' ').map_or((line, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) => break,
            ("/play", _) => match view.toggle_playback().await {
                PlayAction::Started => println!("[playing]"),
                PlayAction::Stopped => println!("[stopped]"),
                PlayAction::Empty => println!("[nothing to play]"),
                PlayAction::Unavailable => println!("[speech unavailable]"),
            },
            ("/stop", _) => view.stop_playback(),
            ("/topic", id) if !id.is_empty() => {
                view.navigate(id).await;
                print_view(&view).await;
            }
            ("/topic", _) => print_subtopics(&view, &config, args.offline).await,
            _ => {
                // replies are revealed with a delay; ctrl-c must not wait for them
                let outcome = tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("ctrl-c received, shutting down");
                        break;
                    }
                    outcome = view.send(line) => outcome,
                };
                match outcome {
                    ExtendOutcome::Replied { user, replies } => {
                        print_turns(&view, user.id).await;
                        info!(replies = replies.len(), "follow-up revealed");
                    }
                    ExtendOutcome::Fallback { user, .. } => print_turns(&view, user.id).await,
                    ExtendOutcome::Rejected(RejectReason::Busy) => println!("[still replying...]"),
                    ExtendOutcome::Rejected(RejectReason::EmptyInput) | ExtendOutcome::Suppressed => {}
                }
            }
        }
    }

    view.teardown();
    info!("Shutdown complete");
    Ok(())
}

fn build_view(config: &Config, category: &str, offline: bool) -> Result<TopicView> {
    let mut engine = ExtensionEngine::local(ExtensionSettings::from_config(config));
    let source: Arc<dyn ArticleSource> = if offline {
        info!("offline mode: using seed articles");
        Arc::new(SeedSource)
    } else {
        let client = Arc::new(NewsApiClient::from_config(config)?);
        info!(base_url = %client.base_url(), "using news API");
        if config.remote_chat() {
            engine = engine.with_remote(client.clone());
        }
        client as Arc<dyn ArticleSource>
    };

    let speech: Arc<dyn SpeechOutput> = match config.playback.command.as_deref() {
        Some(cmd) => {
            let mut parts = cmd.split_whitespace();
            let program = parts.next().unwrap_or_default();
            let command = CommandSpeech::new(program).with_args(parts);
            if command.is_available() {
                Arc::new(command)
            } else {
                warn!(command = %cmd, "speech command not found, logging utterances instead");
                Arc::new(LogSpeech::default())
            }
        }
        None => Arc::new(LogSpeech::default()),
    };
    let playback = PlaybackSequencer::new(speech, config.playback_pause());

    Ok(TopicView::new(
        category,
        source,
        engine,
        playback,
        ViewSettings::from_config(config),
    ))
}

async fn print_subtopics(view: &TopicView, config: &Config, offline: bool) {
    let listed = if offline {
        SeedSource.subtopics(view.category()).await
    } else {
        match NewsApiClient::from_config(config) {
            Ok(client) => ArticleSource::subtopics(&client, view.category()).await,
            Err(e) => Err(e),
        }
    };
    match listed {
        Ok(subtopics) if subtopics.is_empty() => println!("No subtopics for {}", view.category()),
        Ok(subtopics) => {
            for s in subtopics {
                println!("  {:<28} {} ({} articles)", s.id, s.title, s.article_count);
            }
        }
        Err(e) => println!("Could not list subtopics: {}", e),
    }
}

async fn print_view(view: &TopicView) {
    match view.subtopic() {
        Some(s) => println!("\n== {} / {} ==", view.category(), s.title),
        None => println!("\n== {} ==", view.category()),
    }
    for fact in view.facts() {
        println!("  * {}", fact);
    }
    println!();
    print_turns(view, 0).await;
}

/// Print turns with id >= `from`.
async fn print_turns(view: &TopicView, from: u64) {
    for rendered in view.render().await.into_iter().filter(|r| r.turn.id >= from) {
        let t = &rendered.turn;
        let indent = match t.side {
            newstalk::models::Side::Left => "",
            newstalk::models::Side::Right => "                ",
        };
        println!(
            "{}[{}] {} (bias {:.0}%)\n{}  {}",
            indent,
            t.side,
            t.speaker_label,
            rendered.shading.opacity * 100.0,
            indent,
            t.text
        );
    }
}
