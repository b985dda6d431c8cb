// Opening dialogue built from the leading articles
use tracing::debug;

use crate::facts::clip;
use crate::models::{Article, Side, TurnDraft};
use crate::personas::PersonaRegistry;

/// Leading articles turned into opening turns.
pub const OPENING_ARTICLES: usize = 3;

/// Characters of the description kept in an opening turn.
pub const TURN_DESCRIPTION_CHARS: usize = 200;

/// Builds the initial turn sequence of a conversation.
///
/// Personas are assigned round-robin, so the same article list always yields
/// the same opening.
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogueSynthesizer {
    registry: PersonaRegistry,
}

impl DialogueSynthesizer {
    pub fn new(registry: PersonaRegistry) -> Self {
        Self { registry }
    }

    pub fn synthesize_initial(&self, articles: &[Article], category: &str) -> Vec<TurnDraft> {
        let turns: Vec<TurnDraft> = articles
            .iter()
            .filter(|a| a.is_complete())
            .take(OPENING_ARTICLES)
            .enumerate()
            .map(|(i, article)| {
                let persona = self.registry.round_robin(i);
                let text = format!(
                    "{}: {}...",
                    article.title.trim(),
                    clip(article.description.trim(), TURN_DESCRIPTION_CHARS)
                );
                TurnDraft::persona(persona.label(), Side::for_position(i), text)
                    .with_source(article.id.clone())
            })
            .collect();

        if turns.is_empty() {
            debug!(category, "no articles to open the conversation with");
            return vec![TurnDraft::analyst(no_news_message(category))];
        }
        turns
    }
}

pub fn no_news_message(category: &str) -> String {
    format!(
        "No recent news was found for {}. Check back soon for new developments.",
        category.trim().to_lowercase()
    )
}
