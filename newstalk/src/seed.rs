// Offline seed articles, grouped with the backend keyword patterns

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::api::{Subtopic, SubtopicData};
use crate::facts::clip;
use crate::models::Article;
use crate::source::ArticleSource;

pub const CATEGORIES: &[&str] = &[
    "business",
    "entertainment",
    "general",
    "health",
    "science",
    "sports",
    "technology",
];

/// Most subtopics returned per category.
pub const MAX_SUBTOPICS: usize = 8;

/// Articles kept per subtopic.
pub const ARTICLES_PER_SUBTOPIC: usize = 5;

const SUBTOPIC_PATTERNS: &[(&str, &[&str])] = &[
    ("business", &["ipo", "earnings", "merger", "acquisition", "layoffs", "hiring", "stock", "market", "startup", "funding", "venture capital"]),
    ("technology", &["ai", "artificial intelligence", "machine learning", "quantum", "blockchain", "cybersecurity", "data privacy", "software", "hardware"]),
    ("sports", &["nfl", "nba", "olympics", "world cup", "championship", "playoff", "draft", "injury", "contract", "coach"]),
    ("health", &["covid", "vaccine", "pandemic", "mental health", "cancer", "diabetes", "clinical trial", "treatment", "research"]),
    ("entertainment", &["movie", "film", "streaming", "oscar", "grammy", "music", "album", "concert", "tour"]),
    ("science", &["space", "nasa", "mars", "moon", "telescope", "climate", "genetics", "fossil", "physics"]),
];

// (category, id, title, description, source, published)
const SEED: &[(&str, &str, &str, &str, &str, &str)] = &[
    ("business", "biz-1", "Figma prepares IPO as design software demand grows",
     "The design platform filed paperwork for an initial public offering after two years of steady revenue growth across enterprise customers.",
     "Reuters", "2024-06-03T09:00:00Z"),
    ("business", "biz-2", "Analysts weigh the Figma IPO valuation",
     "Bankers expect the listing to test investor appetite for software companies that are profitable but growing more slowly than before.",
     "Financial Times", "2024-06-04T12:30:00Z"),
    ("business", "biz-3", "Retail chain posts stronger quarterly earnings",
     "Same-store sales rose four percent as shoppers returned to physical locations, beating consensus forecasts.",
     "WSJ", "2024-06-02T15:00:00Z"),
    ("entertainment", "ent-1", "Summer movie season opens with a record weekend",
     "Two franchise releases pushed box office receipts to the best opening weekend since 2019.",
     "Variety", "2024-06-10T08:00:00Z"),
    ("entertainment", "ent-2", "Studios rethink theatrical windows for the new movie slate",
     "Executives say the gap between cinema release and home viewing will widen again after the strong start.",
     "Hollywood Reporter", "2024-06-11T10:00:00Z"),
    ("entertainment", "ent-3", "Indie band announces world tour",
     "The group will play forty dates across three continents, its first run of shows in five years.",
     "Rolling Stone", "2024-06-09T18:00:00Z"),
    ("general", "gen-1", "City council approves new transit plan",
     "The plan adds three bus corridors and extends evening service hours on the two busiest lines.",
     "AP", "2024-06-05T14:00:00Z"),
    ("general", "gen-2", "Residents debate the cost of the transit plan",
     "Some neighbourhood groups welcomed the new routes while others questioned how the expansion will be funded.",
     "Local Ledger", "2024-06-06T09:30:00Z"),
    ("health", "hea-1", "New vaccine shows strong results in late-stage trial",
     "Researchers reported a marked reduction in severe illness among participants who received two doses.",
     "STAT", "2024-05-28T07:00:00Z"),
    ("health", "hea-2", "Regulators schedule review of the vaccine data",
     "An advisory panel will meet next month to examine safety data before any approval decision.",
     "Reuters", "2024-05-30T11:00:00Z"),
    ("health", "hea-3", "Study links sleep habits to mental health outcomes",
     "Teenagers who kept consistent bedtimes reported fewer symptoms of anxiety over a two-year period.",
     "The Guardian", "2024-05-27T16:00:00Z"),
    ("science", "sci-1", "NASA confirms water ice deposits near lunar south pole",
     "Orbital measurements suggest the deposits are larger than earlier estimates and could support future crewed missions.",
     "Nature", "2024-06-01T13:00:00Z"),
    ("science", "sci-2", "NASA outlines timeline for next crewed lunar landing",
     "Officials said hardware testing remains on schedule, though the lander still faces several milestones.",
     "Scientific American", "2024-06-02T10:00:00Z"),
    ("science", "sci-3", "Fossil find pushes back origin of flowering plants",
     "A well-preserved specimen suggests flowering plants appeared millions of years earlier than previously thought.",
     "Science", "2024-05-31T09:00:00Z"),
    ("sports", "spo-1", "Underdogs force game seven in the championship series",
     "A late comeback evened the series and set up a deciding game on home ice this weekend.",
     "ESPN", "2024-06-08T23:00:00Z"),
    ("sports", "spo-2", "Coaches trade barbs ahead of championship decider",
     "Both benches questioned officiating in the last meeting, raising the temperature before the final game.",
     "The Athletic", "2024-06-09T12:00:00Z"),
    ("sports", "spo-3", "Star striker signs contract extension",
     "The forward committed to the club through 2028 after weeks of speculation about a summer transfer.",
     "BBC Sport", "2024-06-07T17:00:00Z"),
    ("technology", "tec-1", "Chipmaker unveils AI accelerator for data centers",
     "The new processor promises faster training times while drawing less power than the previous generation.",
     "The Verge", "2024-06-04T16:00:00Z"),
    ("technology", "tec-2", "Cloud providers race to deploy new AI hardware",
     "Early customers say capacity remains tight as demand for model training continues to outpace supply.",
     "MIT Tech Review", "2024-06-05T08:00:00Z"),
    ("technology", "tec-3", "Browser makers agree on data privacy standard",
     "The proposal limits cross-site tracking by default and gives users a single control for sharing preferences.",
     "Wired", "2024-06-03T19:00:00Z"),
];

/// All seed articles filed under `category`.
pub fn seed_articles(category: &str) -> Vec<Article> {
    let category = category.trim().to_lowercase();
    SEED.iter()
        .filter(|(cat, ..)| *cat == category)
        .map(|(_, id, title, description, source, published)| Article {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            url: format!("https://news.example.com/{}", id),
            source: source.to_string(),
            published_at: DateTime::parse_from_rfc3339(published)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        })
        .collect()
}

fn matches_pattern(text: &str, words: &HashSet<&str>, pattern: &str) -> bool {
    if pattern.contains(' ') {
        text.contains(pattern)
    } else {
        words.contains(pattern)
    }
}

/// Cluster `articles` into subtopics keyed by the first matching pattern,
/// "general" when nothing matches. Groups smaller than `min_articles` are
/// dropped; the largest groups come first.
pub fn group_subtopics(articles: &[Article], category: &str, min_articles: usize) -> Vec<(Subtopic, Vec<Article>)> {
    let category = category.trim().to_lowercase();
    let patterns = SUBTOPIC_PATTERNS
        .iter()
        .find(|(cat, _)| *cat == category)
        .map(|(_, p)| *p)
        .unwrap_or(&[]);

    let mut groups: Vec<(String, Vec<Article>)> = Vec::new();
    for article in articles {
        let text = format!("{} {}", article.title, article.description).to_lowercase();
        let words: HashSet<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let key = patterns
            .iter()
            .find(|p| matches_pattern(&text, &words, p))
            .map(|p| p.to_string())
            .unwrap_or_else(|| "general".to_string());

        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => list.push(article.clone()),
            None => groups.push((key, vec![article.clone()])),
        }
    }

    let mut subtopics: Vec<(Subtopic, Vec<Article>)> = groups
        .into_iter()
        .enumerate()
        .filter(|(_, (_, list))| list.len() >= min_articles.max(1))
        .filter_map(|(i, (key, list))| {
            let latest = list.iter().max_by_key(|a| a.published_at).cloned()?;
            let title = if key == "general" {
                format!("General {} News", title_case(&category))
            } else {
                format!("{} News", title_case(&key))
            };
            let subtopic = Subtopic {
                id: format!("{}_{}_{}", category, key.replace(' ', "-"), i),
                title,
                description: format!("{}...", clip(&latest.description, 150)),
                article_count: list.len(),
                latest_article: Some(latest),
            };
            let kept = list.into_iter().take(ARTICLES_PER_SUBTOPIC).collect();
            Some((subtopic, kept))
        })
        .collect();

    subtopics.sort_by(|a, b| b.0.article_count.cmp(&a.0.article_count));
    subtopics.truncate(MAX_SUBTOPICS);
    subtopics
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) if w.len() <= 3 => first.to_uppercase().chain(chars.flat_map(char::to_uppercase)).collect(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Offline article source backed by [`SEED`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSource;

#[async_trait::async_trait]
impl ArticleSource for SeedSource {
    async fn subtopics(&self, category: &str) -> Result<Vec<Subtopic>> {
        Ok(group_subtopics(&seed_articles(category), category, 1)
            .into_iter()
            .map(|(s, _)| s)
            .collect())
    }

    async fn subtopic(&self, category: &str, subtopic_id: &str, _style: common::Style) -> Result<SubtopicData> {
        let (subtopic, articles) = group_subtopics(&seed_articles(category), category, 1)
            .into_iter()
            .find(|(s, _)| s.id == subtopic_id)
            .ok_or_else(|| anyhow::anyhow!("Subtopic not found: {}/{}", category, subtopic_id))?;
        Ok(SubtopicData {
            subtopic: Some(subtopic),
            articles,
            conversation: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_seed_articles() {
        for cat in CATEGORIES {
            assert!(!seed_articles(cat).is_empty(), "no seed for {}", cat);
        }
        assert!(seed_articles("astrology").is_empty());
    }

    #[test]
    fn business_groups_by_pattern() {
        let groups = group_subtopics(&seed_articles("business"), "business", 1);
        assert_eq!(groups[0].0.id, "business_ipo_0");
        assert_eq!(groups[0].0.title, "IPO News");
        assert_eq!(groups[0].0.article_count, 2);
        assert_eq!(groups[0].0.latest_article.as_ref().map(|a| a.id.as_str()), Some("biz-2"));
        assert_eq!(groups[1].0.id, "business_earnings_1");
    }

    #[test]
    fn single_word_patterns_match_whole_words_only() {
        // "said" must not match the "ai" pattern
        let article = Article {
            id: "x".into(),
            title: "Officials said little".into(),
            description: "Nothing else".into(),
            url: String::new(),
            source: String::new(),
            published_at: None,
        };
        let groups = group_subtopics(&[article], "technology", 1);
        assert_eq!(groups[0].0.title, "General Technology News");
    }

    #[test]
    fn min_articles_drops_small_groups() {
        let groups = group_subtopics(&seed_articles("business"), "business", 2);
        assert_eq!(groups.len(), 1);
    }

    #[tokio::test]
    async fn seed_source_round_trips_subtopic_ids() {
        let source = SeedSource;
        let subtopics = source.subtopics("science").await.unwrap();
        assert!(!subtopics.is_empty());
        let data = source
            .subtopic("science", &subtopics[0].id, common::Style::Casual)
            .await
            .unwrap();
        assert_eq!(data.articles.len(), subtopics[0].article_count);
        assert!(source.subtopic("science", "nope", common::Style::Casual).await.is_err());
    }
}
