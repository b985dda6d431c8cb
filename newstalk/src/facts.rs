// Fact extraction for the facts panel
use crate::models::Article;

/// Characters of the description kept in a fact bullet.
pub const FACT_DESCRIPTION_CHARS: usize = 150;

/// Reduce the leading articles to short summary bullets.
///
/// Takes the first `k` articles that have both a title and a description and
/// renders each as `"<title>: <description clipped>..."`. When no article
/// qualifies a single category-specific sentence is returned instead. `k == 0`
/// yields no facts at all.
pub fn extract_facts(articles: &[Article], category: &str, k: usize) -> Vec<String> {
    if k == 0 {
        return Vec::new();
    }
    let facts: Vec<String> = articles
        .iter()
        .filter(|a| a.is_complete())
        .take(k)
        .map(|a| {
            format!(
                "{}: {}...",
                a.title.trim(),
                clip(a.description.trim(), FACT_DESCRIPTION_CHARS)
            )
        })
        .collect();

    if facts.is_empty() {
        return vec![fallback_fact(category)];
    }
    facts
}

pub fn fallback_fact(category: &str) -> String {
    let category = category.trim();
    if category.is_empty() {
        "Recent developments in the news are being closely monitored.".to_string()
    } else {
        format!("Recent developments in {} are being closely monitored.", category.to_lowercase())
    }
}

/// Keep at most `max_chars` characters, never splitting a code point.
pub fn clip(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, description: &str) -> Article {
        Article {
            id: title.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            url: String::new(),
            source: "Wire".to_string(),
            published_at: None,
        }
    }

    #[test]
    fn empty_list_gives_category_fallback() {
        assert_eq!(
            extract_facts(&[], "science", 5),
            vec!["Recent developments in science are being closely monitored.".to_string()]
        );
    }

    #[test]
    fn skips_incomplete_articles_and_respects_k() {
        let articles = vec![
            article("A", "first"),
            article("", "no title"),
            article("B", "   "),
            article("C", "third"),
            article("D", "fourth"),
        ];
        let facts = extract_facts(&articles, "business", 2);
        assert_eq!(facts, vec!["A: first...".to_string(), "C: third...".to_string()]);
    }

    #[test]
    fn only_incomplete_articles_still_yield_one_fact() {
        let facts = extract_facts(&[article("", "x")], "health", 3);
        assert_eq!(facts.len(), 1);
        assert!(facts[0].contains("health"));
    }

    #[test]
    fn description_is_clipped_to_150_chars() {
        let long = "é".repeat(400);
        let facts = extract_facts(&[article("T", &long)], "general", 5);
        let body = facts[0].strip_prefix("T: ").unwrap().strip_suffix("...").unwrap();
        assert_eq!(body.chars().count(), FACT_DESCRIPTION_CHARS);
    }

    #[test]
    fn zero_k_yields_no_facts() {
        assert!(extract_facts(&[article("A", "first")], "business", 0).is_empty());
        assert!(extract_facts(&[], "business", 0).is_empty());
    }

    #[test]
    fn clip_short_text_is_untouched() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdef", 3), "abc");
    }
}
