// Lexical bias heuristic behind bubble shading

use serde::Serialize;

/// Subjective words and first-person hedges. Each counts once when present.
pub const BIAS_TERMS: &[&str] = &[
    "shocking",
    "clearly",
    "obviously",
    "i believe",
    "i think",
    "in my opinion",
    "unfortunately",
    "disgraceful",
    "very",
    "amazing",
    "terrible",
    "incredible",
    "devastating",
    "brilliant",
    "outrageous",
    "absolutely",
    "undeniably",
    "disaster",
    "scandal",
    "crisis",
];

const TERM_WEIGHT: f64 = 0.1;
const PUNCTUATION_WEIGHT: f64 = 0.05;

/// Score in `[0, 1]`; higher means more rhetorically loaded.
pub fn score_bias(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let terms = BIAS_TERMS.iter().filter(|t| lower.contains(*t)).count();
    let marks = lower.chars().filter(|c| matches!(c, '?' | '!')).count();
    let raw = terms as f64 * TERM_WEIGHT + marks as f64 * PUNCTUATION_WEIGHT;
    raw.clamp(0.0, 1.0)
}

/// Visual intensity of a bubble.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Shading {
    /// Background opacity in `[0.1, 0.9]`.
    pub opacity: f64,
    /// Border opacity, `opacity + 0.2` capped at 1.0.
    #[serde(rename = "borderOpacity")]
    pub border_opacity: f64,
}

pub fn shading_for(score: f64) -> Shading {
    let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
    let opacity = 0.1 + 0.8 * score;
    Shading {
        opacity,
        border_opacity: (opacity + 0.2).min(1.0),
    }
}

pub fn shade_text(text: &str) -> Shading {
    shading_for(score_bias(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn worked_example() {
        let score = score_bias("This is clearly shocking!");
        assert!((score - 0.25).abs() < EPS, "score was {}", score);
        let shading = shading_for(score);
        assert!((shading.opacity - 0.3).abs() < EPS);
        assert!((shading.border_opacity - 0.5).abs() < EPS);
    }

    #[test]
    fn neutral_text_scores_zero() {
        assert_eq!(score_bias("The committee met on Tuesday."), 0.0);
        assert!((shading_for(0.0).opacity - 0.1).abs() < EPS);
    }

    #[test]
    fn presence_not_count() {
        assert_eq!(score_bias("clearly clearly clearly"), score_bias("clearly"));
    }

    #[test]
    fn case_insensitive_phrases() {
        assert!((score_bias("I Believe so") - 0.1).abs() < EPS);
    }

    #[test]
    fn score_is_clamped_and_border_capped() {
        let loud = format!("{} {}", BIAS_TERMS.join(" "), "!?".repeat(20));
        assert_eq!(score_bias(&loud), 1.0);
        let shading = shading_for(1.0);
        assert!((shading.opacity - 0.9).abs() < EPS);
        assert_eq!(shading.border_opacity, 1.0);
    }

    #[test]
    fn deterministic_for_identical_text() {
        let text = "Unfortunately, this is a very big deal?!";
        assert_eq!(score_bias(text), score_bias(text));
        assert_eq!(shade_text(text), shade_text(text));
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert!((shading_for(-3.0).opacity - 0.1).abs() < EPS);
        assert!((shading_for(f64::NAN).opacity - 0.1).abs() < EPS);
        assert!((shading_for(7.0).opacity - 0.9).abs() < EPS);
    }
}
