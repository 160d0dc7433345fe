//! Lexicon-based sentiment scoring for eye expression
//!
//! Produces a compound score in [-1, 1] from a fixed word lexicon with
//! negation handling and intensifiers. Drives the sentiment offset of the
//! eye channel; a wrong score costs a slightly-off eyelid, nothing more.

const POSITIVE: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "brilliant", "delighted", "excellent", "exciting",
    "fantastic", "friend", "fun", "glad", "good", "great", "happy", "helpful", "joy", "kind",
    "laugh", "love", "lovely", "magical", "nice", "perfect", "play", "smile", "special", "super",
    "sweet", "thanks", "welcome", "wonderful", "yay",
];

const NEGATIVE: &[&str] = &[
    "afraid", "angry", "annoyed", "awful", "bad", "bored", "broken", "cry", "dark", "dead",
    "difficult", "fail", "fear", "frustrated", "hate", "horrible", "hurt", "lonely", "lost",
    "mad", "mean", "sad", "scared", "scary", "sorry", "terrible", "tired", "trouble", "ugly",
    "unhappy", "worried", "worse", "worst", "wrong",
];

const NEGATIONS: &[&str] = &["not", "no", "never", "dont", "don't", "isnt", "isn't", "cant", "can't"];

const INTENSIFIERS: &[&str] = &["very", "really", "so", "extremely", "truly", "absolutely"];

/// Scores text sentiment for the eye channel
#[derive(Debug, Default, Clone)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    /// Create a new analyzer
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Score `text` in [-1, 1]; positive = happy, negative = sad.
    ///
    /// Empty or lexicon-free text scores 0.0 (neutral).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn analyze(&self, text: &str) -> f32 {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return 0.0;
        }

        let mut score = 0.0f32;
        let mut hits = 0usize;

        for (idx, word) in words.iter().enumerate() {
            let polarity = if POSITIVE.contains(&word.as_str()) {
                1.0
            } else if NEGATIVE.contains(&word.as_str()) {
                -1.0
            } else {
                continue;
            };

            let mut weight = 1.0f32;
            // Look back up to two words for negation and intensity
            for back in idx.saturating_sub(2)..idx {
                let prev = words[back].as_str();
                if NEGATIONS.contains(&prev) {
                    weight = -weight * 0.7;
                } else if INTENSIFIERS.contains(&prev) {
                    weight *= 1.3;
                }
            }

            score += polarity * weight;
            hits += 1;
        }

        if hits == 0 {
            return 0.0;
        }

        // Exclamation marks amplify whatever polarity is present
        let exclamations = text.matches('!').count().min(3) as f32;
        let mut compound = score / (hits as f32 + 2.0);
        compound *= 1.0 + 0.1 * exclamations;

        let result = compound.clamp(-1.0, 1.0);
        tracing::debug!(score = result, "sentiment analyzed");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_text_scores_zero() {
        let analyzer = SentimentAnalyzer::new();
        assert_eq!(analyzer.analyze("the cat sat on the mat"), 0.0);
        assert_eq!(analyzer.analyze(""), 0.0);
    }

    #[test]
    fn positive_text_scores_positive() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.analyze("what a wonderful happy day") > 0.0);
    }

    #[test]
    fn negative_text_scores_negative() {
        let analyzer = SentimentAnalyzer::new();
        assert!(analyzer.analyze("that was a terrible scary story") < 0.0);
    }

    #[test]
    fn negation_flips_polarity() {
        let analyzer = SentimentAnalyzer::new();
        let plain = analyzer.analyze("that is good");
        let negated = analyzer.analyze("that is not good");
        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn score_stays_in_range() {
        let analyzer = SentimentAnalyzer::new();
        let very = analyzer.analyze(
            "amazing amazing wonderful wonderful fantastic fantastic love love love!!!",
        );
        assert!(very <= 1.0);
        assert!(very >= -1.0);
    }
}
