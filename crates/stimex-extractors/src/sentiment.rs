//! Lexicon-based sentiment scoring (VADER).
//!
//! [`VaderAnalyzer`] applies the VADER rules over a valence lexicon:
//! booster words, negation, capitalisation emphasis, the "but" shift,
//! "least" and "no" handling, and exclamation/question amplification. Word
//! valences are summed and normalised into a compound score in `[-1, 1]`.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use stimex_core::{
    Extractor, ExtractorResult, FeatureValue, StimexResult, Stimulus, StimulusType, Transformer,
    TransformerDescriptor,
};
use tracing::info;

use crate::text::text_of;

/// Sentiment of one text.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentScores {
    pub neg: f64,
    pub neu: f64,
    pub pos: f64,
    pub compound: f64,
}

/// Scores text sentiment.
pub trait SentimentAnalyzer: Send + Sync {
    fn polarity_scores(&self, text: &str) -> StimexResult<SentimentScores>;

    /// Short description recorded in extractor provenance.
    fn describe(&self) -> String;
}

const B_INCR: f64 = 0.293;
const B_DECR: f64 = -0.293;
const C_INCR: f64 = 0.733;
const N_SCALAR: f64 = -0.74;
const ALPHA: f64 = 15.0;

const NEGATE: &[&str] = &[
    "aint", "arent", "cannot", "cant", "couldnt", "darent", "didnt", "doesnt", "ain't", "aren't",
    "can't", "couldn't", "daren't", "didn't", "doesn't", "dont", "hadnt", "hasnt", "havent",
    "isnt", "mightnt", "mustnt", "neither", "don't", "hadn't", "hasn't", "haven't", "isn't",
    "mightn't", "mustn't", "neednt", "needn't", "never", "none", "nope", "nor", "not", "nothing",
    "nowhere", "oughtnt", "shant", "shouldnt", "uhuh", "wasnt", "werent", "oughtn't", "shan't",
    "shouldn't", "uh-uh", "wasn't", "weren't", "without", "wont", "wouldnt", "won't", "wouldn't",
    "rarely", "seldom", "despite",
];

static BOOSTERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    let incr = [
        "absolutely", "amazingly", "awfully", "completely", "considerably", "decidedly", "deeply",
        "effing", "enormously", "entirely", "especially", "exceptionally", "extremely",
        "fabulously", "flipping", "flippin", "fricking", "frickin", "frigging", "friggin", "fully",
        "fucking", "greatly", "hella", "highly", "hugely", "incredibly", "intensely", "majorly",
        "more", "most", "particularly", "purely", "quite", "really", "remarkably", "so",
        "substantially", "thoroughly", "totally", "tremendously", "uber", "unbelievably",
        "unusually", "utterly", "very",
    ];
    let decr = [
        "almost", "barely", "hardly", "just enough", "kind of", "kinda", "kindof", "kind-of",
        "less", "little", "marginally", "occasionally", "partly", "scarcely", "slightly",
        "somewhat", "sort of", "sorta", "sortof", "sort-of",
    ];
    incr.iter()
        .map(|w| (*w, B_INCR))
        .chain(decr.iter().map(|w| (*w, B_DECR)))
        .collect()
});

fn is_upper(word: &str) -> bool {
    word.chars().any(char::is_uppercase) && !word.chars().any(char::is_lowercase)
}

fn is_negated(word: &str) -> bool {
    NEGATE.contains(&word) || word.contains("n't")
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Tokens with surrounding punctuation removed. Short tokens keep their
/// punctuation so emoticons survive; single characters are dropped.
fn words_and_emoticons(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|token| {
            let stripped = token.trim_matches(|c: char| c.is_ascii_punctuation());
            if stripped.chars().count() <= 2 {
                token
            } else {
                stripped
            }
        })
        .filter(|w| w.chars().count() > 1)
        .collect()
}

/// VADER over a word → mean valence lexicon.
#[derive(Debug, Clone)]
pub struct VaderAnalyzer {
    lexicon: HashMap<String, f64>,
}

impl VaderAnalyzer {
    pub fn new(lexicon: HashMap<String, f64>) -> Self {
        Self { lexicon }
    }

    /// Parse `vader_lexicon.txt`: tab-separated word and mean valence,
    /// further columns ignored.
    pub fn from_lexicon_reader<R: BufRead>(reader: R) -> StimexResult<Self> {
        let mut lexicon = HashMap::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let mut cols = line.split('\t');
            let (Some(word), Some(valence)) = (cols.next(), cols.next()) else {
                continue;
            };
            let valence: f64 = valence.trim().parse().map_err(|_| {
                stimex_core::StimexError::validation(format!(
                    "lexicon line {} has a non-numeric valence '{}'",
                    n + 1,
                    valence
                ))
            })?;
            lexicon.insert(word.to_string(), valence);
        }
        Ok(Self::new(lexicon))
    }

    pub fn from_lexicon_path(path: impl AsRef<Path>) -> StimexResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            stimex_core::StimexError::resource("vader_lexicon", format!("{}: {}", path.display(), e))
        })?;
        let analyzer = Self::from_lexicon_reader(std::io::BufReader::new(file))?;
        info!(path = %path.display(), entries = analyzer.lexicon.len(), "Loaded VADER lexicon");
        Ok(analyzer)
    }

    fn in_lexicon(&self, word: &str) -> bool {
        self.lexicon.contains_key(word)
    }

    fn scalar_inc_dec(word: &str, valence: f64, cap_diff: bool) -> f64 {
        let lower = word.to_lowercase();
        let Some(&boost) = BOOSTERS.get(lower.as_str()) else {
            return 0.0;
        };
        let mut scalar = if valence < 0.0 { -boost } else { boost };
        if is_upper(word) && cap_diff {
            scalar += if valence > 0.0 { C_INCR } else { -C_INCR };
        }
        scalar
    }

    fn negation_check(valence: f64, lower: &[String], start: usize, i: usize) -> f64 {
        let back = |n: usize| lower[i - n].as_str();
        match start {
            0 if is_negated(back(1)) => valence * N_SCALAR,
            1 if back(2) == "never" && matches!(back(1), "so" | "this") => valence * 1.25,
            1 if back(2) == "without" && back(1) == "doubt" => valence,
            1 if is_negated(back(2)) => valence * N_SCALAR,
            2 if back(3) == "never"
                && (matches!(back(2), "so" | "this") || matches!(back(1), "so" | "this")) =>
            {
                valence * 1.25
            }
            2 if back(3) == "without" && (back(2) == "doubt" || back(1) == "doubt") => valence,
            2 if is_negated(back(3)) => valence * N_SCALAR,
            _ => valence,
        }
    }

    fn least_check(&self, valence: f64, lower: &[String], i: usize) -> f64 {
        if i > 1 && !self.in_lexicon(&lower[i - 1]) && lower[i - 1] == "least" {
            if lower[i - 2] != "at" && lower[i - 2] != "very" {
                return valence * N_SCALAR;
            }
        } else if i > 0 && !self.in_lexicon(&lower[i - 1]) && lower[i - 1] == "least" {
            return valence * N_SCALAR;
        }
        valence
    }

    fn sentiment_valence(&self, words: &[&str], lower: &[String], i: usize, cap_diff: bool) -> f64 {
        let item = words[i];
        let Some(&base) = self.lexicon.get(&lower[i]) else {
            return 0.0;
        };
        let mut valence = base;

        if lower[i] == "no" && i + 1 < words.len() && self.in_lexicon(&lower[i + 1]) {
            valence = 0.0;
        }
        if (i > 0 && lower[i - 1] == "no")
            || (i > 1 && lower[i - 2] == "no")
            || (i > 2 && lower[i - 3] == "no" && matches!(lower[i - 1].as_str(), "or" | "nor"))
        {
            valence = base * N_SCALAR;
        }

        if is_upper(item) && cap_diff {
            valence += if valence > 0.0 { C_INCR } else { -C_INCR };
        }

        for start in 0..3 {
            if i > start && !self.in_lexicon(&lower[i - (start + 1)]) {
                let mut s = Self::scalar_inc_dec(words[i - (start + 1)], valence, cap_diff);
                if start == 1 && s != 0.0 {
                    s *= 0.95;
                } else if start == 2 && s != 0.0 {
                    s *= 0.9;
                }
                valence += s;
                valence = Self::negation_check(valence, lower, start, i);
            }
        }
        self.least_check(valence, lower, i)
    }

    fn punctuation_emphasis(text: &str) -> f64 {
        let exclamations = text.matches('!').count().min(4) as f64 * 0.292;
        let questions = text.matches('?').count();
        let question_amp = match questions {
            0 | 1 => 0.0,
            2 | 3 => questions as f64 * 0.18,
            _ => 0.96,
        };
        exclamations + question_amp
    }

    /// Score one text.
    pub fn score(&self, text: &str) -> SentimentScores {
        let words = words_and_emoticons(text);
        let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
        let upper_count = words.iter().filter(|w| is_upper(w)).count();
        let cap_diff = upper_count > 0 && upper_count < words.len();

        let mut sentiments = Vec::with_capacity(words.len());
        for i in 0..words.len() {
            if BOOSTERS.contains_key(lower[i].as_str())
                || (lower[i] == "kind" && lower.get(i + 1).map(String::as_str) == Some("of"))
            {
                sentiments.push(0.0);
                continue;
            }
            sentiments.push(self.sentiment_valence(&words, &lower, i, cap_diff));
        }

        if let Some(but) = lower.iter().position(|w| w == "but") {
            for (i, s) in sentiments.iter_mut().enumerate() {
                if i < but {
                    *s *= 0.5;
                } else if i > but {
                    *s *= 1.5;
                }
            }
        }

        if sentiments.is_empty() {
            return SentimentScores::default();
        }

        let amp = Self::punctuation_emphasis(text);
        let mut sum: f64 = sentiments.iter().sum();
        if sum > 0.0 {
            sum += amp;
        } else if sum < 0.0 {
            sum -= amp;
        }
        let compound = (sum / (sum * sum + ALPHA).sqrt()).clamp(-1.0, 1.0);

        let mut pos_sum: f64 = sentiments.iter().filter(|s| **s > 0.0).map(|s| s + 1.0).sum();
        let mut neg_sum: f64 = sentiments.iter().filter(|s| **s < 0.0).map(|s| s - 1.0).sum();
        let neu_count = sentiments.iter().filter(|s| **s == 0.0).count() as f64;
        if pos_sum > neg_sum.abs() {
            pos_sum += amp;
        } else if pos_sum < neg_sum.abs() {
            neg_sum -= amp;
        }
        let total = pos_sum + neg_sum.abs() + neu_count;

        SentimentScores {
            neg: round_to((neg_sum / total).abs(), 3),
            neu: round_to((neu_count / total).abs(), 3),
            pos: round_to((pos_sum / total).abs(), 3),
            compound: round_to(compound, 4),
        }
    }
}

impl SentimentAnalyzer for VaderAnalyzer {
    fn polarity_scores(&self, text: &str) -> StimexResult<SentimentScores> {
        Ok(self.score(text))
    }

    fn describe(&self) -> String {
        format!("vader(lexicon={})", self.lexicon.len())
    }
}

/// Sentiment scores of each text stimulus.
pub struct VaderSentimentExtractor {
    descriptor: TransformerDescriptor,
    analyzer: Arc<dyn SentimentAnalyzer>,
}

impl VaderSentimentExtractor {
    pub const NAME: &'static str = "VADERSentimentExtractor";
    pub const FEATURES: [&'static str; 4] = [
        "sentiment_neg",
        "sentiment_neu",
        "sentiment_pos",
        "sentiment_compound",
    ];

    pub fn new(analyzer: Arc<dyn SentimentAnalyzer>) -> Self {
        let descriptor =
            TransformerDescriptor::new(Self::NAME, "1.0").with_param("analyzer", analyzer.describe());
        Self {
            descriptor,
            analyzer,
        }
    }

    /// Extractor over the lexicon file at `path`.
    pub fn from_lexicon_path(path: impl AsRef<Path>) -> StimexResult<Self> {
        Ok(Self::new(Arc::new(VaderAnalyzer::from_lexicon_path(path)?)))
    }
}

impl Transformer for VaderSentimentExtractor {
    fn descriptor(&self) -> &TransformerDescriptor {
        &self.descriptor
    }

    fn input_type(&self) -> StimulusType {
        StimulusType::AnyText
    }
}

impl Extractor for VaderSentimentExtractor {
    fn extract_one(&self, stim: &Stimulus) -> StimexResult<ExtractorResult> {
        let scores = self.analyzer.polarity_scores(text_of(self.name(), stim)?)?;
        let row = [scores.neg, scores.neu, scores.pos, scores.compound]
            .into_iter()
            .map(FeatureValue::Number)
            .collect();
        ExtractorResult::new(
            vec![row],
            stim,
            &self.descriptor,
            Self::FEATURES.iter().map(|f| f.to_string()).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stimex_core::TextDocument;

    fn analyzer() -> VaderAnalyzer {
        let lexicon = [("good", 1.9), ("great", 3.1), ("bad", -2.5), ("hate", -2.7)]
            .into_iter()
            .map(|(w, v)| (w.to_string(), v))
            .collect();
        VaderAnalyzer::new(lexicon)
    }

    #[test]
    fn test_simple_positive() {
        let scores = analyzer().score("The food is good");
        assert_eq!(scores.compound, 0.4404);
        assert_eq!(scores.pos, 0.492);
        assert_eq!(scores.neu, 0.508);
        assert_eq!(scores.neg, 0.0);
    }

    #[test]
    fn test_negation_flips() {
        let scores = analyzer().score("The food is not good");
        assert!(scores.compound < 0.0);
        assert!(scores.neg > 0.0);
    }

    #[test]
    fn test_boosters_and_caps_intensify() {
        let a = analyzer();
        let plain = a.score("the food is good").compound;
        let boosted = a.score("the food is very good").compound;
        let shouted = a.score("the food is GOOD").compound;
        assert!(boosted > plain);
        assert!(shouted > plain);
    }

    #[test]
    fn test_but_shifts_weight() {
        let scores = analyzer().score("the food is good but the service is bad");
        assert!(scores.compound < 0.0);
    }

    #[test]
    fn test_exclamation_amplifies() {
        let a = analyzer();
        assert!(a.score("great!!!").compound > a.score("great").compound);
    }

    #[test]
    fn test_neutral_text() {
        let scores = analyzer().score("the table");
        assert_eq!(scores.compound, 0.0);
        assert_eq!(scores.neu, 1.0);
        assert_eq!(analyzer().score(""), SentimentScores::default());
    }

    #[test]
    fn test_lexicon_parsing() {
        let text = "good\t1.9\t0.9434\t[2, 1, 2]\n:)\t2.0\t1.18322\t[2, 2]\n";
        let a = VaderAnalyzer::from_lexicon_reader(text.as_bytes()).unwrap();
        assert!(a.score("good :)").compound > a.score("good").compound);
    }

    #[test]
    fn test_extractor_features() {
        let ext = VaderSentimentExtractor::new(Arc::new(analyzer()));
        let result = ext.extract(&TextDocument::new("d", "I hate it").into()).unwrap();
        assert_eq!(
            result.features(),
            ["sentiment_neg", "sentiment_neu", "sentiment_pos", "sentiment_compound"]
        );
        assert_eq!(result.extractor().name, "VADERSentimentExtractor");
        assert!(result.get("sentiment_compound").and_then(FeatureValue::as_f64).unwrap() < 0.0);
    }
}
