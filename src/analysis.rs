//! Text analysis
//!
//! Turns field text into a stream of `(token, position)` pairs for the
//! indexing chain. Splitting follows Unicode word boundaries; lowercasing,
//! stopword removal and Snowball stemming are optional per
//! [`AnalyzerConfig`].

use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::AnalyzerConfig;

/// A single analyzed token and its position within the field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub position: u32,
}

/// Text analyzer with optional stemming and stopword removal
pub struct Analyzer {
    config: AnalyzerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl Analyzer {
    /// Create a new analyzer from configuration
    pub fn new(config: &AnalyzerConfig) -> Self {
        let stemmer = if config.stem {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Analyze text into tokens with positions
    ///
    /// Positions are assigned after filtering, so the first surviving token
    /// is at position 0 and consecutive tokens differ by 1.
    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();

        for word in text.unicode_words() {
            let mut token = if self.config.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };

            if token.len() < self.config.min_token_length
                || token.len() > self.config.max_token_length
                || self.stopwords.contains(&token)
            {
                continue;
            }

            if let Some(stemmer) = &self.stemmer {
                token = stemmer.stem(&token).to_string();
            }

            let position = tokens.len() as u32;
            tokens.push(Token {
                text: token,
                position,
            });
        }

        tokens
    }

    /// Analyze a single term the way an indexed token would be, for query
    /// text that must match the index vocabulary
    pub fn normalize(&self, term: &str) -> String {
        let mut token = if self.config.lowercase {
            term.to_lowercase()
        } else {
            term.to_string()
        };
        if let Some(stemmer) = &self.stemmer {
            token = stemmer.stem(&token).to_string();
        }
        token
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(&AnalyzerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_analysis() {
        let analyzer = Analyzer::default();
        let tokens = analyzer.analyze("The Quick Brown Fox!");

        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["the", "quick", "brown", "fox"]);

        let positions: Vec<_> = tokens.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_single_char_tokens_survive() {
        let analyzer = Analyzer::default();
        let tokens = analyzer.analyze("a b c d");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].text, "a");
        assert_eq!(tokens[3].position, 3);
    }

    #[test]
    fn test_stopword_removal() {
        let config = AnalyzerConfig {
            remove_stopwords: true,
            ..Default::default()
        };
        let analyzer = Analyzer::new(&config);
        let tokens = analyzer.analyze("this is a document about the engine");

        let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert!(!texts.contains(&"the"));
        assert!(texts.contains(&"document"));
    }

    #[test]
    fn test_stemming() {
        let config = AnalyzerConfig {
            stem: true,
            ..Default::default()
        };
        let analyzer = Analyzer::new(&config);
        let tokens = analyzer.analyze("running runs");
        assert!(tokens.iter().all(|t| t.text == "run"));
        assert_eq!(analyzer.normalize("Running"), "run");
    }
}
