//! Keyword type shared by enqueue input, grounding output, and results.

use serde::{Deserialize, Serialize};

fn default_score() -> f64 {
    1.0
}

/// A search keyword, either chosen by the operator or proposed by grounding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Keyword {
    /// The keyword text.
    pub term: String,
    /// Relevance score assigned by grounding; operator-picked keywords default to 1.0.
    #[serde(default = "default_score")]
    pub score: f64,
    /// Knowledge-base documents the keyword was retrieved from.
    #[serde(default)]
    pub sources: Vec<String>,
}

impl Keyword {
    /// Construct an operator-selected keyword with the default score.
    #[must_use]
    pub fn selected(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            score: default_score(),
            sources: Vec::new(),
        }
    }
}
