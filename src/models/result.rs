//! Assembled output of a completed generation session.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::keyword::Keyword;

/// One question/answer pair for the FAQ section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct FaqItem {
    /// Viewer question.
    pub question: String,
    /// Answer text.
    pub answer: String,
}

/// Quality score reported by the generation pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ScoreBreakdown {
    /// Overall score.
    pub total: f64,
    /// Per-criterion scores keyed by criterion name.
    #[serde(default)]
    pub criteria: BTreeMap<String, f64>,
}

/// Where the keywords used for generation came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeywordSource {
    /// Chosen by the operator at enqueue time.
    Supplied,
    /// Proposed by the grounding stage.
    Grounded,
}

/// How a result was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Provenance {
    /// Engine reported by the generation pipeline.
    pub engine: Option<String>,
    /// Model reported by the generation pipeline.
    pub model: Option<String>,
    /// Keywords passed to generation.
    pub keywords: Vec<Keyword>,
    /// Origin of those keywords.
    pub keyword_source: KeywordSource,
    /// When the result was assembled.
    pub generated_at: DateTime<Utc>,
}

/// Normalized generation output stored on a completed session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GenerationResult {
    /// Video description body.
    pub description: String,
    /// Chapter list as free text, one chapter per line.
    pub timestamps: String,
    /// Number of chapter lines found in `timestamps`.
    pub timestamp_count: usize,
    /// Hashtags, each prefixed with `#`, fixed hashtags first.
    pub hashtags: Vec<String>,
    /// FAQ section.
    pub faq: Vec<FaqItem>,
    /// Unique selling points extracted from the transcript.
    pub usp_points: Vec<String>,
    /// Quality score.
    pub score: ScoreBreakdown,
    /// Production metadata.
    pub provenance: Provenance,
}
