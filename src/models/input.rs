//! Immutable enqueue snapshot for a generation session.

use serde::{Deserialize, Serialize};

use super::keyword::Keyword;
use crate::{AppError, Result};

fn default_true() -> bool {
    true
}

/// Which sections of the metadata bundle to generate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ContentFlags {
    /// Long-form video description.
    #[serde(default = "default_true")]
    pub description: bool,
    /// Chapter timestamps.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    /// Question/answer pairs.
    #[serde(default = "default_true")]
    pub faq: bool,
    /// Hashtag list.
    #[serde(default = "default_true")]
    pub hashtags: bool,
}

impl Default for ContentFlags {
    fn default() -> Self {
        Self {
            description: true,
            timestamps: true,
            faq: true,
            hashtags: true,
        }
    }
}

impl ContentFlags {
    fn any(self) -> bool {
        self.description || self.timestamps || self.faq || self.hashtags
    }
}

/// Kind of video the metadata is written for.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Product introduction or review.
    #[default]
    Review,
    /// Step-by-step usage guide.
    Tutorial,
    /// Unboxing / first impressions.
    Unboxing,
    /// Head-to-head comparison against other products.
    Comparison,
    /// Short-form vertical clip.
    Shorts,
}

/// Campaign metadata carried through to the generated draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CampaignInfo {
    /// Campaign name.
    #[serde(default)]
    pub name: Option<String>,
    /// Intended audience description.
    #[serde(default)]
    pub target_audience: Option<String>,
    /// Launch date as entered by the operator.
    #[serde(default)]
    pub launch_date: Option<String>,
}

/// All parameters needed to run the pipeline for one product.
///
/// Captured when the session is enqueued and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GenerationInput {
    /// Product identifier in the host catalog.
    pub product_id: String,
    /// Display name of the product.
    pub product_name: String,
    /// Product category.
    #[serde(default)]
    pub category: String,
    /// Full video transcript.
    pub transcript: String,
    /// Public video URL, if already uploaded.
    #[serde(default)]
    pub video_url: Option<String>,
    /// Operator-selected keywords; when empty the grounding stage proposes some.
    #[serde(default)]
    pub selected_keywords: Vec<Keyword>,
    /// Video format.
    #[serde(default)]
    pub content_type: ContentType,
    /// Sections to generate.
    #[serde(default)]
    pub sections: ContentFlags,
    /// Hashtags that must appear in every result.
    #[serde(default)]
    pub fixed_hashtags: Vec<String>,
    /// Campaign metadata.
    #[serde(default)]
    pub campaign: CampaignInfo,
}

impl GenerationInput {
    /// Whether the grounding stage runs for this input.
    #[must_use]
    pub fn needs_grounding(&self) -> bool {
        self.selected_keywords.is_empty()
    }

    /// Check the local preconditions for enqueueing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        require("product_id", &self.product_id)?;
        require("product_name", &self.product_name)?;
        require("transcript", &self.transcript)?;

        if let Some(ref url) = self.video_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AppError::Validation(
                    "video_url must be an http(s) URL".into(),
                ));
            }
        }

        if self
            .selected_keywords
            .iter()
            .any(|keyword| keyword.term.trim().is_empty())
        {
            return Err(AppError::Validation(
                "selected_keywords must not contain empty terms".into(),
            ));
        }

        if !self.sections.any() {
            return Err(AppError::Validation(
                "at least one section must be enabled".into(),
            ));
        }

        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(AppError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
