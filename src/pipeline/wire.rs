//! JSON payloads exchanged with the collaborator services.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::input::{CampaignInfo, ContentFlags, ContentType, GenerationInput};
use crate::models::keyword::Keyword;
use crate::models::result::{FaqItem, GenerationResult};

/// Body of a grounding call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingRequest {
    /// Product display name.
    pub product_name: String,
    /// Product category.
    pub category: String,
    /// Video transcript.
    pub transcript: String,
    /// Video URL, if any.
    pub video_url: Option<String>,
}

impl From<&GenerationInput> for GroundingRequest {
    fn from(input: &GenerationInput) -> Self {
        Self {
            product_name: input.product_name.clone(),
            category: input.category.clone(),
            transcript: input.transcript.clone(),
            video_url: input.video_url.clone(),
        }
    }
}

/// Grounding answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundingResponse {
    /// Proposed keywords, best first; required, but may be empty.
    pub keywords: Vec<Keyword>,
}

/// Body of a generation call: the full input snapshot plus effective keywords.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Product identifier.
    pub product_id: String,
    /// Product display name.
    pub product_name: String,
    /// Product category.
    pub category: String,
    /// Video transcript.
    pub transcript: String,
    /// Video URL, if any.
    pub video_url: Option<String>,
    /// Supplied or grounded keywords.
    pub keywords: Vec<Keyword>,
    /// Video format.
    pub content_type: ContentType,
    /// Sections to generate.
    pub sections: ContentFlags,
    /// Hashtags that must appear in the output.
    pub fixed_hashtags: Vec<String>,
    /// Campaign metadata.
    pub campaign: CampaignInfo,
}

impl GenerationRequest {
    /// Build a request from an input snapshot and the keywords to use.
    #[must_use]
    pub fn new(input: &GenerationInput, keywords: &[Keyword]) -> Self {
        Self {
            product_id: input.product_id.clone(),
            product_name: input.product_name.clone(),
            category: input.category.clone(),
            transcript: input.transcript.clone(),
            video_url: input.video_url.clone(),
            keywords: keywords.to_vec(),
            content_type: input.content_type,
            sections: input.sections,
            fixed_hashtags: input.fixed_hashtags.clone(),
            campaign: input.campaign.clone(),
        }
    }
}

/// Generated sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedContent {
    /// Description body; required.
    pub description: Option<String>,
    /// Chapter list as free text.
    #[serde(default)]
    pub timestamps: Option<String>,
    /// Hashtags, with or without `#`.
    #[serde(default)]
    pub hashtags: Vec<String>,
    /// FAQ pairs.
    #[serde(default)]
    pub faq: Vec<FaqItem>,
}

/// Unique selling points extracted from the transcript.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UspExtraction {
    /// Extracted points.
    #[serde(default)]
    pub points: Vec<String>,
}

/// Score object reported by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScorePayload {
    /// Overall score.
    #[serde(default)]
    pub total: f64,
    /// Per-criterion scores.
    #[serde(default)]
    pub breakdown: BTreeMap<String, f64>,
}

/// Engine details reported by the pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Engine name.
    #[serde(default)]
    pub engine: Option<String>,
    /// Model name.
    #[serde(default)]
    pub model: Option<String>,
}

/// Raw generation answer, normalized by the result assembler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    /// Generated sections; required.
    #[serde(default)]
    pub content: Option<GeneratedContent>,
    /// USP extraction result.
    #[serde(default)]
    pub usp: Option<UspExtraction>,
    /// Score object.
    #[serde(default)]
    pub score: Option<ScorePayload>,
    /// Engine details.
    #[serde(default)]
    pub metadata: Option<ResponseMetadata>,
}

/// Body of a draft persistence call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DraftRequest {
    /// Session the draft was produced by.
    pub session_id: String,
    /// Assembled result.
    pub result: GenerationResult,
    /// Original input snapshot.
    pub input: GenerationInput,
}

/// Draft persistence answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DraftResponse {
    /// Stored draft identifier.
    pub id: String,
}

/// Error body sent with non-2xx answers, by collaborators and by our own HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable failure message.
    pub error: String,
}
