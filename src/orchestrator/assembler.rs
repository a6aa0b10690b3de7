//! Result assembly: normalize a raw generation answer into a session result.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

use crate::models::input::GenerationInput;
use crate::models::keyword::Keyword;
use crate::models::result::{
    FaqItem, GenerationResult, KeywordSource, Provenance, ScoreBreakdown,
};
use crate::pipeline::wire::GenerationResponse;
use crate::{AppError, Result};

/// `[h:]mm:ss` or `m:ss` at line start, then the chapter title.
const CHAPTER_PATTERN: &str = r"^\s*(?:\d{1,2}:)?\d{1,2}:\d{2}\b";

fn chapter_line() -> Result<&'static Regex> {
    static CHAPTER: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    CHAPTER
        .get_or_init(|| Regex::new(CHAPTER_PATTERN))
        .as_ref()
        .map_err(|err| AppError::Config(format!("invalid chapter pattern: {err}")))
}

/// Count chapter lines in free-text timestamps.
///
/// # Errors
///
/// Returns `AppError::Config` if the chapter pattern cannot be compiled.
pub fn count_timestamps(text: &str) -> Result<usize> {
    let chapter = chapter_line()?;
    Ok(text.lines().filter(|line| chapter.is_match(line)).count())
}

/// Prefix with `#`, drop inner whitespace, de-duplicate case-insensitively.
///
/// `fixed` hashtags come first, in their configured order.
#[must_use]
pub fn normalize_hashtags(fixed: &[String], generated: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    fixed
        .iter()
        .chain(generated)
        .filter_map(|raw| {
            let body: String = raw
                .trim()
                .trim_start_matches('#')
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            if body.is_empty() || !seen.insert(body.to_lowercase()) {
                return None;
            }
            Some(format!("#{body}"))
        })
        .collect()
}

/// Build the session result from a generation answer.
///
/// # Errors
///
/// Returns `AppError::Malformed` when the answer has no content, or has
/// an empty description although the description section was requested.
pub fn assemble(
    input: &GenerationInput,
    response: GenerationResponse,
    keywords: Vec<Keyword>,
    keyword_source: KeywordSource,
) -> Result<GenerationResult> {
    let content = response
        .content
        .ok_or_else(|| AppError::Malformed("generation response has no content".into()))?;
    let description = content
        .description
        .map(|d| d.trim().to_owned())
        .unwrap_or_default();
    if description.is_empty() && input.sections.description {
        return Err(AppError::Malformed(
            "generation response has no description".into(),
        ));
    }

    let timestamps = content.timestamps.unwrap_or_default().trim().to_owned();
    let timestamp_count = count_timestamps(&timestamps)?;

    let faq = content
        .faq
        .into_iter()
        .filter(|item| !item.question.trim().is_empty() && !item.answer.trim().is_empty())
        .map(|item| FaqItem {
            question: item.question.trim().to_owned(),
            answer: item.answer.trim().to_owned(),
        })
        .collect();

    let score = response
        .score
        .map(|s| ScoreBreakdown {
            total: s.total,
            criteria: s.breakdown,
        })
        .unwrap_or_default();

    let metadata = response.metadata.unwrap_or_default();

    Ok(GenerationResult {
        description,
        timestamps,
        timestamp_count,
        hashtags: normalize_hashtags(&input.fixed_hashtags, &content.hashtags),
        faq,
        usp_points: response.usp.map(|u| u.points).unwrap_or_default(),
        score,
        provenance: Provenance {
            engine: metadata.engine,
            model: metadata.model,
            keywords,
            keyword_source,
            generated_at: Utc::now(),
        },
    })
}
