use std::collections::BTreeMap;

use metagen_queue::models::input::GenerationInput;
use metagen_queue::models::keyword::Keyword;
use metagen_queue::models::result::{FaqItem, KeywordSource};
use metagen_queue::orchestrator::assembler::{assemble, count_timestamps, normalize_hashtags};
use metagen_queue::pipeline::wire::{
    GeneratedContent, GenerationResponse, ResponseMetadata, ScorePayload, UspExtraction,
};
use metagen_queue::AppError;

fn input(fixed: &[&str]) -> GenerationInput {
    let mut input: GenerationInput = serde_json::from_value(serde_json::json!({
        "product_id": "p-1",
        "product_name": "Air Fryer",
        "transcript": "hello"
    }))
    .expect("input parses");
    input.fixed_hashtags = fixed.iter().map(|s| (*s).to_owned()).collect();
    input
}

fn response() -> GenerationResponse {
    GenerationResponse {
        content: Some(GeneratedContent {
            description: Some("  Crispy fries without oil.  ".into()),
            timestamps: Some("00:00 Intro\n02:15 Cooking test\nnot a chapter\n10:01 Verdict\n".into()),
            hashtags: vec!["#AirFryer".into(), "kitchen gadgets".into(), "airfryer".into()],
            faq: vec![
                FaqItem {
                    question: " Is it loud? ".into(),
                    answer: "Not really.".into(),
                },
                FaqItem {
                    question: "Blank answer".into(),
                    answer: "   ".into(),
                },
            ],
        }),
        usp: Some(UspExtraction {
            points: vec!["No oil".into()],
        }),
        score: Some(ScorePayload {
            total: 87.5,
            breakdown: BTreeMap::from([("seo".to_owned(), 30.0)]),
        }),
        metadata: Some(ResponseMetadata {
            engine: Some("pipeline".into()),
            model: Some("large".into()),
        }),
    }
}

#[test]
fn assembles_every_section() {
    let keywords = vec![Keyword::selected("air fryer")];
    let result = assemble(
        &input(&["#Brand"]),
        response(),
        keywords.clone(),
        KeywordSource::Grounded,
    )
    .unwrap();

    assert_eq!(result.description, "Crispy fries without oil.");
    assert_eq!(result.timestamp_count, 3);
    assert!(result.timestamps.ends_with("10:01 Verdict"));
    assert_eq!(result.hashtags, vec!["#Brand", "#AirFryer", "#kitchengadgets"]);
    assert_eq!(result.faq.len(), 1);
    assert_eq!(result.faq[0].question, "Is it loud?");
    assert_eq!(result.usp_points, vec!["No oil"]);
    assert!((result.score.total - 87.5).abs() < f64::EPSILON);
    assert_eq!(result.score.criteria["seo"], 30.0);
    assert_eq!(result.provenance.engine.as_deref(), Some("pipeline"));
    assert_eq!(result.provenance.model.as_deref(), Some("large"));
    assert_eq!(result.provenance.keywords, keywords);
    assert_eq!(result.provenance.keyword_source, KeywordSource::Grounded);
}

#[test]
fn optional_parts_default_when_absent() {
    let response = GenerationResponse {
        content: Some(GeneratedContent {
            description: Some("Only a description".into()),
            ..GeneratedContent::default()
        }),
        ..GenerationResponse::default()
    };
    let result = assemble(&input(&[]), response, vec![], KeywordSource::Supplied).unwrap();

    assert_eq!(result.timestamps, "");
    assert_eq!(result.timestamp_count, 0);
    assert!(result.hashtags.is_empty());
    assert!(result.usp_points.is_empty());
    assert!(result.score.criteria.is_empty());
    assert!(result.provenance.engine.is_none());
}

#[test]
fn description_may_be_absent_when_its_section_is_off() {
    let mut no_description = input(&["#Brand"]);
    no_description.sections.description = false;
    assert!(no_description.validate().is_ok());

    let response = GenerationResponse {
        content: Some(GeneratedContent {
            description: None,
            timestamps: Some("00:00 Intro".into()),
            ..GeneratedContent::default()
        }),
        ..GenerationResponse::default()
    };
    let result = assemble(&no_description, response, vec![], KeywordSource::Supplied).unwrap();
    assert_eq!(result.description, "");
    assert_eq!(result.timestamp_count, 1);
    assert_eq!(result.hashtags, vec!["#Brand"]);
}

#[test]
fn requested_description_must_not_be_blank() {
    let response = GenerationResponse {
        content: Some(GeneratedContent {
            description: Some("  ".into()),
            ..GeneratedContent::default()
        }),
        ..GenerationResponse::default()
    };
    let err = assemble(&input(&[]), response, vec![], KeywordSource::Supplied).unwrap_err();
    assert_eq!(
        err,
        AppError::Malformed("generation response has no description".into())
    );
}

#[test]
fn missing_content_is_malformed() {
    let err = assemble(
        &input(&[]),
        GenerationResponse::default(),
        vec![],
        KeywordSource::Supplied,
    )
    .unwrap_err();
    assert_eq!(
        err,
        AppError::Malformed("generation response has no content".into())
    );
}

#[test]
fn chapter_lines_accept_hours_and_short_minutes() {
    assert_eq!(count_timestamps("0:00 Start\n1:02:03 Late\n12:34 Mid").unwrap(), 3);
    assert_eq!(count_timestamps("Intro 00:00\n:30 nope\n").unwrap(), 0);
}

#[test]
fn fixed_hashtags_win_duplicates() {
    let fixed = vec!["#Brand".to_owned(), "brand".to_owned()];
    let generated = vec!["#BRAND".to_owned(), "#new".to_owned()];
    assert_eq!(normalize_hashtags(&fixed, &generated), vec!["#Brand", "#new"]);
}
