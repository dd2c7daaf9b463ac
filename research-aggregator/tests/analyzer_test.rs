mod common;

use common::{HttpStub, StubResponse};
use interfaces::{AnalysisRequest, Analyzer, DigestLine, GatewayError, Language, SourceKind};
use research_aggregator::analyzer::{build_analysis_prompt, build_digest_prompt, digest_line, parse_analysis};
use research_aggregator::{OpenAiAnalyzer, ResearchError};
use std::time::Duration;

#[test]
fn test_parse_well_formed_reply() {
    let reply = r#"{
        "summary": "Agents are moving into production.",
        "insights": ["Costs fall", "Tooling matures", "  "],
        "business_relevance": "Teams can automate support.",
        "share_score": 87,
        "share_reason": "Timely and concrete."
    }"#;

    let analysis = parse_analysis(reply).unwrap();
    assert_eq!(analysis.summary, "Agents are moving into production.");
    assert_eq!(analysis.insights, vec!["Costs fall", "Tooling matures"]);
    assert_eq!(analysis.share_score, 87.0);
    assert_eq!(analysis.share_reason, "Timely and concrete.");
}

#[test]
fn test_parse_fenced_reply_with_string_score() {
    let reply = "```json\n{\"summary\": \"S\", \"insights\": \"single\", \"share_score\": \"72.5\"}\n```";

    let analysis = parse_analysis(reply).unwrap();
    assert_eq!(analysis.insights, vec!["single"]);
    assert_eq!(analysis.share_score, 72.5);
    assert_eq!(analysis.business_relevance, "");
}

#[test]
fn test_parse_clamps_out_of_range_scores() {
    assert_eq!(parse_analysis(r#"{"summary": "S", "share_score": 130}"#).unwrap().share_score, 100.0);
    assert_eq!(parse_analysis(r#"{"summary": "S", "share_score": -3}"#).unwrap().share_score, 0.0);
}

#[test]
fn test_parse_rejects_incomplete_replies() {
    for reply in [
        "not json at all",
        "[1, 2, 3]",
        r#"{"share_score": 80}"#,
        r#"{"summary": "   ", "share_score": 80}"#,
        r#"{"summary": "S"}"#,
        r#"{"summary": "S", "share_score": "high"}"#,
        r#"{"summary": "S", "share_score": null}"#,
    ] {
        assert!(
            matches!(parse_analysis(reply), Err(GatewayError::InvalidAnalysis(_))),
            "{} should be rejected",
            reply
        );
    }
}

#[test]
fn test_analysis_prompt_carries_request() {
    let request = AnalysisRequest {
        title: "Agents in production".to_string(),
        body: "Body text".to_string(),
        source_kind: SourceKind::Podcast,
        topic: "AI agents".to_string(),
        language: Language::Ko,
    };

    let prompt = build_analysis_prompt(&request);
    assert!(prompt.contains("Title: Agents in production"));
    assert!(prompt.contains("Kind: podcast"));
    assert!(prompt.contains("Related topic: AI agents"));
    assert!(prompt.contains("Body text"));
    assert!(prompt.contains("Respond in Korean."));
    assert!(prompt.contains("\"share_score\": 85"));
}

#[test]
fn test_digest_prompt_lists_lines() {
    let lines = vec![
        DigestLine {
            source_kind: SourceKind::Paper,
            title: "Planning agents".to_string(),
            share_score: 91.4,
        },
        DigestLine {
            source_kind: SourceKind::Video,
            title: "Agent demo".to_string(),
            share_score: 64.0,
        },
    ];

    assert_eq!(digest_line(&lines[0]), "- [paper] Planning agents (score: 91)");
    let prompt = build_digest_prompt(&lines, Language::En);
    assert!(prompt.contains("- [paper] Planning agents (score: 91)\n- [video] Agent demo (score: 64)"));
    assert!(prompt.contains("Write in English."));
}

#[test]
fn test_empty_api_key_is_a_config_error() {
    let result = OpenAiAnalyzer::new(
        " ".to_string(),
        "https://api.example.com/v1/".to_string(),
        "gpt-4o-mini".to_string(),
        Duration::from_secs(10),
    );
    assert!(matches!(result, Err(ResearchError::Config(_))));

    let analyzer = OpenAiAnalyzer::new(
        "sk-test".to_string(),
        "https://api.example.com/v1/".to_string(),
        "gpt-4o-mini".to_string(),
        Duration::from_secs(10),
    )
    .unwrap();
    assert_eq!(analyzer.model(), "gpt-4o-mini");
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        title: "Agents in production".to_string(),
        body: "Body text".to_string(),
        source_kind: SourceKind::Blog,
        topic: "AI agents".to_string(),
        language: Language::En,
    }
}

fn completion(content: &str) -> String {
    serde_json::json!({ "choices": [{ "message": { "content": content } }] }).to_string()
}

fn stub_analyzer(stub: &HttpStub) -> OpenAiAnalyzer {
    OpenAiAnalyzer::new(
        "sk-test".to_string(),
        stub.url("/v1/"),
        "gpt-4o-mini".to_string(),
        Duration::from_secs(5),
    )
    .unwrap()
    .with_retry_delay(Duration::from_millis(20))
}

#[tokio::test]
async fn test_analyze_retries_server_errors() {
    let reply = r#"{"summary": "Agents ship.", "insights": ["a"], "share_score": 77}"#;
    let stub = HttpStub::start(vec![
        StubResponse::new(502, "bad gateway"),
        StubResponse::new(429, "rate limited"),
        StubResponse::new(200, completion(reply)),
    ])
    .await;

    let analysis = stub_analyzer(&stub).analyze(&request()).await.unwrap();
    assert_eq!(analysis.summary, "Agents ship.");
    assert_eq!(analysis.share_score, 77.0);
    assert_eq!(stub.hits(), 3);

    let sent = stub.requests().pop().unwrap();
    assert!(sent.starts_with("POST /v1/chat/completions HTTP/1.1"));
    assert!(sent.to_lowercase().contains("authorization: bearer sk-test"));
    assert!(sent.contains("json_object"));
}

#[tokio::test]
async fn test_analyze_gives_up_after_three_attempts() {
    let stub = HttpStub::start(vec![StubResponse::new(503, "unavailable")]).await;

    let result = stub_analyzer(&stub).analyze(&request()).await;
    assert!(matches!(result, Err(GatewayError::Analyzer(_))));
    assert_eq!(stub.hits(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let stub = HttpStub::start(vec![StubResponse::new(401, "bad key")]).await;

    let result = stub_analyzer(&stub).summarize(&[], Language::Ko).await;
    assert!(matches!(result, Err(GatewayError::Analyzer(message)) if message.contains("401")));
    assert_eq!(stub.hits(), 1);
}

#[tokio::test]
async fn test_unparsable_completion_is_not_an_analysis() {
    let stub = HttpStub::start(vec![StubResponse::new(200, completion("I think it's great"))]).await;

    let result = stub_analyzer(&stub).analyze(&request()).await;
    assert!(matches!(result, Err(GatewayError::InvalidAnalysis(_))));
    assert_eq!(stub.hits(), 1);
}
