//! Analyzer gateway backed by an OpenAI-compatible chat completions API.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use interfaces::defs::{
    AnalysisRequest, AnalysisResult, Analyzer, DigestLine, GatewayError, GatewayResult, Language,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::fetcher::retry_backoff;
use crate::types::{ResearchError, Result};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ANALYSIS_TEMPERATURE: f32 = 0.3;
const DIGEST_TEMPERATURE: f32 = 0.5;
const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

const ANALYST_SYSTEM_PROMPT: &str = "You are an expert content analyst. Always respond with valid JSON only.";
const BRIEFING_SYSTEM_PROMPT: &str = "You are an executive briefing specialist.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiAnalyzer {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    retry_delay: Duration,
}

impl OpenAiAnalyzer {
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(ResearchError::Config("analyzer API key is empty".to_string()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// First delay between retried calls; later ones double.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One chat completion. Retries on 429 and 5xx with exponential backoff.
    async fn chat(&self, system: &str, prompt: &str, temperature: f32, json_output: bool) -> GatewayResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
            response_format: json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };
        let url = format!("{}/chat/completions", self.base_url);

        let mut backoff = retry_backoff(self.retry_delay);
        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            if let Some(error) = &last_error {
                let Some(delay) = backoff.next_backoff() else {
                    break;
                };
                warn!("Analyzer call attempt {} failed: {}, retrying in {:?}", attempt, error, delay);
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(GatewayError::Analyzer(format!("request failed: {}", e)));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                last_error = Some(GatewayError::Analyzer(format!("API returned {}", status)));
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GatewayError::Analyzer(format!("API returned {}: {}", status, body)));
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| GatewayError::Analyzer(format!("unreadable response: {}", e)))?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| GatewayError::Analyzer("empty completion".to_string()))?;

            debug!(model = %self.model, "Analyzer call succeeded ({} chars)", content.len());
            return Ok(content);
        }

        Err(last_error.unwrap_or_else(|| GatewayError::Analyzer("retries exhausted".to_string())))
    }
}

#[async_trait]
impl Analyzer for OpenAiAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> GatewayResult<AnalysisResult> {
        let prompt = build_analysis_prompt(request);
        let content = self
            .chat(ANALYST_SYSTEM_PROMPT, &prompt, ANALYSIS_TEMPERATURE, true)
            .await?;
        parse_analysis(&content)
    }

    async fn summarize(&self, lines: &[DigestLine], language: Language) -> GatewayResult<String> {
        let prompt = build_digest_prompt(lines, language);
        self.chat(BRIEFING_SYSTEM_PROMPT, &prompt, DIGEST_TEMPERATURE, false).await
    }
}

pub fn build_analysis_prompt(request: &AnalysisRequest) -> String {
    format!(
        r#"You analyze content to decide whether it is worth sharing with a company's leadership.

## Content
- Title: {title}
- Kind: {kind}
- Related topic: {topic}
- Body:
{body}

## Task
1. summary: the core of the content in 3-4 sentences.
2. insights: 3-5 important business or technical points, as an array of strings.
3. business_relevance: 2-3 sentences on why this matters to companies building with AI and agents.
4. share_score: a number from 0 to 100 rating how worth sharing this is.
   - 80-100: must share (breakthrough insight, latest trend)
   - 60-79: recommended (useful information)
   - 40-59: optional (general information)
   - 0-39: not recommended (outdated or duplicated)
5. share_reason: 1-2 sentences explaining the score.

Respond in {language}.

## Response format (JSON)
{{"summary": "...", "insights": ["...", "...", "..."], "business_relevance": "...", "share_score": 85, "share_reason": "..."}}"#,
        title = request.title,
        kind = request.source_kind,
        topic = request.topic,
        body = request.body,
        language = request.language.display_name(),
    )
}

/// `- [kind] title (score: 85)`.
pub fn digest_line(line: &DigestLine) -> String {
    format!("- [{}] {} (score: {:.0})", line.source_kind, line.title, line.share_score)
}

pub fn build_digest_prompt(lines: &[DigestLine], language: Language) -> String {
    let listing = lines.iter().map(digest_line).collect::<Vec<_>>().join("\n");
    format!(
        r#"Write today's executive digest from the content collected today.

## Collected content
{listing}

## Requests
1. Summarize today's main trends (3-5 lines).
2. Pick the TOP 3 most noteworthy items and explain why.
3. List action items leadership should know about, if any.

Write in {language}."#,
        listing = listing,
        language = language.display_name(),
    )
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn string_field(object: &serde_json::Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Parses a model reply into an [`AnalysisResult`]. A reply without a summary
/// or a numeric score is rejected rather than defaulted.
pub fn parse_analysis(content: &str) -> GatewayResult<AnalysisResult> {
    let value: Value = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| GatewayError::InvalidAnalysis(format!("reply is not JSON: {}", e)))?;
    let object = value
        .as_object()
        .ok_or_else(|| GatewayError::InvalidAnalysis("reply is not a JSON object".to_string()))?;

    let summary = string_field(object, "summary");
    if summary.is_empty() {
        return Err(GatewayError::InvalidAnalysis("missing summary".to_string()));
    }

    let share_score = match object.get("share_score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| GatewayError::InvalidAnalysis("missing or non-numeric share_score".to_string()))?;

    let insights = match object.get("insights") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.trim().is_empty() => vec![single.trim().to_string()],
        _ => Vec::new(),
    };

    AnalysisResult {
        summary,
        insights,
        business_relevance: string_field(object, "business_relevance"),
        share_score,
        share_reason: string_field(object, "share_reason"),
    }
    .sanitized()
}
