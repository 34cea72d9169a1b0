//! Claude Messages API client used for plan synthesis.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::{is_retryable_status, CallError, RetryPolicy};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::PlannerConfig;
use crate::domain::ports::{PlanOutline, Planner};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const PLAN_SYSTEM_PROMPT: &str = "\
You are a technical project planner for a fleet of parallel AI coding \
agents. Given a project overview and an initial prompt, produce a build \
plan and a list of independent tasks that agents can execute on separate \
git branches. Prefer tasks with disjoint file ownership. Respond with a \
single JSON object, no prose, shaped as: \
{\"plan\": \"...\", \"suggested_tasks\": [{\"title\": \"...\", \
\"description\": \"...\", \"dependencies\": [], \"priority\": 5}]}. \
Priority runs 1 (highest) to 10 (lowest).";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
    limiter: TokenBucketRateLimiter,
}

impl AnthropicClient {
    pub fn new(config: &PlannerConfig) -> DomainResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .ok_or_else(|| {
                DomainError::ValidationFailed(
                    "no Anthropic API key configured (set planner.api_key or ANTHROPIC_API_KEY)"
                        .to_string(),
                )
            })?;

        Ok(Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                ..RetryPolicy::default()
            },
            limiter: TokenBucketRateLimiter::new(config.requests_per_second),
        })
    }

    /// Point the client at a different server (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn call_messages(&self, user_prompt: &str) -> Result<String, CallError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": PLAN_SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": user_prompt}],
        });

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Retryable(format!("request failed: {}", e)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| CallError::Retryable(format!("body read failed: {}", e)))?;

        if status != 200 {
            let message = format!("Claude API returned {}: {}", status, truncate(&text, 300));
            return if is_retryable_status(status) {
                Err(CallError::Retryable(message))
            } else {
                Err(CallError::Permanent(message))
            };
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| CallError::Permanent(format!("malformed response: {}", e)))?;
        let content = parsed
            .content
            .first()
            .map(|block| block.text.clone())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(CallError::Permanent("empty response content".to_string()));
        }
        Ok(content)
    }
}

#[async_trait]
impl Planner for AnthropicClient {
    async fn synthesize_plan(
        &self,
        project_overview: &str,
        initial_prompt: &str,
    ) -> DomainResult<PlanOutline> {
        self.limiter.acquire().await;

        let user_prompt = format!(
            "Project overview:\n{}\n\nInitial prompt:\n{}",
            project_overview, initial_prompt
        );

        let content = self
            .retry
            .execute(|| self.call_messages(&user_prompt))
            .await?;

        debug!(bytes = content.len(), "plan synthesis response received");
        parse_plan_output(&content)
    }
}

/// Parse a plan outline from model output, tolerating fenced code blocks
/// and leading prose around the JSON object.
pub fn parse_plan_output(raw: &str) -> DomainResult<PlanOutline> {
    let candidate = extract_json_object(raw).ok_or_else(|| {
        DomainError::PlanFailed("no JSON object found in model output".to_string())
    })?;
    let outline: PlanOutline = serde_json::from_str(candidate)
        .map_err(|e| DomainError::PlanFailed(format!("plan JSON did not parse: {}", e)))?;
    if outline.suggested_tasks.is_empty() {
        return Err(DomainError::PlanFailed(
            "plan contained no suggested tasks".to_string(),
        ));
    }
    Ok(outline)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
