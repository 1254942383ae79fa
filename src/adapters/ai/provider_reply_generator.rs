//! Provider Reply Generator - structured generation on top of any AIProvider.
//!
//! Sends the instructions as the system prompt and the user message as the
//! single user turn, then pulls a JSON object out of whatever the model
//! wrote. Models wrap JSON in prose or code fences often enough that the
//! extraction is lenient; a reply that still does not parse, or lacks a
//! required key, is retried up to the parse-retry budget.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::coaching::ChatRole;
use crate::ports::{
    AIProvider, CompletionRequest, GenerationError, GenerationMetadata, GenerationOutput,
    GenerationRequest, ReplyGenerator, RequestMetadata, TokenUsage,
};

/// Default number of extra attempts after an unparseable reply.
pub const DEFAULT_PARSE_RETRIES: u32 = 1;

/// ReplyGenerator backed by a chat-completion provider.
pub struct ProviderReplyGenerator {
    provider: Arc<dyn AIProvider>,
    parse_retries: u32,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ProviderReplyGenerator {
    pub fn new(provider: Arc<dyn AIProvider>) -> Self {
        Self {
            provider,
            parse_retries: DEFAULT_PARSE_RETRIES,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_parse_retries(mut self, retries: u32) -> Self {
        self.parse_retries = retries;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn completion_request(&self, request: &GenerationRequest, trace_id: &str) -> CompletionRequest {
        let mut completion =
            CompletionRequest::new(RequestMetadata::new(request.session_id, trace_id))
                .with_system_prompt(request.instructions.clone())
                .with_message(ChatRole::User, request.user_message.clone());
        if self.provider.provider_info().supports_json_mode {
            completion = completion.with_json_mode();
        }
        if let Some(temperature) = self.temperature {
            completion = completion.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            completion = completion.with_max_tokens(max_tokens);
        }
        completion
    }
}

#[async_trait]
impl ReplyGenerator for ProviderReplyGenerator {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationOutput, GenerationError> {
        let trace_id = Uuid::new_v4().to_string();
        let max_attempts = self.parse_retries + 1;
        let mut usage = TokenUsage::zero();
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            let response = self
                .provider
                .complete(self.completion_request(&request, &trace_id))
                .await?;
            usage = usage.combine(response.usage);

            let parsed = extract_json(&response.content).and_then(|value| {
                match request.expected_shape.missing_field(&value) {
                    Some(field) => Err(format!("missing field `{}`", field)),
                    None => Ok(value),
                }
            });

            match parsed {
                Ok(value) => {
                    tracing::debug!(
                        trace_id = %trace_id,
                        attempt,
                        model = %response.model,
                        tokens = usage.total_tokens,
                        "Generated structured reply"
                    );
                    return Ok(GenerationOutput {
                        value,
                        metadata: GenerationMetadata {
                            model: response.model,
                            prompt_hash: request.prompt_hash(),
                            usage,
                            provider_calls: attempt,
                            completed_at: Utc::now(),
                        },
                    });
                }
                Err(reason) => {
                    tracing::warn!(
                        trace_id = %trace_id,
                        attempt,
                        max_attempts,
                        reason = %reason,
                        "Model output did not parse"
                    );
                    last_reason = reason;
                }
            }
        }

        Err(GenerationError::malformed(max_attempts, last_reason))
    }
}

/// Pulls a JSON object out of model text.
///
/// Tries, in order: the whole text, a fenced code block, the first balanced
/// `{...}` span.
pub(crate) fn extract_json(text: &str) -> Result<serde_json::Value, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("empty reply".to_string());
    }

    let candidates = [
        Some(trimmed.to_string()),
        extract_from_code_block(trimmed),
        trimmed
            .find('{')
            .and_then(|start| extract_balanced_object(trimmed, start)),
    ];

    let mut last_error = String::from("no JSON object found");
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<serde_json::Value>(&candidate) {
            Ok(value) if value.is_object() => return Ok(value),
            Ok(_) => last_error = "reply is JSON but not an object".to_string(),
            Err(e) => last_error = format!("invalid JSON: {}", e),
        }
    }
    Err(last_error)
}

fn extract_from_code_block(s: &str) -> Option<String> {
    let patterns = ["```json\n", "```json\r\n", "```\n", "```\r\n"];

    patterns.iter().find_map(|pattern| {
        let start = s.find(pattern)? + pattern.len();
        let end = s[start..].find("```")?;
        Some(s[start..start + end].trim().to_string())
    })
}

fn extract_balanced_object(s: &str, start: usize) -> Option<String> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in s[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(s[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
