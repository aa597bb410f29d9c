//! Provider gateway and response normalization.
//!
//! One adapter per completion backend behind the uniform
//! [`CompletionClient`] contract: `prompt, system role -> completion
//! text`. Adapters never let a transport or auth failure escape as an
//! error; every failure is encoded as a JSON-shaped error payload
//! (`response_type = 3`) so the rest of the pipeline treats all outcomes
//! uniformly as text to be normalized.

use anyhow::Result;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tandem_core::{AppConfig, ProviderCredentials, ProviderKind, StandardResponse};

/// Adapters bound their own call duration; the orchestrator enforces no
/// timeout of its own.
const REQUEST_TIMEOUT_SECS: u64 = 60;

const GROQ_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_ENDPOINT_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Uniform call contract over the completion backends.
///
/// Implementations must never panic or return an error: all failures come
/// back as a `{"response_type": 3, "message": ...}` payload string.
pub trait CompletionClient {
    fn complete(&self, prompt: &str, system_role: &str) -> String;

    /// Which backend this adapter talks to.
    fn provider(&self) -> ProviderKind;
}

/// Resolve the adapter for the currently configured provider.
pub fn client_for(cfg: &AppConfig) -> Result<Box<dyn CompletionClient>> {
    let kind = cfg.provider();
    let creds = cfg.credentials(kind);
    Ok(match kind {
        ProviderKind::Groq => Box::new(GroqClient::new(&creds)?),
        ProviderKind::OpenAi => Box::new(OpenAiClient::new(&creds)?),
        ProviderKind::Gemini => Box::new(GeminiClient::new(&creds)?),
    })
}

fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()?)
}

/// JSON-shaped error payload returned in place of a completion when the
/// provider call fails. Flows through the normalizer like any other text.
fn error_payload(detail: impl std::fmt::Display) -> String {
    json!({
        "response_type": 3,
        "message": detail.to_string(),
    })
    .to_string()
}

/// Extract `choices[0].message.content` from an OpenAI-compatible chat
/// completion body, or empty string if absent.
fn first_choice_content(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.get("choices"))
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn short_detail(body: &str) -> String {
    body.chars().take(200).collect()
}

/// Shared request path for the OpenAI-compatible chat completion APIs.
fn chat_completion(
    client: &Client,
    endpoint: &str,
    api_key: &str,
    model: &str,
    provider_label: &str,
    prompt: &str,
    system_role: &str,
) -> String {
    let payload = json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_role },
            { "role": "user", "content": prompt }
        ],
        "temperature": 0.5,
        "max_tokens": 1024,
        "stream": false
    });

    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(&payload)
        .send();

    match response {
        Ok(resp) => {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            if !status.is_success() {
                return error_payload(format!(
                    "Error fetching completion from {provider_label} (HTTP {}): {}",
                    status.as_u16(),
                    short_detail(&body)
                ));
            }
            first_choice_content(&body)
        }
        Err(err) => error_payload(format!(
            "Error fetching completion from {provider_label}: {err}"
        )),
    }
}

#[derive(Debug, Clone)]
pub struct GroqClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(creds: &ProviderCredentials) -> Result<Self> {
        Self::with_endpoint(creds, GROQ_ENDPOINT)
    }

    pub fn with_endpoint(creds: &ProviderCredentials, endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.to_string(),
            api_key: creds.key.clone(),
            model: creds.model.clone(),
        })
    }
}

impl CompletionClient for GroqClient {
    fn complete(&self, prompt: &str, system_role: &str) -> String {
        chat_completion(
            &self.client,
            &self.endpoint,
            &self.api_key,
            &self.model,
            "Groq",
            prompt,
            system_role,
        )
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Groq
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(creds: &ProviderCredentials) -> Result<Self> {
        Self::with_endpoint(creds, OPENAI_ENDPOINT)
    }

    pub fn with_endpoint(creds: &ProviderCredentials, endpoint: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.to_string(),
            api_key: creds.key.clone(),
            model: creds.model.clone(),
        })
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, prompt: &str, system_role: &str) -> String {
        chat_completion(
            &self.client,
            &self.endpoint,
            &self.api_key,
            &self.model,
            "OpenAI",
            prompt,
            system_role,
        )
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}

/// Gemini has no separate system turn on this endpoint; the role is folded
/// into a single text prompt, and json code fences around the reply are
/// stripped before normalization.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    endpoint_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(creds: &ProviderCredentials) -> Result<Self> {
        Self::with_endpoint(creds, GEMINI_ENDPOINT_BASE)
    }

    pub fn with_endpoint(creds: &ProviderCredentials, endpoint_base: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            endpoint_base: endpoint_base.to_string(),
            api_key: creds.key.clone(),
            model: creds.model.clone(),
        })
    }
}

impl CompletionClient for GeminiClient {
    fn complete(&self, prompt: &str, system_role: &str) -> String {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.endpoint_base, self.model, self.api_key
        );
        let full_prompt = format!("System Role {system_role}\n\nUser: {prompt}\n");
        let payload = json!({
            "contents": [ { "parts": [ { "text": full_prompt } ] } ]
        });

        let response = self.client.post(&url).json(&payload).send();
        match response {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().unwrap_or_default();
                if !status.is_success() {
                    return error_payload(format!(
                        "Error fetching completion from Google AI (HTTP {}): {}",
                        status.as_u16(),
                        short_detail(&body)
                    ));
                }
                let text = serde_json::from_str::<Value>(&body)
                    .ok()
                    .as_ref()
                    .and_then(|v| v.get("candidates"))
                    .and_then(Value::as_array)
                    .and_then(|arr| arr.first())
                    .and_then(|c| c.get("content"))
                    .and_then(|c| c.get("parts"))
                    .and_then(Value::as_array)
                    .and_then(|arr| arr.first())
                    .and_then(|p| p.get("text"))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                text.replace("```json\n", "").replace("\n```", "")
            }
            Err(err) => error_payload(format!("Error fetching completion from Google AI: {err}")),
        }
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }
}

// ---------------------------------------------------------------------------
// Response normalization
// ---------------------------------------------------------------------------

/// Parse a provider's raw text into the canonical [`StandardResponse`].
///
/// Total: never fails, for any input. On parse failure the raw text is
/// preserved in `code` so nothing is silently dropped, and `message`
/// carries the diagnostic string.
pub fn normalize(raw: &str) -> StandardResponse {
    let Ok(value) = serde_json::from_str::<Value>(raw) else {
        return parse_failure(raw);
    };
    if !value.is_object() {
        return parse_failure(raw);
    }
    StandardResponse {
        code: value
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        message: value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        line_range: value
            .get("lineRange")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default(),
    }
}

fn parse_failure(raw: &str) -> StandardResponse {
    StandardResponse {
        code: raw.to_string(),
        message: "Error parsing response".to_string(),
        line_range: Default::default(),
    }
}

/// The structured `{type, data}` envelope some responses arrive in.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: i64,
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvelopeData {
    pub code: String,
    pub message: String,
    pub range: String,
}

/// The closed set of response kinds downstream sinks branch on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopilotResponse {
    CodeCompletion { code: String, message: String },
    ErrorDetection { code: String, message: String, range: String },
    ProcessingError { message: String },
    FetchingError { message: String },
}

/// Map a typed envelope into the canonical response kinds, trimming string
/// fields. Unknown `type` values land in a generic fetching error.
pub fn extract_copilot_response(envelope: &ResponseEnvelope) -> CopilotResponse {
    let data = &envelope.data;
    match envelope.kind {
        0 => CopilotResponse::CodeCompletion {
            code: data.code.trim().to_string(),
            message: data.message.trim().to_string(),
        },
        1 => CopilotResponse::ErrorDetection {
            code: data.code.trim().to_string(),
            message: data.message.trim().to_string(),
            range: data.range.trim().to_string(),
        },
        2 => CopilotResponse::ProcessingError {
            message: data.message.trim().to_string(),
        },
        3 => CopilotResponse::FetchingError {
            message: data.message.trim().to_string(),
        },
        _ => CopilotResponse::FetchingError {
            message: "Unknown response type.".to_string(),
        },
    }
}
