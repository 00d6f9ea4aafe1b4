use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;

use crate::core::config::LlmConfig;
use crate::core::error::RemoteError;

#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Asks for a JSON document shaped by `schema` and returns its raw text.
    async fn generate_json(&self, api_key: &str, prompt: &str, schema: &Value) -> Result<String, RemoteError>;
}

pub fn create_llm(config: &LlmConfig) -> Box<dyn LlmClient> {
    Box::new(GeminiClient::new(&config.base_url, &config.model))
}

// --- Gemini wire types, shared with the speech client ---

#[derive(Serialize)]
pub(crate) struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    pub generation_config: Value,
}

#[derive(Serialize)]
pub(crate) struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
pub(crate) struct GeminiPart {
    pub text: String,
}

impl GeminiRequest {
    pub fn new(text: String, generation_config: Value) -> Self {
        Self {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text }],
            }],
            generation_config,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct GeminiResponse {
    pub candidates: Option<Vec<GeminiCandidate>>,
    pub error: Option<GeminiError>,
}

#[derive(Deserialize)]
pub(crate) struct GeminiCandidate {
    pub content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct GeminiContentResponse {
    #[serde(default)]
    pub parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
pub(crate) struct GeminiPartResponse {
    pub text: Option<String>,
    #[serde(rename = "inlineData")]
    pub inline_data: Option<GeminiInlineData>,
}

#[derive(Deserialize)]
pub(crate) struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub data: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct GeminiError {
    pub message: String,
    pub status: Option<String>,
}

impl GeminiResponse {
    pub fn first_part(&self) -> Option<&GeminiPartResponse> {
        self.candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .first()
    }

    pub fn finish_reason(&self) -> &str {
        self.candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.finish_reason.as_deref())
            .unwrap_or("UNKNOWN")
    }
}

const API_KEY_HEADER: &str = "x-goog-api-key";

/// POSTs a `generateContent` request and maps failures onto [`RemoteError`].
/// The key travels in a header so it never shows up in a URL or error text.
pub(crate) async fn generate_content(
    client: &reqwest::Client,
    base_url: &str,
    model: &str,
    api_key: &str,
    request: &GeminiRequest,
) -> Result<GeminiResponse, RemoteError> {
    let endpoint = format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model);
    debug!("POST {}", endpoint);

    let resp = client
        .post(&endpoint)
        .header(API_KEY_HEADER, api_key)
        .json(request)
        .send()
        .await?;

    let status = resp.status().as_u16();
    let body = resp.text().await?;
    if !(200..300).contains(&status) {
        return Err(RemoteError::classify(status, &body));
    }

    let result: GeminiResponse = serde_json::from_str(&body)
        .map_err(|e| RemoteError::MalformedResponse(format!("{}. Body: {}", e, body)))?;

    if let Some(err) = &result.error {
        let code = err.status.as_deref().unwrap_or_default();
        return Err(RemoteError::classify(status, &format!("{} {}", code, err.message)));
    }
    Ok(result)
}

// --- Gemini ---
#[derive(Debug)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

fn json_generation_config(schema: &Value) -> Value {
    json!({
        "responseMimeType": "application/json",
        "responseSchema": schema,
    })
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn generate_json(&self, api_key: &str, prompt: &str, schema: &Value) -> Result<String, RemoteError> {
        let request = GeminiRequest::new(prompt.to_string(), json_generation_config(schema));
        let result = generate_content(&self.client, &self.base_url, &self.model, api_key, &request).await?;

        match result.first_part().and_then(|p| p.text.clone()) {
            Some(text) => Ok(text),
            None => Err(RemoteError::MalformedResponse(format!(
                "Gemini response empty. Finish reason: {}",
                result.finish_reason()
            ))),
        }
    }
}
