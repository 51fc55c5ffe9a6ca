use crate::image::JpegImage;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ProviderError {
    // covers network failures and the request timeout
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider response parse failed: {0}")]
    Parse(String),

    #[error("provider returned no content")]
    Empty,

    #[error("HTTP client build failed: {0}")]
    ClientBuild(String),
}

// Admission has already classified the request and picked a quota category
// by the time it builds one of these.
pub enum GenerateRequest<'a> {
    Chat {
        prompt: &'a str,
        image: Option<&'a JpegImage>,
    },
    Image {
        prompt: &'a str,
    },
}

pub enum Generated {
    Text(String),
    Image { data: Vec<u8>, mime: String },
}

// The single capability the relay depends on. Handlers and the ledger never
// learn which backend sits behind it; swapping providers means one new impl.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generated, ProviderError>;
}

// Gemini adapter: generateContent for chat, predict for image generation.
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
}

impl GeminiProvider {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        image_model: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::ClientBuild(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            image_model,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn post_json(&self, url: &str, body: &impl serde::Serialize) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        if status != 200 {
            return Err(ProviderError::Status { status, body: text });
        }
        Ok(text)
    }

    async fn chat(&self, prompt: &str, image: Option<&JpegImage>) -> Result<Generated, ProviderError> {
        let mut parts = vec![Part::text(prompt)];
        if let Some(image) = image {
            parts.push(Part::inline(JpegImage::MIME, STANDARD.encode(&image.data)));
        }
        let body = ChatApiRequest {
            contents: vec![Content { parts }],
        };
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let text = self.post_json(&url, &body).await?;
        parse_chat_response(&text)
    }

    async fn predict_image(&self, prompt: &str) -> Result<Generated, ProviderError> {
        let body = PredictApiRequest {
            instances: vec![Instance { prompt }],
            parameters: PredictParameters { sample_count: 1 },
        };
        let url = format!("{}/v1beta/models/{}:predict", self.base_url, self.image_model);
        let text = self.post_json(&url, &body).await?;
        parse_image_response(&text)
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, request: GenerateRequest<'_>) -> Result<Generated, ProviderError> {
        match request {
            GenerateRequest::Chat { prompt, image } => self.chat(prompt, image).await,
            GenerateRequest::Image { prompt } => self.predict_image(prompt).await,
        }
    }
}

// wire types

#[derive(serde::Serialize)]
struct ChatApiRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(serde::Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(serde::Serialize)]
struct Part<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData<'a>>,
}

impl<'a> Part<'a> {
    fn text(text: &'a str) -> Self {
        Self { text: Some(text), inline_data: None }
    }

    fn inline(mime_type: &'a str, data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type, data }),
        }
    }
}

#[derive(serde::Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(serde::Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(serde::Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(serde::Serialize)]
struct PredictApiRequest<'a> {
    instances: Vec<Instance<'a>>,
    parameters: PredictParameters,
}

#[derive(serde::Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    sample_count: u32,
}

#[derive(serde::Deserialize)]
struct PredictApiResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

// parsing kept pure for testability

fn parse_chat_response(json: &str) -> Result<Generated, ProviderError> {
    let api: ChatApiResponse =
        serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let reply: String = api
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");

    let reply = reply.trim().to_string();
    if reply.is_empty() {
        return Err(ProviderError::Empty);
    }
    Ok(Generated::Text(reply))
}

fn parse_image_response(json: &str) -> Result<Generated, ProviderError> {
    let api: PredictApiResponse =
        serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let Some(prediction) = api
        .predictions
        .into_iter()
        .find(|p| p.bytes_base64_encoded.is_some())
    else {
        return Err(ProviderError::Empty);
    };

    let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
    let data = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ProviderError::Parse(format!("image bytes: {e}")))?;
    Ok(Generated::Image {
        data,
        mime: prediction.mime_type.unwrap_or_else(|| "image/png".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_reply_text() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "there."}]}}]}"#;
        match parse_chat_response(json).unwrap() {
            Generated::Text(reply) => assert_eq!(reply, "Hello there."),
            Generated::Image { .. } => panic!("expected text"),
        }
    }

    #[test]
    fn empty_candidates_is_an_error() {
        assert!(matches!(parse_chat_response(r#"{"candidates": []}"#), Err(ProviderError::Empty)));
        assert!(matches!(parse_chat_response(r#"{}"#), Err(ProviderError::Empty)));
    }

    #[test]
    fn malformed_chat_json_is_a_parse_error() {
        assert!(matches!(parse_chat_response("not json"), Err(ProviderError::Parse(_))));
    }

    #[test]
    fn parses_image_prediction() {
        let json = r#"{"predictions": [{"bytesBase64Encoded": "aGVsbG8=", "mimeType": "image/png"}]}"#;
        match parse_image_response(json).unwrap() {
            Generated::Image { data, mime } => {
                assert_eq!(data, b"hello");
                assert_eq!(mime, "image/png");
            }
            Generated::Text(_) => panic!("expected image"),
        }
    }

    #[test]
    fn missing_predictions_is_an_error() {
        assert!(matches!(parse_image_response(r#"{"predictions": []}"#), Err(ProviderError::Empty)));
        assert!(matches!(
            parse_image_response(r#"{"predictions": [{"bytesBase64Encoded": "%%%"}]}"#),
            Err(ProviderError::Parse(_))
        ));
    }
}
