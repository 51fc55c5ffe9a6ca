use serde::{Deserialize, Serialize};

// Inbound chat request. At least one of the two fields must be non-empty.
#[derive(Deserialize, Clone)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    // base64 data URL of an image to analyze
    #[serde(default)]
    pub image: Option<String>,
}

// Success payload for POST /. Text replies carry remaining_questions,
// generated images carry the data URL + remaining_generations.
#[derive(Serialize, Clone, Debug)]
pub struct ChatReply {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_questions: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_generations: Option<u64>,
    pub response_time: f64,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Serialize)]
pub struct CategoryUsage {
    pub current: u64,
    pub max: u64,
    pub remaining: u64,
}

impl CategoryUsage {
    pub fn new(current: u64, max: u64) -> Self {
        Self {
            current,
            max,
            remaining: max.saturating_sub(current),
        }
    }
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub questions: CategoryUsage,
    pub image_generations: CategoryUsage,
    pub reset_period: &'static str,
}

const GENERATION_KEYWORDS: &[&str] = &[
    "create image",
    "generate image",
    "make image",
    "draw",
    "create picture",
    "generate picture",
    "make picture",
    "show me",
    "create a",
    "generate a",
    "make a",
    "design",
    "illustrate",
    "visualize",
    "paint",
    "sketch",
];

// Keyword classifier deciding whether a message asks for image generation.
// Deliberately broad; misfires cost an image-generation slot, not an error.
pub fn is_image_generation_request(message: &str) -> bool {
    if message.is_empty() {
        return false;
    }
    let lowered = message.to_lowercase();
    GENERATION_KEYWORDS.iter().any(|k| lowered.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_generation_phrasing() {
        assert!(is_image_generation_request("Please generate image of a cat"));
        assert!(is_image_generation_request("DRAW me like one of your French girls"));
        assert!(is_image_generation_request("can you sketch a floor plan"));
    }

    #[test]
    fn plain_questions_pass_through() {
        assert!(!is_image_generation_request("what is the capital of France?"));
        assert!(!is_image_generation_request(""));
    }

    #[test]
    fn reply_serializes_without_empty_fields() {
        let reply = ChatReply {
            reply: "hi".into(),
            image: None,
            remaining_questions: Some(3),
            remaining_generations: None,
            response_time: 0.42,
            kind: "text",
        };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["remaining_questions"], 3);
        assert!(json.get("image").is_none());
        assert!(json.get("remaining_generations").is_none());
    }
}
