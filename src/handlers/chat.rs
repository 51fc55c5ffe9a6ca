use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::SYSTEM_PROMPT;
use crate::error::ApiError;
use crate::identity;
use crate::image;
use crate::ledger::Category;
use crate::metrics::{
    PROVIDER_ERRORS_TOTAL, PROVIDER_LATENCY, QUOTA_REJECTED_TOTAL, RATE_LIMITED_TOTAL,
    REQUEST_TOTAL, TRACKED_IDENTITIES,
};
use crate::models::{ChatReply, ChatRequest, is_image_generation_request};
use crate::provider::{GenerateRequest, Generated, ProviderError};
use crate::state::AppState;

// Admission sequence: identity -> rate check -> validate -> classify ->
// quota check -> provider call -> commit -> respond. Cheap in-memory check
// first, durable check second, the remote call last; the ledger is charged
// only once the call has succeeded.
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    REQUEST_TOTAL.inc();

    let identity = identity::from_request(&headers, Some(peer));

    let (allowed, _) = state.rate_limiter.allow(&identity);
    TRACKED_IDENTITIES.set(state.rate_limiter.tracked_identities() as f64);
    if !allowed {
        RATE_LIMITED_TOTAL.inc();
        tracing::warn!(identity = %&identity[..8], "rate limit exceeded");
        return Err(ApiError::RateLimited {
            limit: state.rate_limiter.limit(),
        });
    }

    let message = payload.message.unwrap_or_default().trim().to_string();
    let image_data = payload.image.filter(|raw| !raw.trim().is_empty());
    if message.is_empty() && image_data.is_none() {
        return Err(ApiError::InvalidRequest("No message or image provided"));
    }

    // image generation draws from its own quota category
    if image_data.is_none() && is_image_generation_request(&message) {
        return generate_image(&state, &identity, &message).await;
    }
    answer_question(&state, &identity, &message, image_data).await
}

async fn answer_question(
    state: &AppState,
    identity: &str,
    message: &str,
    image_data: Option<String>,
) -> Result<Json<ChatReply>, ApiError> {
    let limits = state.ledger.limits();
    let (admitted, current) = state.ledger.check_and_get(identity, Category::Questions);
    if !admitted {
        QUOTA_REJECTED_TOTAL.inc();
        return Err(ApiError::QuotaExceeded {
            category: Category::Questions.as_str(),
            current,
            limit: limits.max_questions,
            period: limits.reset_period.as_str(),
        });
    }

    let attachment = image_data
        .map(|raw| image::process_data_url(&raw))
        .transpose()?;

    let prompt = if message.is_empty() {
        SYSTEM_PROMPT.to_string()
    } else {
        format!("{SYSTEM_PROMPT}\n\nUser: {message}")
    };

    // no locks held across the remote call
    let start = Instant::now();
    let result = state
        .provider
        .generate(GenerateRequest::Chat {
            prompt: &prompt,
            image: attachment.as_ref(),
        })
        .await;
    let elapsed = start.elapsed().as_secs_f64();
    PROVIDER_LATENCY.observe(elapsed);

    let reply = match result {
        Ok(Generated::Text(text)) => text,
        Ok(Generated::Image { .. }) => {
            PROVIDER_ERRORS_TOTAL.inc();
            return Err(ProviderError::Parse("unexpected image payload in chat response".into()).into());
        }
        Err(e) => {
            // failed generations never consume quota
            PROVIDER_ERRORS_TOTAL.inc();
            return Err(e.into());
        }
    };

    state.ledger.commit(identity, Category::Questions);
    tracing::info!(identity = %&identity[..8], elapsed = %format!("{elapsed:.2}s"), "reply generated");

    Ok(Json(ChatReply {
        reply,
        image: None,
        remaining_questions: Some(limits.max_questions.saturating_sub(current + 1)),
        remaining_generations: None,
        response_time: round2(elapsed),
        kind: "text",
    }))
}

async fn generate_image(
    state: &AppState,
    identity: &str,
    prompt: &str,
) -> Result<Json<ChatReply>, ApiError> {
    let limits = state.ledger.limits();
    let (admitted, current) = state.ledger.check_and_get(identity, Category::ImageGenerations);
    if !admitted {
        QUOTA_REJECTED_TOTAL.inc();
        return Err(ApiError::QuotaExceeded {
            category: Category::ImageGenerations.as_str(),
            current,
            limit: limits.max_image_generations,
            period: limits.reset_period.as_str(),
        });
    }

    let start = Instant::now();
    let result = state
        .provider
        .generate(GenerateRequest::Image { prompt })
        .await;
    let elapsed = start.elapsed().as_secs_f64();
    PROVIDER_LATENCY.observe(elapsed);

    let (data, mime) = match result {
        Ok(Generated::Image { data, mime }) => (data, mime),
        Ok(Generated::Text(_)) => {
            PROVIDER_ERRORS_TOTAL.inc();
            return Err(ProviderError::Parse("unexpected text payload in image response".into()).into());
        }
        Err(e) => {
            PROVIDER_ERRORS_TOTAL.inc();
            return Err(e.into());
        }
    };

    state.ledger.commit(identity, Category::ImageGenerations);
    tracing::info!(identity = %&identity[..8], elapsed = %format!("{elapsed:.2}s"), "image generated");

    Ok(Json(ChatReply {
        reply: "Here's your generated image!".to_string(),
        image: Some(format!("data:{mime};base64,{}", STANDARD.encode(&data))),
        remaining_questions: None,
        remaining_generations: Some(limits.max_image_generations.saturating_sub(current + 1)),
        response_time: round2(elapsed),
        kind: "image",
    }))
}

fn round2(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
