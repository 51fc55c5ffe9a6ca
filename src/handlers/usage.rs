use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::identity;
use crate::models::{CategoryUsage, UsageResponse};
use crate::state::AppState;

// Read-only usage view for the caller's identity. Runs the same
// reset-window check as the quota path, so a rolled-over window zeroes the
// counters here too.
pub async fn usage_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<UsageResponse> {
    let identity = identity::from_request(&headers, Some(peer));
    let (questions, image_generations) = state.ledger.usage_for(&identity);
    let limits = state.ledger.limits();

    Json(UsageResponse {
        questions: CategoryUsage::new(questions, limits.max_questions),
        image_generations: CategoryUsage::new(image_generations, limits.max_image_generations),
        reset_period: limits.reset_period.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Category, ResetPeriod, UsageLedger, UsageLimits};
    use crate::provider::{GenerateRequest, Generated, Provider, ProviderError};
    use crate::rate_limit::RateLimiter;
    use axum::http::HeaderValue;
    use std::time::Duration;
    use tempfile::TempDir;

    struct NoProvider;

    #[async_trait::async_trait]
    impl Provider for NoProvider {
        async fn generate(&self, _: GenerateRequest<'_>) -> Result<Generated, ProviderError> {
            Err(ProviderError::Empty)
        }
    }

    fn headers() -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.20"));
        h.insert("user-agent", HeaderValue::from_static("test-agent"));
        h
    }

    #[tokio::test]
    async fn reports_current_and_remaining_per_category() {
        let dir = TempDir::new().unwrap();
        let state = Arc::new(AppState {
            provider: Arc::new(NoProvider),
            ledger: UsageLedger::new(
                dir.path().join("usage.json"),
                UsageLimits {
                    max_questions: 50,
                    max_image_generations: 10,
                    reset_period: ResetPeriod::Daily,
                },
            ),
            rate_limiter: RateLimiter::new(10, Duration::from_secs(60)),
            model: "mock".into(),
        });

        let identity = identity::from_request(&headers(), None);
        state.ledger.commit(&identity, Category::Questions);
        state.ledger.commit(&identity, Category::Questions);
        state.ledger.commit(&identity, Category::ImageGenerations);

        let peer = ConnectInfo("127.0.0.1:9999".parse().unwrap());
        let Json(usage) = usage_handler(State(state.clone()), peer, headers()).await;
        assert_eq!(usage.questions.current, 2);
        assert_eq!(usage.questions.remaining, 48);
        assert_eq!(usage.image_generations.current, 1);
        assert_eq!(usage.image_generations.max, 10);
        assert_eq!(usage.reset_period, "daily");

        // reading twice changes nothing
        let peer = ConnectInfo("127.0.0.1:9999".parse().unwrap());
        let Json(again) = usage_handler(State(state), peer, headers()).await;
        assert_eq!(again.questions.current, 2);
    }
}
