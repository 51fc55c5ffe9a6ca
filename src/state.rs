use crate::ledger::UsageLedger;
use crate::provider::Provider;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;

// app's shared state, built once in main and handed to every handler
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub ledger: UsageLedger,
    pub rate_limiter: RateLimiter,
    pub model: String, // for the info/health endpoints
}
