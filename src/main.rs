mod config;
mod error;
mod handlers;
mod identity;
mod image;
mod ledger;
mod metrics;
mod models;
mod provider;
mod rate_limit;
mod state;

use axum::{
    Router,
    routing::{get, post},
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::ledger::{UsageLedger, UsageLimits};
use crate::provider::GeminiProvider;
use crate::rate_limit::RateLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let args = config::Args::parse();

    let provider = match GeminiProvider::new(
        &args.provider_url,
        args.api_key.clone(),
        args.model.clone(),
        args.image_model.clone(),
        Duration::from_secs(args.request_timeout),
    ) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "failed to build provider client");
            std::process::exit(1);
        }
    };

    let ledger = UsageLedger::new(
        args.ledger_path.clone().into(),
        UsageLimits {
            max_questions: args.max_questions,
            max_image_generations: args.max_image_generations,
            reset_period: args.reset_period,
        },
    );
    let rate_limiter = RateLimiter::new(args.rate_limit, Duration::from_secs(args.rate_window));

    // shared state for all handlers
    let state = Arc::new(AppState {
        provider: Arc::new(provider),
        ledger,
        rate_limiter,
        model: args.model.clone(),
    });

    let app = Router::new()
        .route("/", get(handlers::info_handler).post(handlers::chat_handler))
        .route("/usage", get(handlers::usage_handler))
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    tracing::info!(port = args.port, model = %args.model, "chat-relay listening");
    tracing::info!(
        max_questions = args.max_questions,
        max_image_generations = args.max_image_generations,
        reset_period = %args.reset_period.as_str(),
        rate_limit = args.rate_limit,
        rate_window = args.rate_window,
        ledger = %args.ledger_path,
        "limits configured"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server failed");
}
