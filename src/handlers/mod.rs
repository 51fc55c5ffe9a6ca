mod chat;
mod health;
mod info;
mod metrics;
mod usage;

pub use chat::chat_handler;
pub use health::health_handler;
pub use info::info_handler;
pub use metrics::metrics_handler;
pub use usage::usage_handler;
