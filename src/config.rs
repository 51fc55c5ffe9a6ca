use crate::ledger::ResetPeriod;
use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-relay")]
#[command(about = "Quota-enforcing relay in front of a generative AI provider")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Provider base URL
    #[arg(long, default_value = "https://generativelanguage.googleapis.com")]
    pub provider_url: String,

    // Provider API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    // Chat model
    #[arg(short, long, default_value = "gemini-2.5-flash")]
    pub model: String,

    // Image generation model
    #[arg(long, default_value = "imagen-3.0-generate-002")]
    pub image_model: String,

    // Max questions per identity per reset period
    #[arg(long, default_value_t = 50)]
    pub max_questions: u64,

    // Max image generations per identity per reset period
    #[arg(long, default_value_t = 10)]
    pub max_image_generations: u64,

    // When usage counters reset
    #[arg(long, value_enum, default_value = "daily")]
    pub reset_period: ResetPeriod,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 60)]
    pub rate_window: u64,

    // Provider request timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub request_timeout: u64,

    // Usage ledger file
    #[arg(long, default_value = "usage.json")]
    pub ledger_path: String,
}

// Prepended to every chat prompt. Image-only requests send this alone
// alongside the image part.
pub const SYSTEM_PROMPT: &str = "\
You are a sharp, helpful assistant.

Style:
- Lead with the answer, keep responses concise but complete.
- Use examples when they clarify, skip pleasantries.
- For images, describe content and context and point out anything notable.

If the user greets you, reply briefly and ask what they need. If the user \
asks you to create or generate an image, describe what you would generate \
and ask them to confirm the details.";
