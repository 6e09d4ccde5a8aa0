//! Main Entrypoint for the Taylor API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Loading the prompt assets (the persona instruction is required).
//! 3. Initializing the upstream clients, intent classifier, and rate limiter.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use std::{collections::HashMap, fs, net::SocketAddr, path::Path, sync::Arc};
use taylor_api::{
    config::{Config, IntentStrategy},
    router::create_router,
    state::AppState,
};
use taylor_core::{
    image_client::OpenAIImageClient,
    intent::{
        DEFAULT_INTENT_INSTRUCTION, IntentClassifier, KeywordIntentClassifier, KeywordSet,
        LLMIntentClassifier,
    },
    llm_client::{LLMClient, OpenAICompatibleClient, UpstreamEndpoint},
    orchestrator::ChatOrchestrator,
    persona::{PersonaReplyGenerator, ReplySettings},
    rate_limit::FixedWindowRateLimiter,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content.trim().to_string());
        }
    }
    Ok(prompts)
}

fn load_keywords(path: Option<&Path>) -> anyhow::Result<KeywordSet> {
    let Some(path) = path else {
        return Ok(KeywordSet::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Could not read intent keywords {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid intent keywords file {}", path.display()))
}

/// Wires the upstream clients and the orchestrator. Returns `None` when the
/// upstream credential is missing.
fn build_orchestrator(
    config: &Config,
    mut prompts: HashMap<String, String>,
) -> anyhow::Result<Option<ChatOrchestrator>> {
    let persona_instruction = Arc::new(
        prompts
            .remove("persona")
            .context("persona.md not found in prompts directory")?,
    );

    let api_key = match config.require_api_key() {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "Chat requests will fail until the credential is configured");
            return Ok(None);
        }
    };

    let http = reqwest::Client::builder()
        .timeout(config.upstream_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let endpoint = UpstreamEndpoint::new(http, config.api_base.clone(), api_key);
    let llm: Arc<dyn LLMClient> = Arc::new(OpenAICompatibleClient::new(
        endpoint.clone(),
        config.chat_model.clone(),
    ));

    let classifier: Arc<dyn IntentClassifier> = match config.intent_strategy {
        IntentStrategy::Model => {
            let instruction = prompts
                .remove("intent_classifier")
                .unwrap_or_else(|| DEFAULT_INTENT_INSTRUCTION.to_string());
            Arc::new(LLMIntentClassifier::new(llm.clone(), instruction))
        }
        IntentStrategy::Keyword => {
            let keywords = load_keywords(config.intent_keywords_path.as_deref())?;
            Arc::new(
                KeywordIntentClassifier::new(keywords)
                    .context("Intent keywords do not form a valid pattern")?,
            )
        }
    };

    let persona = PersonaReplyGenerator::new(
        llm,
        persona_instruction,
        ReplySettings {
            temperature: config.reply_temperature,
            max_tokens: config.reply_max_tokens,
        },
    );
    let images = Arc::new(OpenAIImageClient::new(
        endpoint,
        config.image_model.clone(),
        config.image_size.clone(),
    ));
    let limiter = Arc::new(FixedWindowRateLimiter::new(
        config.rate_limit_window,
        config.rate_limit_max,
    ));

    Ok(Some(ChatOrchestrator::new(
        classifier, persona, images, limiter,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    let orchestrator = build_orchestrator(&config, prompts)?.map(Arc::new);

    let app_state = Arc::new(AppState {
        orchestrator,
        config: Arc::new(config.clone()),
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 5. Start Server ---
    info!(
        model = %config.chat_model,
        image_model = %config.image_model,
        intent_strategy = ?config.intent_strategy,
        access_code_required = config.study_code.is_some(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
