use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use ember_core::http::{router, AppState};
use ember_core::{mappings, AppConfig, HandlerRegistry, LlmClient};

#[derive(Parser, Debug)]
#[command(name = "ember-core")]
#[command(about = "Intent-processing core for the Ember voice assistant")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // .env is optional; used for API keys in development.
    dotenvy::dotenv().ok();

    log::info!("Loading config from {}", args.config.display());
    let config = AppConfig::from_file(&args.config);
    if config.debug {
        log::info!("Debug mode enabled");
    }

    log::info!("Loading intent data from {}", config.intents_dir.display());
    let engine = echo::Echo::from_dir(&config.intents_dir)
        .with_context(|| format!("loading intent data from {}", config.intents_dir.display()))?
        .with_selectors(mappings::standard());

    let skills = HandlerRegistry::with_default_skills(&config);
    log::info!("Registered {} skill handlers", skills.len());

    let llm = LlmClient::from_config(&config.llm);
    if config.llm.enabled {
        log::info!(
            "LLM fallback enabled (provider: {}, threshold: {})",
            llm.provider().name(),
            config.llm.fallback_threshold
        );
    } else {
        log::info!("LLM fallback disabled");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState {
        engine: Arc::new(engine),
        skills: Arc::new(skills),
        llm: Arc::new(llm),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Core listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}
