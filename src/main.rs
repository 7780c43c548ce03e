use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use versecraft::cli::{self, Cli};
use versecraft::config::Config;
use versecraft::orchestrator::Orchestrator;
use versecraft::prompt::PromptStore;
use versecraft::providers::OpenAiProvider;
use versecraft::storage::create_storage;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let cli = Cli::parse();
    let config = Config::load()?;

    let api_key = config
        .api_key
        .as_deref()
        .context("config validated without an api key")?;
    let provider = Arc::new(OpenAiProvider::new(api_key));
    let prompts = PromptStore::load()?;
    let storage = create_storage(&config).await?;

    let orchestrator = Orchestrator::new(
        provider,
        prompts,
        storage,
        config.model.clone(),
        config.user_id.clone(),
    );
    cli::dispatch(cli, &orchestrator).await
}
