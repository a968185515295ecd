use std::sync::Arc;

use anyhow::Result;
use browser_agent::brain::OpenRouterClient;
use browser_agent::config::Config;
use browser_agent::{Agent, face};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "browser_agent=info,agent=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    info!(
        model = %config.model,
        headless = config.headless,
        width = config.width,
        height = config.height,
        max_iterations = config.max_iterations,
        "starting browser agent"
    );

    let mut oracle = OpenRouterClient::new(
        config.api_key.clone(),
        config.model.clone(),
        config.oracle_timeout(),
    )?;
    if let Some(url) = &config.oracle_url {
        oracle = oracle.with_endpoint(url.clone());
    }

    let agent = Agent::new(
        Arc::new(oracle),
        Arc::new(config.launcher()),
        config.loop_config(),
    );

    let router = face::router(agent, &config.cors_origin)?;
    face::serve(router, &config.addr()).await
}
