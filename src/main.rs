// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use interviewiq::config::CONFIG;
use interviewiq::engine::InterviewEngine;
use interviewiq::evaluator::grammar::{
    DisabledGrammarChecker, GrammarChecker, LanguageToolChecker,
};
use interviewiq::llm::{ProviderGateway, ProviderRegistry};
use interviewiq::server::{self, AppState};
use interviewiq::store::{self, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = CONFIG
        .log_level
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting InterviewIQ");

    let registry = ProviderRegistry::from_config(&CONFIG);
    if registry.is_empty() {
        info!("No AI providers configured - running with deterministic fallbacks only");
    } else {
        info!("Configured providers: {:?}", registry.configured_names());
    }

    let gateway = Arc::new(ProviderGateway::new(
        registry,
        Duration::from_secs(CONFIG.race_timeout_secs),
        Duration::from_secs(CONFIG.provider_timeout_secs),
    ));

    let grammar: Arc<dyn GrammarChecker> = if CONFIG.grammar_enabled {
        Arc::new(LanguageToolChecker::new(
            CONFIG.languagetool_url.clone(),
            Duration::from_secs(10),
        ))
    } else {
        Arc::new(DisabledGrammarChecker)
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(CONFIG.sqlite_max_connections)
        .connect(&CONFIG.database_url)
        .await?;
    store::run_migrations(&pool).await?;

    let engine = InterviewEngine::new(gateway, grammar, Arc::new(SqliteStore::new(pool)));

    let app = server::router(
        Arc::new(AppState { engine }),
        Duration::from_secs(CONFIG.request_timeout_secs),
    );

    let bind_address = CONFIG.bind_address();
    info!("Listening on {bind_address}");
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
