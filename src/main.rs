use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use scam_honeypot::api::routes;
use scam_honeypot::config::{EngineConfig, ServerConfig};
use scam_honeypot::detection::PatternMatcher;
use scam_honeypot::llm::{AnthropicProvider, LlmProvider};
use scam_honeypot::oracle::{LlmClassifier, LlmEngager};
use scam_honeypot::pipeline::{HttpReporter, IntelligenceReporter, NoopReporter, TurnProcessor};
use scam_honeypot::session::{LibSqlSessionStore, MemorySessionStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server = ServerConfig::from_env().context("Invalid server configuration")?;
    let engine = EngineConfig::from_env().context("Invalid engine configuration")?;

    eprintln!("🍯 Scam Honeypot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", server.model);
    eprintln!("   API: http://0.0.0.0:{}/api/turn", server.port);

    // ── LLM + oracles ───────────────────────────────────────────────────
    let llm: Arc<dyn LlmProvider> = Arc::new(
        AnthropicProvider::new(server.api_key.clone(), server.model.clone())
            .context("Failed to create LLM provider")?,
    );
    let classifier = Arc::new(LlmClassifier::new(Arc::clone(&llm)));
    let engager = Arc::new(LlmEngager::new(Arc::clone(&llm)));

    // ── Session store ───────────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = match server.db_path {
        Some(ref path) => {
            eprintln!("   Database: {path}");
            Arc::new(
                LibSqlSessionStore::new_local(Path::new(path))
                    .await
                    .with_context(|| format!("Failed to open database at {path}"))?,
            )
        }
        None => {
            eprintln!("   Database: in-memory (sessions are lost on restart)");
            Arc::new(MemorySessionStore::new())
        }
    };

    // ── Reporting ───────────────────────────────────────────────────────
    let reporter: Arc<dyn IntelligenceReporter> = match server.callback_url {
        Some(ref url) => {
            eprintln!("   Callback: {url}");
            Arc::new(HttpReporter::new(url.clone()).context("Failed to create reporter")?)
        }
        None => Arc::new(NoopReporter),
    };

    let processor = Arc::new(TurnProcessor::new(
        engine,
        PatternMatcher::default_rules(),
        classifier,
        engager,
        store,
        reporter,
    ));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server.port))
        .await
        .with_context(|| format!("Failed to bind port {}", server.port))?;
    tracing::info!(port = server.port, "Honeypot API started");

    axum::serve(listener, routes(processor))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
