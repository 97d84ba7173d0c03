//! Code Compass binary — thin CLI shell over the [`code_compass`] library.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use code_compass::chat::ChatClient;
use code_compass::config::{self, Config};
use code_compass::embedding::EmbeddingClient;
use code_compass::protocol::Dispatcher;
use code_compass::retrieval::RetrievalEngine;
use code_compass::tools::ask::AskTool;
use code_compass::tools::file_reader::FileReaderTool;
use code_compass::tools::search::SearchTool;
use code_compass::transport;
use code_compass::vector_store::VectorStoreClient;

/// Retrieval server answering agent queries over indexed source-code
/// repositories, with verifiable evidence — MCP tools over STDIO and HTTP.
#[derive(Parser)]
#[command(name = "code-compass", version, about, long_about = None)]
struct Cli {
    /// Run the HTTP JSON-RPC transport instead of STDIO, overriding MCP_SERVER_MODE.
    #[arg(long)]
    http: bool,
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down...");
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("code_compass=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    config::bootstrap_env();
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(err) => {
            error!(error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let vector_store = Arc::new(VectorStoreClient::new(
        cfg.qdrant_url.clone(),
        cfg.qdrant_api_key.clone(),
        cfg.qdrant_timeout_secs,
        cfg.qdrant_mock_response.clone(),
    ));
    let embedding = Arc::new(EmbeddingClient::new(cfg.ollama_url.clone(), cfg.external_call_timeout_secs));
    let chat = Arc::new(ChatClient::new(cfg.ollama_url.clone(), cfg.external_call_timeout_secs));

    let retrieval = Arc::new(RetrievalEngine::new(vector_store, cfg.clone()));
    let search = Arc::new(SearchTool::new(retrieval, cfg.clone()));
    let file_reader = Arc::new(FileReaderTool::new(cfg.clone()));
    let ask = Arc::new(AskTool::new(embedding, search.clone(), file_reader.clone(), chat, cfg.clone()));

    let dispatcher = Arc::new(Dispatcher::new(search, file_reader, ask));

    info!(
        codebase_root = %cfg.codebase_root.display(),
        http_mode = cli.http || cfg.http_mode,
        "Code Compass starting"
    );

    let run_http = cli.http || cfg.http_mode;
    let result = if run_http {
        tokio::select! {
            res = transport::http::run(dispatcher, &cfg.http_host, cfg.http_port) => res,
            _ = shutdown_signal() => Ok(()),
        }
    } else {
        tokio::select! {
            res = transport::stdio::run(dispatcher) => res,
            _ = shutdown_signal() => Ok(()),
        }
    };

    if let Err(err) = result {
        error!(error = %err, "Transport terminated with an error");
        std::process::exit(1);
    }
}
