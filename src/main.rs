mod commands;
mod config;
mod findings;
mod fix;
mod mapping;
mod registry;
mod scan;
mod server;
mod transport;
mod utils;

use server::FixinatorServer;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

#[tokio::main]
async fn main() {
    // Log to a file next to the workspace; stdout belongs to the protocol.
    let log_dir = std::env::current_dir().unwrap();
    let log_path = log_dir.join("fixlsp.log");

    let file_appender = tracing_appender::rolling::never(".", "fixlsp.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::DEBUG.into()),
        )
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!("{}", "=".repeat(80));
    tracing::info!("🚀 Starting Fixinator language server...");
    tracing::info!("📝 Log file location: {}", log_path.display());
    tracing::info!("{}", "=".repeat(80));

    let (service, socket) = LspService::new(FixinatorServer::new);

    tracing::info!("✅ Server ready, starting to serve requests...");
    Server::new(stdin(), stdout(), socket).serve(service).await;

    tracing::info!("🛑 Fixinator language server shutting down...");
}
