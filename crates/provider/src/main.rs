use provider::ClockServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // stdout carries JSON-RPC, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let server = ClockServer::new();
    if let Err(e) = server.serve(tokio::io::stdin(), tokio::io::stdout()).await {
        tracing::error!(error = %e, "provider stopped");
        std::process::exit(1);
    }
}
