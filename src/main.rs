// src/main.rs

use chaincore::config::Config;
use chaincore::proto::handler::handle_request;
use chaincore::proto::protocol::failure;
use chaincore::CoreState;

use tokio::io::{self, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One process, one request, one response. The bridge writes the request
/// to stdin and closes it; we write exactly one JSON line to stdout and
/// exit 0 -- application failures live in the envelope, not the exit code.
#[tokio::main]
async fn main() {
    // All tracing goes to stderr; stdout is the protocol channel
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chaincore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let response = run().await;

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|e| format!("{{\"status\":\"error\",\"code\":1,\"error\":\"unserializable response: {}\"}}", e));

    let mut stdout = io::stdout();
    if let Err(e) = stdout.write_all(format!("{}\n", body).as_bytes()).await {
        error!("failed to write response: {}", e);
    }
    let _ = stdout.flush().await;
}

async fn run() -> serde_json::Value {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            return failure(2, &format!("configuration error: {}", e));
        }
    };
    let state = CoreState::new(config);

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input).await {
        error!("failed to read stdin: {}", e);
        return failure(2, &format!("failed to read request: {}", e));
    }
    debug!("received {} bytes", input.len());

    handle_request(&input, &state).await
}
