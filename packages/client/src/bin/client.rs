//! Headless chat and stream-health client.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin sajiki-client -- --server http://127.0.0.1:5051/
//! ```

use clap::Parser;
use sajiki_client::{Cli, ClientConfig, ClientError};
use sajiki_shared::logger::setup_logger;

async fn start(cli: Cli) -> Result<(), ClientError> {
    let config = ClientConfig::try_from(cli)?;
    sajiki_client::run(config).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &cli.log_level);

    // Run the client
    if let Err(e) = start(cli).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
