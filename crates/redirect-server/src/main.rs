//! Redirect server standalone binary.

use clap::Parser;
use redirect_server::cli::{self, ServerArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();
    cli::run(args).await
}
