//! Redirect client standalone binary.

use clap::Parser;
use redirect_client::cli::{self, ClientArgs};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();
    cli::run(args).await
}
