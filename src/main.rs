use crate::pipeline::workflow::launch;
use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod error;
mod llm;
mod pipeline;
mod search;
mod types;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = cli::Args::parse();
    let config = args.into_config();

    launch(&config).await
}
