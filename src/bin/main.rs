use anyhow::Result;
use clap::Parser;
use jdk_type_index::cli;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    let level = if args.quiet { Level::ERROR } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    cli::run(args).await
}
