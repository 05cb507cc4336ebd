use clap::Parser;
use pmp_llm_streaming::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Chat(args) => cli::chat::run(args).await,
        Command::Capabilities(args) => cli::capabilities::run(args).await,
    }
}
