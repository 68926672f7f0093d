use clap::Parser;
use lobby_server::{args::Args, run, setup_logging};
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    setup_logging();
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}
