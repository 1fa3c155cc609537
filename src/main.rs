// src/main.rs

use remote_runner::{cli::BootArgs, logging, run};

use clap::Parser;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("remote-boot error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = BootArgs::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}
