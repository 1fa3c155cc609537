// src/bin/remote-host.rs

use remote_runner::{cli::HostArgs, host, logging};

use clap::Parser;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("remote-host error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = HostArgs::parse();
    logging::init_logging(args.log_level)?;
    host::run_host(args).await
}
