use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use article_ratings::{
    cli::{Cli, Command, ServeArgs},
    commands,
    server::StoreServer,
    store::memory::MemoryStore,
};

fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Serve(args) => {
            init_tracing("info");
            serve(args)
        }
        Command::Client(command) => {
            init_tracing("warn");
            commands::validate(command)?;

            let settings = cli.settings();
            let store = settings
                .connect()
                .with_context(|| format!("failed to connect to store at {}", settings.store_addr))?;
            let stdout = io::stdout();
            commands::execute(command, &store, &settings, &mut stdout.lock())
        }
    }
}

fn serve(args: &ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = TcpListener::bind(args.listen)
            .await
            .with_context(|| format!("failed to bind {}", args.listen))?;
        let server = StoreServer::new(listener, Arc::new(MemoryStore::new()));
        let addr = server.local_addr()?;
        info!("store listening on {}", addr);
        // Printed on stdout so callers binding port 0 learn the real port.
        println!("{addr}");

        server.run_until_ctrl_c().await
    })
}
