//! dmk - render Graphviz code blocks in markdown files

mod args;
mod commands;
mod watch;

use clap::Parser;
use eyre::Result;
use tracing_subscriber::prelude::*;

use crate::args::{Cli, Command};

fn init_tracing() {
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact();
    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    let config = cli.config.clone();

    match cli.command {
        Command::Render(args) => commands::render(config, args).await,
        Command::Watch(args) => watch::run(config, args).await,
        Command::Config(args) => commands::config(config, args),
        Command::Suggest(args) => commands::suggest(config, args),
    }
}
