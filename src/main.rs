use anyhow::Result;
use blindfold::{Config, Console};
use clap::Parser;
use std::io;

fn main() -> Result<()> {
    let config = Config::parse();

    let level = if config.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut console = Console::new(stdin.lock(), stdout.lock(), config)?;
    console.run()
}
