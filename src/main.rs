use anyhow::Result;
use clap::Parser;
use meetcap::{
    cli::{
        handle_ask_command, handle_play_command, handle_record_command, handle_show_command,
        handle_track_command, handle_upload_command, Cli, CliCommand,
    },
    config::Config,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let CliCommand::Version = cli.command {
        println!("meetcap {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load()?;

    match cli.command {
        CliCommand::Record(args) => handle_record_command(args, config).await,
        CliCommand::Upload(args) => handle_upload_command(args, config).await,
        CliCommand::Track(args) => handle_track_command(args, config).await,
        CliCommand::Show(args) => handle_show_command(args, config).await,
        CliCommand::Ask(args) => handle_ask_command(args, config).await,
        CliCommand::Play(args) => handle_play_command(args).await,
        CliCommand::Version => Ok(()),
    }
}
