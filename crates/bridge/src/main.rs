use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use vizwire_bridge::{BridgeOptions, Replay, demo, serve, serve_one};
use vizwire_protocol::Recording;

/// Replay a recording to vizwire clients over WebSocket.
#[derive(Parser, Debug)]
#[command(name = "vizwire-bridge", version, about)]
struct Args {
    /// Address to bind.
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    #[arg(short, long, default_value_t = 3031)]
    port: u16,

    /// Recording file to replay.
    #[arg(short, long, required_unless_present = "demo", conflicts_with = "demo")]
    input: Option<PathBuf>,

    /// Replay a generated demo recording.
    #[arg(long)]
    demo: bool,

    /// Delay between frames, in milliseconds.
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// WebSocket path.
    #[arg(long, default_value = "/ws")]
    path: String,

    /// Close each connection after the last record.
    #[arg(long)]
    hang_up: bool,

    /// Exit after the first connection has been served.
    #[arg(long)]
    exit_after_serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let recording = match &args.input {
        Some(path) => Recording::load(path)
            .with_context(|| format!("loading recording {}", path.display()))?,
        None => demo::demo_recording(),
    };
    log::info!(
        "replaying `{}` ({} records)",
        recording.name,
        recording.vizs.len()
    );
    let replay = Replay::new(&recording)?;

    let options = BridgeOptions {
        path: args.path,
        interval: Duration::from_millis(args.interval_ms),
        hang_up: args.hang_up,
    };

    let bind = format!("{}:{}", args.address, args.port);
    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    log::info!("clients connect to ws://{bind}{}", options.path);

    if args.exit_after_serve {
        log::info!("will exit after serving the first connection");
        serve_one(&listener, &replay, &options).await?;
        return Ok(());
    }
    serve(listener, replay, options).await?;
    Ok(())
}
