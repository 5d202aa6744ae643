mod app;
mod renderer;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use vizwire_client::Session;
use vizwire_core::{ClientConfig, ConnectionState, ReconnectMode, Route};

use crate::app::App;

#[derive(Parser, Debug)]
#[command(name = "vizwire", about = "Live dashboard for a VizUpdate WebSocket stream")]
struct Args {
    /// WebSocket endpoint, overriding the config file.
    #[arg(long = "ws")]
    ws: Option<String>,

    /// TOML file with `endpoint` and `[retry]` settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep reconnecting after the server drops an established connection.
    #[arg(long)]
    always_reconnect: bool,

    /// Initial view: `/dashboard`, `/plot/<index>` or `/`.
    #[arg(long, default_value = "/")]
    open: String,

    /// Log updates to stderr instead of drawing the dashboard.
    #[arg(long)]
    headless: bool,

    /// Write the received records as a recording on exit.
    #[arg(long)]
    save: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let Some(path) = path else {
        return Ok(ClientConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    ClientConfig::from_toml_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Anything written to stderr would tear through the alternate screen.
    let default_filter = if args.headless { "info" } else { "off" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = load_config(args.config.as_deref())?;
    if args.always_reconnect {
        config.retry.mode = ReconnectMode::Always;
    }

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    let mut session = Session::from_config(runtime.handle().clone(), &config, args.ws.as_deref());
    info!("endpoint {}", session.client().endpoint());

    if args.headless {
        runtime.block_on(run_headless(&mut session))?;
    } else {
        let mut app = App::new(Route::parse(&args.open));
        renderer::run_tui(&mut session, &mut app)?;
    }

    if let Some(path) = &args.save {
        save_records(&session, path)?;
    }
    Ok(())
}

async fn run_headless(session: &mut Session) -> Result<()> {
    session.start();
    let mut state = session.client().manager().state();
    let mut seen = 0;
    loop {
        tokio::select! {
            open = session.next() => {
                if !open {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for ctrl-c")?;
                info!("interrupted");
                break;
            }
        }

        let client = session.client();
        let now = client.manager().state();
        if now != state {
            match (now, client.last_error()) {
                (ConnectionState::Errored, Some(error)) => warn!("{now}: {error}"),
                _ => info!("{now}"),
            }
            state = now;
        }
        let records = client.records();
        // A clear resets the count without a new record.
        seen = seen.min(records.len());
        for (index, viz) in records.iter().enumerate().skip(seen) {
            info!("#{index} {} [{}]", viz.name, viz.widget_summary());
        }
        seen = records.len();
    }
    Ok(())
}

fn save_records(session: &Session, path: &Path) -> Result<()> {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let recording = session
        .client()
        .store()
        .to_recording("vizwire", format!("session-{stamp}"));
    recording
        .save(path)
        .with_context(|| format!("saving {}", path.display()))?;
    info!("saved {} records to {}", recording.vizs.len(), path.display());
    Ok(())
}
