use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use realtime_console::{
    create_router, AppState, CaptureBackendConfig, CaptureBackendFactory, Config, Console,
    RealtimeClient, RealtimeConfig, StreamingRecorder,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "realtime-console", version, about = "Interactive console for the realtime API")]
struct Cli {
    /// Config file (extension optional)
    #[arg(short, long, default_value = "config/realtime-console")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive terminal console (default)
    Repl {
        /// Connect immediately
        #[arg(long)]
        connect: bool,
    },
    /// Serve the HTTP console
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
}

const HELP: &str = "\
commands:
  /connect [model]   open the realtime session
  /disconnect        close it
  /record            start/stop the microphone
  /logs [full]       print the event log
  /transcript        print the assistant transcript
  /status            print console status
  /quit              exit
anything else is sent as a raw event, e.g. {\"type\": \"response.create\"}";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Realtime console v{}", env!("CARGO_PKG_VERSION"));
    info!("Endpoint: {} (model={})", cfg.realtime.url, cfg.realtime.model);

    let console = Arc::new(build_console(&cfg)?);

    #[cfg(feature = "device-audio")]
    let _playback = match realtime_console::audio::PlaybackStream::start(
        console.playback().clone(),
        CaptureBackendConfig::from(&cfg.audio),
    ) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!("Audio playback unavailable: {:#}", e);
            None
        }
    };

    let tick = Duration::from_millis(cfg.console.tick_ms.max(1));

    let result = match cli.command.unwrap_or(Command::Repl { connect: false }) {
        Command::Repl { connect } => run_repl(Arc::clone(&console), tick, connect).await,
        Command::Serve { port } => {
            let port = port.unwrap_or(cfg.console.http.port);
            run_server(Arc::clone(&console), &cfg.console.http.bind, port, tick).await
        }
    };

    console.disconnect().await?;

    result
}

fn build_console(cfg: &Config) -> Result<Console> {
    let client = RealtimeClient::new(RealtimeConfig::from(&cfg.realtime));
    let backend = CaptureBackendFactory::create(CaptureBackendConfig::from(&cfg.audio))
        .context("Failed to create capture backend")?;

    info!("Capture backend: {}", backend.name());

    Ok(Console::new(
        client,
        StreamingRecorder::new(backend),
        cfg.realtime.model.clone(),
    ))
}

/// Drain captured audio into the session on every tick
fn spawn_capture_drain(console: Arc<Console>, tick: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            if let Err(e) = console.drain_capture().await {
                warn!("Capture drain failed: {}", e);
            }
        }
    })
}

async fn run_server(console: Arc<Console>, bind: &str, port: u16, tick: Duration) -> Result<()> {
    let drain = spawn_capture_drain(Arc::clone(&console), tick);

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP console listening on http://{}", addr);

    let router = create_router(AppState::new(console));
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server failed")?;

    drain.abort();
    Ok(())
}

async fn run_repl(console: Arc<Console>, tick: Duration, connect: bool) -> Result<()> {
    println!("{}", HELP);

    if connect {
        report(console.connect(None).await.map(|_| "Connected".to_string()));
    }

    let log = console.client().event_log();
    let mut printed = log.len();
    let mut transcript_len = 0usize;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut interval = tokio::time::interval(tick);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                if !handle_line(&console, line.trim()).await {
                    break;
                }
            }

            _ = interval.tick() => {
                if let Err(e) = console.drain_capture().await {
                    warn!("Capture drain failed: {}", e);
                }

                for entry in log.since(printed) {
                    println!("{}", entry.summary());
                    printed += 1;
                }

                let transcript = console.transcript();
                if transcript.len() > transcript_len {
                    println!("assistant: {}", &transcript[transcript_len..]);
                    transcript_len = transcript.len();
                }
            }
        }
    }

    Ok(())
}

/// Handle one input line; returns false to quit
async fn handle_line(console: &Console, line: &str) -> bool {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (line, None),
    };

    match command {
        "" => {}
        "/quit" | "/exit" => return false,
        "/help" => println!("{}", HELP),
        "/connect" => report(console.connect(arg).await.map(|_| "Connected".to_string())),
        "/disconnect" => report(console.disconnect().await.map(|_| "Disconnected".to_string())),
        "/record" => report(console.toggle_recording().await.map(|recording| {
            if recording {
                "Recording... /record again to send".to_string()
            } else {
                "Recording sent".to_string()
            }
        })),
        "/logs" => {
            for line in console.log_lines(arg == Some("full")) {
                println!("{}", line);
            }
        }
        "/transcript" => println!("{}", console.transcript()),
        "/status" => match serde_json::to_string_pretty(&console.status().await) {
            Ok(status) => println!("{}", status),
            Err(e) => println!("error: {}", e),
        },
        _ => report(
            console
                .send_user_json(line)
                .map(|event_type| format!("Sent {}", event_type)),
        ),
    }

    true
}

fn report<E: std::fmt::Display>(result: std::result::Result<String, E>) {
    match result {
        Ok(message) => println!("{}", message),
        Err(e) => println!("error: {}", e),
    }
}
