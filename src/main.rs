use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use loqa_speech::config::{InputKind, DEFAULT_CONFIG_PATH};
use loqa_speech::session::ChannelSink;
use loqa_speech::{
    create_router, AppState, BackendKind, Config, ConfiguredFactory, NatsClient, RecognitionEvent, SessionFactory,
    SessionRegistry, SessionState,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loqa-speech", version, about = "Streaming speech recognition sessions")]
struct Cli {
    /// Config file (extension optional)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control API
    Serve,

    /// Run a single recognition attempt and print its events
    Listen {
        #[arg(long, value_enum, default_value = "streaming")]
        backend: BackendArg,

        /// Read audio from a WAV clip instead of the microphone
        #[arg(long)]
        wav: Option<PathBuf>,

        /// Model directory for the streaming backend
        #[arg(long)]
        model: Option<PathBuf>,

        /// BCP-47 language tag
        #[arg(long)]
        language: Option<String>,

        /// Attempt length in seconds
        #[arg(long)]
        max_duration: Option<u32>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum BackendArg {
    Streaming,
    Delegated,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Streaming => BackendKind::Streaming,
            BackendArg::Delegated => BackendKind::Delegated,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("Loqa Speech v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Listen {
            backend,
            wav,
            model,
            language,
            max_duration,
        } => {
            let mut cfg = cfg;
            if let Some(path) = wav {
                cfg.audio.input = InputKind::File;
                cfg.audio.file_path = Some(path);
            }
            if model.is_some() {
                cfg.model.path = model;
            }
            if language.is_some() {
                cfg.recognition.language = language;
            }
            if let Some(secs) = max_duration {
                cfg.recognition.max_duration_secs = secs;
            }
            listen(cfg, backend.into()).await
        }
    }
}

async fn connect_nats(cfg: &Config, required: bool) -> Result<Option<Arc<NatsClient>>> {
    if !cfg.nats.enabled && !required {
        return Ok(None);
    }
    let client = NatsClient::connect(&cfg.nats.url).await?;
    Ok(Some(Arc::new(client)))
}

async fn serve(cfg: Config) -> Result<()> {
    let nats = connect_nats(&cfg, false).await?;
    let address = cfg.service.http.address();
    let defaults = cfg.recognition.clone();

    let registry = Arc::new(SessionRegistry::new(cfg.sessions.conflict_policy));
    let factory = Arc::new(ConfiguredFactory::new(cfg, nats.clone()));
    let state = AppState::new(Arc::clone(&registry), factory).with_defaults(defaults);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("HTTP server listening on {}", address);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    registry.shutdown().await;
    if let Some(nats) = nats {
        if let Err(e) = nats.flush().await {
            warn!("{:#}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn listen(cfg: Config, kind: BackendKind) -> Result<()> {
    let nats = connect_nats(&cfg, kind == BackendKind::Delegated).await?;
    let recognition = cfg.recognition.clone();
    let factory = ConfiguredFactory::new(cfg, nats);

    let (sink, mut events) = ChannelSink::new();
    let session = factory.build_with_sink("cli", kind, Arc::new(sink))?;

    if kind == BackendKind::Streaming {
        let model = factory
            .default_model()
            .context("Streaming backend needs a model (--model or model.path)")?;
        session.load_model(model).await?;
    }

    let mut state = session.subscribe_state();
    session.start(recognition).await?;

    loop {
        tokio::select! {
            Some(event) = events.recv() => print_event(&event)?,
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == SessionState::Idle {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                session.stop().await;
                break;
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        print_event(&event)?;
    }

    session.release().await;
    Ok(())
}

fn print_event(event: &RecognitionEvent) -> Result<()> {
    println!("{}", serde_json::to_string(event)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}
