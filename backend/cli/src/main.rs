use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use ocrdeck_config::{
    config_dir, config_file_path, load_config, prepare_with, process_env, write_config,
    OcrDeckConfig, Settings,
};
use ocrdeck_core::{Rect, SourceKind};
use ocrdeck_logging::init_logger;
use ocrdeck_recognition::{SessionRecorder, TesseractFactory};

use ocrdeck_cli::api::{self, ViewerState};
use ocrdeck_cli::app::{App, LiveSources};
use ocrdeck_cli::config::{Overrides, ServeConfig};
use ocrdeck_cli::jobs::ControllerEvent;
use ocrdeck_cli::output;

/// Attempts to get a first frame from a stream or card.
const FIRST_FRAME_RETRIES: u32 = 30;
const FIRST_FRAME_DELAY: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(name = "ocrdeck")]
#[command(about = "OcrDeck: region OCR over monitors, network streams and capture cards")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List monitors available for capture
    Monitors,
    /// List capture devices for an ffmpeg input format
    Devices {
        /// dshow, avfoundation, v4l2 or decklink (defaults to the configured format)
        #[arg(long)]
        format: Option<String>,
    },
    /// Capture one frame, recognize the regions and save the result
    Once {
        /// Region as left,top,right,bottom in source pixels; repeat for more
        #[arg(long = "region", required = true)]
        regions: Vec<String>,
        /// Also write a timestamped history file
        #[arg(long)]
        history: bool,
    },
    /// Recognize the regions repeatedly until interrupted
    Watch {
        #[arg(long = "region", required = true)]
        regions: Vec<String>,
        /// Milliseconds between passes (minimum 500)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print the latest saved result
    Show,
    /// Serve a self-refreshing page with the latest result
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask a running viewer for its health and latest result
    Status,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a config file with every default filled in
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config after env and flag overrides
    Show,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        output::note_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let path = cli
        .overrides
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let raw = load_config(&path).await?;

    let early = Settings::from_config(&raw);
    init_logger(&early.log_dir, &early.log_level);

    let config = prepare_with(raw, &process_env(), |c| cli.overrides.apply(c))?;
    let settings = Settings::from_config(&config);

    match cli.command {
        Commands::Monitors => {
            print!("{}", output::render_monitors(&ocrdeck_capture::list_monitors()));
        }
        Commands::Devices { format } => {
            let format = format.unwrap_or_else(|| settings.card_format.clone());
            let devices = ocrdeck_capture::list_devices(&format);
            print!("{}", output::render_devices(&format, &devices));
        }
        Commands::Once { regions, history } => {
            let regions = parse_regions(&regions)?;
            let mut app = open_app(settings).await?;
            for rect in regions {
                app.add_region(rect)?;
            }
            let saved = app.run_recognition(history).await?;
            if let Some(session) = app.last_session() {
                print!("{}", output::render_session(session));
            }
            output::note_success(&format!("Saved {}", saved.latest.display()));
            if let Some(history) = saved.history {
                output::note_info(&format!("History {}", history.display()));
            }
            app.shutdown();
        }
        Commands::Watch { regions, interval } => {
            let regions = parse_regions(&regions)?;
            let mut settings = settings;
            if let Some(ms) = interval {
                settings.auto_interval_ms = ms;
            }
            watch(open_app(settings).await?, regions).await?;
        }
        Commands::Show => match SessionRecorder::load_latest(&settings.output_dir).await? {
            Some(session) => print!("{}", output::render_session(&session)),
            None => output::note_warn(&format!(
                "No result in {} yet",
                settings.output_dir.display()
            )),
        },
        Commands::Serve { port } => {
            let serve = ServeConfig::from_env();
            let serve = ServeConfig {
                port: port.unwrap_or(serve.port),
                ..serve
            };
            run_server(serve, settings.output_dir).await?;
        }
        Commands::Status => status(ServeConfig::from_env()).await?,
        Commands::Config { action } => match action {
            ConfigAction::Init { force } => init_config(&path, force).await?,
            ConfigAction::Show => print!("{}", serde_yaml::to_string(&config)?),
        },
    }

    Ok(())
}

fn parse_regions(raw: &[String]) -> Result<Vec<Rect>> {
    raw.iter()
        .map(|r| r.parse::<Rect>().with_context(|| format!("--region {r}")))
        .collect()
}

/// Build the controller on the configured source and wait for a frame.
async fn open_app(settings: Settings) -> Result<App> {
    let kind = settings.source_kind;
    let mut app = App::new(settings, Arc::new(LiveSources), Arc::new(TesseractFactory));
    app.activate_configured_source()?;
    match kind {
        SourceKind::Monitor => app.capture_now()?,
        SourceKind::Stream | SourceKind::Card => {
            app.wait_for_first_frame(FIRST_FRAME_RETRIES, FIRST_FRAME_DELAY)
                .await?
        }
    };
    info!(status = app.status(), "Source ready");
    Ok(app)
}

async fn watch(mut app: App, regions: Vec<Rect>) -> Result<()> {
    for rect in regions {
        app.add_region(rect)?;
    }
    let Some(mut events) = app.take_event_receiver() else {
        bail!("event receiver already taken");
    };
    app.toggle_auto()?;
    output::note_info(&format!("{} (Ctrl-C to stop)", app.status()));

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let finished = matches!(event, ControllerEvent::PassFinished(_));
                app.handle_event(event);
                if finished {
                    println!("{}", app.status());
                    if let Some(session) = app.last_session() {
                        print!("{}", output::render_session(session));
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    app.shutdown();
    output::note_info(&format!("Stopped after {} pass(es)", app.auto_cycles()));
    Ok(())
}

async fn run_server(config: ServeConfig, output_dir: PathBuf) -> Result<()> {
    info!(
        port = config.port,
        bind = %config.bind_address,
        dir = %output_dir.display(),
        "Starting OcrDeck viewer"
    );

    let state = Arc::new(ViewerState {
        output_dir,
        refresh_secs: config.refresh_secs,
    });
    let app = api::build_router(state).layer(CorsLayer::permissive());
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP viewer listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn status(config: ServeConfig) -> Result<()> {
    let base = format!("http://{}:{}", config.bind_address, config.port);
    let client = reqwest::Client::new();
    match client.get(format!("{base}/api/health")).send().await {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            output::note_warn(&format!("No viewer running at {base}"));
            return Ok(());
        }
    }
    let resp = client.get(format!("{base}/api/latest")).send().await?;
    if resp.status().is_success() {
        let session: ocrdeck_core::Session = resp.json().await?;
        print!("{}", output::render_session(&session));
    } else {
        output::note_warn("Viewer has no result yet");
    }
    Ok(())
}

async fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to replace it", path.display());
    }
    let config = ocrdeck_config::apply_all_defaults(OcrDeckConfig::default());
    write_config(&config, path).await?;
    output::note_success(&format!("Wrote {}", path.display()));
    Ok(())
}
