use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};

use server::app::Application;
use server::config;
use server::network::{build_router, ApiState};
use server::records::PgRecordsRepository;
use server::state::{self, StateManager};
use server::strand::{spawn_strand, StrandHandle};

/// Connections kept open to the leaderboard store
const RECORDS_POOL_SIZE: u32 = 2;

// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the game config JSON
    #[clap(short, long, default_value = "./data/config.json")]
    config_file: PathBuf,

    /// Root directory of the static content
    #[clap(short, long, default_value = "./static")]
    www_root: PathBuf,

    /// Tick period in milliseconds; omit to expose the manual tick endpoint
    #[clap(short, long)]
    tick_period: Option<u64>,

    /// Spawn dogs at random positions along the roads
    #[clap(long)]
    randomize_spawn_points: bool,

    /// Path of the world snapshot file
    #[clap(long)]
    state_file: Option<PathBuf>,

    /// Snapshot save period in game-time milliseconds
    #[clap(long)]
    save_state_period: Option<u64>,

    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    // Print a message about setting RUST_LOG if not set
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Warning: RUST_LOG environment variable not set. Set it to display logs!");
        eprintln!("Recommended: RUST_LOG=info cargo run");
    }

    let args = Args::parse();
    let auto_tick = args.tick_period.is_some();

    let game_config = config::load_config(&args.config_file)?;
    let mut app = Application::new(game_config, args.randomize_spawn_points, auto_tick);

    // Without GAME_DB_URL retirements still happen, they just go unrecorded.
    if let Ok(db_url) = std::env::var("GAME_DB_URL") {
        let repo = PgRecordsRepository::connect(&db_url, RECORDS_POOL_SIZE).await?;
        app.set_records_repository(Arc::new(repo));
        info!("leaderboard store connected");
    }

    if let Some(state_file) = &args.state_file {
        if state_file.exists() {
            // A broken snapshot is fatal; starting with a silently empty
            // world would lose every player's progress.
            state::load_state(&mut app, state_file)?;
        }
        let mut manager = StateManager::new(
            state_file.clone(),
            args.save_state_period.map(Duration::from_millis),
        );
        app.set_tick_observer(Box::new(move |app, delta| manager.on_tick(app, delta)));
    }

    let records = app.records_repository();
    let (strand, strand_task) = spawn_strand(app, args.state_file.clone());

    if let Some(period_ms) = args.tick_period {
        let handle = strand.clone();
        tokio::spawn(run_ticker(handle, Duration::from_millis(period_ms)));
    }

    let router = build_router(
        ApiState { strand: strand.clone(), records, auto_tick },
        &args.www_root,
    );

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("server started on {addr}");
    if let Some(period_ms) = args.tick_period {
        info!("tick period: {period_ms} ms");
    } else {
        info!("auto tick disabled, POST /api/v1/game/tick drives the clock");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drains pending commands, writes the final snapshot, then exits.
    strand.shutdown().await;
    if let Err(err) = strand_task.await {
        error!("api strand ended abnormally: {err}");
    }
    info!("server exited");
    Ok(())
}

/// Posts elapsed wall-clock time onto the strand at the configured cadence
async fn run_ticker(strand: StrandHandle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick of an interval completes immediately.
    interval.tick().await;

    let mut last_tick = Instant::now();
    loop {
        interval.tick().await;
        let now = Instant::now();
        let delta = now.duration_since(last_tick);
        last_tick = now;

        if strand.tick_detached(delta).await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
