//! Weather Logger - BME280 sampling, SQLite persistence and git sync.
//!
//! Run with: `cargo run -p weather-logger -- run --mock-sensor`

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use weather_logger::actions::{export_recent, publish, purge_expired};
use weather_logger::{
    AlertLog, Config, Error, GitCli, IIO_DEVICES_DIR, IioSensor, LocalClock, MockSensor,
    SampleSource, Scheduler, Synchronizer, TcpProbe,
};
use weather_store::{CsvExporter, Store};

/// Weather Logger - sample a BME280, keep a year of readings, publish a week.
#[derive(Parser, Debug)]
#[command(name = "weather-logger")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Repository root (overrides config).
    #[arg(long, global = true)]
    repo_root: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the logger in the foreground (default behavior).
    Run {
        /// Use a simulated sensor instead of the BME280.
        #[arg(long)]
        mock_sensor: bool,
    },

    /// Export the last week of readings to CSV now.
    Export,

    /// Export and commit/push to git now.
    Sync,

    /// Delete readings past the retention period now.
    Purge,

    /// Validate the configuration and print resolved paths.
    CheckConfig,
}

fn main() -> anyhow::Result<()> {
    // The local offset can only be read while the process is single-threaded
    let (clock, offset_known) = LocalClock::detect();

    let args = Args::parse();
    init_tracing(&args);
    if !offset_known {
        warn!("Local UTC offset unavailable, timestamps will be in UTC");
    }

    let result = load_config(&args).and_then(|config| {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;
        runtime.block_on(dispatch(args.command, config, clock))
    });

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn init_tracing(args: &Args) {
    let filter = if args.quiet {
        EnvFilter::new("warn")
    } else if args.verbose {
        EnvFilter::new("weather_logger=debug,weather_store=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("weather_logger=info,weather_store=info"))
    };

    // stdout is reserved for alert lines
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(repo_root) = &args.repo_root {
        config.repo_root = repo_root.clone();
    }
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }

    config.validate()?;
    Ok(config)
}

async fn dispatch(command: Option<Command>, config: Config, clock: LocalClock) -> anyhow::Result<()> {
    match command {
        Some(Command::Run { mock_sensor }) => run_logger(config, clock, mock_sensor).await,
        None => run_logger(config, clock, false).await,
        Some(Command::Export) => export_now(&config, clock),
        Some(Command::Sync) => sync_now(&config, clock).await,
        Some(Command::Purge) => purge_now(&config, clock),
        Some(Command::CheckConfig) => {
            check_config(&config);
            Ok(())
        }
    }
}

async fn run_logger(config: Config, clock: LocalClock, mock_sensor: bool) -> anyhow::Result<()> {
    // Install handlers before anything slow so an early signal is not fatal
    let shutdown = shutdown_signal().context("Failed to install signal handlers")?;

    let alerts = AlertLog::open(config.alert_path(), clock)?;
    let store = Store::open(config.db_path()).map_err(Error::Store)?;
    let sensor = open_sensor(&config, mock_sensor)?;

    let scheduler = Scheduler::new(
        config.schedule(),
        store,
        sensor,
        CsvExporter::new(config.export_path()),
        synchronizer(&config),
        alerts,
        Instant::now(),
    );
    scheduler.run(&clock, shutdown).await?;
    Ok(())
}

fn open_sensor(config: &Config, mock: bool) -> Result<Box<dyn SampleSource>, Error> {
    if mock {
        info!("Using mock sensor");
        return Ok(Box::new(MockSensor::new()));
    }
    let sensor = match &config.sensor.device {
        Some(device) => IioSensor::open(device)?,
        None => IioSensor::discover(IIO_DEVICES_DIR)?,
    };
    Ok(Box::new(sensor))
}

fn synchronizer(config: &Config) -> Synchronizer<TcpProbe, GitCli> {
    Synchronizer::new(
        TcpProbe::new(
            config.sync.probe_host.clone(),
            config.sync.probe_port,
            config.sync.probe_timeout(),
        ),
        GitCli::new(config.sync.git_program.clone(), config.sync.command_timeout()),
    )
}

fn export_now(config: &Config, clock: LocalClock) -> anyhow::Result<()> {
    let alerts = AlertLog::open(config.alert_path(), clock)?;
    let store = Store::open(config.db_path()).map_err(Error::Store)?;
    let exporter = CsvExporter::new(config.export_path());

    let schedule = config.schedule();
    export_recent(&store, &exporter, &alerts, clock.wall(), schedule.export_window)?;
    store.close().map_err(Error::Store)?;
    Ok(())
}

async fn sync_now(config: &Config, clock: LocalClock) -> anyhow::Result<()> {
    let alerts = AlertLog::open(config.alert_path(), clock)?;
    let store = Store::open(config.db_path()).map_err(Error::Store)?;
    let exporter = CsvExporter::new(config.export_path());
    let schedule = config.schedule();
    let now = clock.wall();

    export_recent(&store, &exporter, &alerts, now, schedule.export_window)?;
    store.close().map_err(Error::Store)?;

    let outcome = publish(&synchronizer(config), &alerts, &schedule.repo_root, now).await?;
    info!("Sync finished: {:?}", outcome);
    Ok(())
}

fn purge_now(config: &Config, clock: LocalClock) -> anyhow::Result<()> {
    let alerts = AlertLog::open(config.alert_path(), clock)?;
    let mut store = Store::open(config.db_path()).map_err(Error::Store)?;

    purge_expired(&mut store, &alerts, clock.wall(), config.schedule().retention)?;
    store.close().map_err(Error::Store)?;
    Ok(())
}

fn check_config(config: &Config) {
    println!("Configuration OK");
    println!("  repo root:  {}", config.repo_root().display());
    println!("  database:   {}", config.db_path().display());
    println!("  export:     {}", config.export_path().display());
    println!("  alert log:  {}", config.alert_path().display());
    match &config.sensor.device {
        Some(device) => println!("  sensor:     {}", device.display()),
        None => println!("  sensor:     discover under {}", IIO_DEVICES_DIR),
    }
    if config.sync.enabled {
        println!(
            "  sync:       every {} min via {}:{}",
            config.sync.interval_minutes, config.sync.probe_host, config.sync.probe_port
        );
    } else {
        println!("  sync:       disabled");
    }
}

#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => info!("Received SIGINT"),
            _ = terminate.recv() => info!("Received SIGTERM"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
