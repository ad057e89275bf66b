mod cli;

use clap::Parser;
use cli::{Cli, Commands, DecideArgs, RunArgs};
use irrigo::config::Config;
use irrigo::datasources::{ForecastProvider, ForecastSource};
use irrigo::db::{Database, DecisionStore, MemoryStore};
use irrigo::error::{IrrigoError, Result};
use irrigo::logic::{build_control_system, DecisionService, ServiceOptions};
use irrigo::models::{RainForecast, RawTelemetry};
use irrigo::transport::{JsonLineSink, LineTransport};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

type Service = DecisionService<ForecastSource, Box<dyn DecisionStore>>;

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // stdout carries pump commands, so logs go to stderr
    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Run(RunArgs {
        listen: None,
        device: "default".into(),
    }));

    match command {
        Commands::Init => {
            Config::setup_interactive()?;
            Ok(())
        }
        Commands::Check => check(cli.config, cli.data_dir).await,
        Commands::History { limit, device } => {
            let config = Config::load_or_default(cli.config)?;
            let db = Database::open(&config.db_path(cli.data_dir.as_ref())?)?;
            print_history(&db, device.as_deref(), limit)
        }
        Commands::Decide(args) => {
            let config = Config::load_or_default(cli.config)?;
            decide(&config, args).await
        }
        Commands::Run(args) => {
            let config = Config::load_or_default(cli.config)?;
            let store = open_store(&config, cli.data_dir.as_ref())?;
            let service = Arc::new(build_service(&config, store)?);
            match args.listen {
                Some(addr) => serve_tcp(service, addr, args.device).await,
                None => serve_stdio(&service, &args.device).await,
            }
        }
    }
}

fn open_store(config: &Config, data_dir: Option<&PathBuf>) -> Result<Box<dyn DecisionStore>> {
    if !config.storage.persist {
        return Ok(Box::new(MemoryStore::new()));
    }
    let path = config.db_path(data_dir)?;
    tracing::info!(path = %path.display(), "Recording decisions");
    Ok(Box::new(Database::open(&path)?))
}

fn build_service(config: &Config, store: Box<dyn DecisionStore>) -> Result<Service> {
    let system = Arc::new(build_control_system(&config.engine.rule_set)?);
    let forecast = ForecastSource::from_config(&config.forecast)?;
    tracing::info!(forecast = forecast.name(), "Forecast source ready");
    let options = ServiceOptions::from_config(config)?;
    Ok(DecisionService::new(system, forecast, store, options))
}

async fn serve_stdio(service: &Service, device: &str) -> Result<()> {
    let mut source = LineTransport::new(BufReader::new(tokio::io::stdin()), device)?;
    let mut sink = JsonLineSink::new(tokio::io::stdout());
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    let cycles = service.serve(&mut source, &mut sink, shutdown).await?;
    tracing::info!(cycles, "Controller stopped");
    Ok(())
}

async fn serve_tcp(service: Arc<Service>, addr: SocketAddr, device: String) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening for telemetry");

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let mut connections = tokio::task::JoinSet::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::info!(%peer, "Device connected");

                let (read, write) = stream.into_split();
                let service = Arc::clone(&service);
                let mut stop = stop_rx.clone();
                let device = device.clone();

                connections.spawn(async move {
                    let mut source = LineTransport::new(BufReader::new(read), &device)?;
                    let mut sink = JsonLineSink::new(write);
                    let shutdown = async move {
                        let _ = stop.changed().await;
                    };
                    let cycles = service.serve(&mut source, &mut sink, shutdown).await?;
                    tracing::info!(%peer, cycles, "Device disconnected");
                    Ok::<_, IrrigoError>(())
                });
            }
        }
    }

    // Every open connection stops its pumps before we exit
    let _ = stop_tx.send(true);
    while let Some(result) = connections.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Connection ended with error: {}", e),
            Err(e) => tracing::warn!("Connection task failed: {}", e),
        }
    }

    Ok(())
}

async fn decide(config: &Config, args: DecideArgs) -> Result<()> {
    // One-shot decisions stay out of the controller's history
    let service = build_service(config, Box::new(MemoryStore::new()))?;

    let forecast = match args.rain_probability {
        Some(p) => RainForecast::new(p, None),
        None => service.forecast().await,
    };
    let raw = RawTelemetry::new(
        args.temperature,
        args.humidity,
        args.soil_moisture,
        args.raining,
    );
    let record = service.decide("cli", &raw, forecast)?;

    for anomaly in &record.anomalies {
        println!("  ! {}", anomaly);
    }
    println!("Rain probability: {:.0}%", record.rain_probability);
    match record.score {
        Some(score) => println!("Score: {:.2}", score),
        None => println!("Score: none (no rule fired)"),
    }
    println!("Pump: {}", record.state);

    if args.explain {
        let system = service.control_system();
        let inputs = record.reading.to_inputs(record.rain_probability);
        let strengths = match system.compute(&inputs) {
            Ok(inference) => inference.strengths,
            Err(_) => vec![0.0; system.rule_base().len()],
        };
        println!();
        for (rule, strength) in system.rule_base().rules().iter().zip(strengths) {
            println!("  {:.3}  {}", strength, rule);
        }
    }

    Ok(())
}

async fn check(config_path: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default(config_path)?;
    println!("Config: OK");

    let system = build_control_system(&config.engine.rule_set)?;
    println!(
        "Rule set: {} ({} rules)",
        config.engine.rule_set,
        system.rule_base().len()
    );

    ServiceOptions::from_config(&config)?;
    println!("Policy: OK");

    let forecast = ForecastSource::from_config(&config.forecast)?;
    match &forecast {
        ForecastSource::OpenWeatherMap(client) => match client.test_connection().await {
            Ok(true) => println!("OpenWeatherMap: OK"),
            Ok(false) => println!("OpenWeatherMap: rejected request (check API key)"),
            Err(e) => println!("OpenWeatherMap: OFFLINE ({})", e),
        },
        other => {
            let f = other.rain_forecast().await?;
            println!("Forecast: {} ({:.0}%)", other.name(), f.probability);
        }
    }

    if config.storage.persist {
        let path = config.db_path(data_dir.as_ref())?;
        Database::open(&path)?;
        println!("History: {}", path.display());
    } else {
        println!("History: in memory only");
    }

    Ok(())
}

fn print_history(db: &Database, device: Option<&str>, limit: usize) -> Result<()> {
    let records = db.recent_decisions(device, limit)?;
    if records.is_empty() {
        println!("No decisions recorded yet.");
        return Ok(());
    }

    println!(
        "{:<25} {:<14} {:>7} {:<8} {:>6} {:>6} {:>6} {:>5} {:>5}",
        "TIME", "DEVICE", "SCORE", "PUMP", "SOIL", "TEMP", "HUM", "RAIN", "POP"
    );
    for r in records {
        let score = r
            .score
            .map(|s| format!("{:.1}", s))
            .unwrap_or_else(|| "-".into());
        println!(
            "{:<25} {:<14} {:>7} {:<8} {:>6.1} {:>6.1} {:>6.1} {:>5} {:>5.0}{}",
            r.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            r.device_id,
            score,
            r.state.to_string(),
            r.reading.soil_moisture,
            r.reading.temperature,
            r.reading.humidity,
            if r.reading.is_raining { "yes" } else { "no" },
            r.rain_probability,
            if r.anomalies.is_empty() { "" } else { " !" }
        );
    }
    Ok(())
}
