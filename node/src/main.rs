use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use barrage_attack::HttpAttacker;
use barrage_loadtest::{result_channel, Aggregator, LoadTest};
use barrage_registry::{Registry, RegistryConfig};
use barrage_resolver::{is_literal_url, DnsSrvLookup, Resolver, SrvLookup, StaticSrvLookup};
use barrage_server::{bind_listener, serve, ServerState};
use barrage_types::TargetSpec;
use clap::{value_parser, Arg, ArgAction, Command};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod version;

use config::{load_config_with_overrides, AppConfig, TargetPlan};
use version::{git_commit_hash, BARRAGE_VERSION};

fn command() -> Command {
    Command::new("barrage")
        .version(BARRAGE_VERSION)
        .about("Continuous HTTP load generator with live Prometheus results")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("version_flag")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print detailed version information and exit")
                .global(true),
        )
        .arg(
            Arg::new("listen")
                .short('l')
                .long("listen")
                .value_name("ADDR")
                .help("Address the metrics endpoint listens on"),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("NAME")
                .help("Load test name, attached to every series"),
        )
        .arg(
            Arg::new("rate")
                .long("rate")
                .value_name("N")
                .value_parser(value_parser!(u64))
                .help("Default requests per second per endpoint"),
        )
        .arg(
            Arg::new("duration-ms")
                .long("duration-ms")
                .value_name("MS")
                .value_parser(value_parser!(u64))
                .help("Default attack cycle duration in milliseconds"),
        )
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .value_name("NAME:LOCATOR")
                .value_parser(value_parser!(TargetSpec))
                .action(ArgAction::Append)
                .help("Target to attack; the locator is a URL or an SRV name (repeatable)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .subcommand(
            Command::new("status")
                .about("Query the /health endpoint of a running load test")
                .arg(
                    Arg::new("url")
                        .long("url")
                        .value_name("URL")
                        .default_value("http://127.0.0.1:7800/health")
                        .help("Health endpoint to query"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = command();
    let matches = cli.clone().get_matches();

    if matches.get_flag("version_flag") {
        println!("barrage {} ({})", BARRAGE_VERSION, git_commit_hash());
        return Ok(());
    }

    if let Some(status_matches) = matches.subcommand_matches("status") {
        let url = status_matches
            .get_one::<String>("url")
            .map(|value| value.as_str())
            .unwrap_or("http://127.0.0.1:7800/health");
        return check_status(url).await;
    }

    let config = match load_config_with_overrides(&matches) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}\n");
            eprintln!("{}", cli.render_usage());
            std::process::exit(2);
        }
    };

    init_logging(&config)?;
    info!(
        "Starting barrage {} ({}) for load test {}",
        BARRAGE_VERSION,
        git_commit_hash(),
        config.name
    );

    if let Err(err) = run(config).await {
        error!("Load test failed: {:#}", err);
        return Err(err);
    }
    Ok(())
}

async fn run(config: AppConfig) -> Result<()> {
    let conventions = config.conventions()?;
    let targets = config.targets()?;

    let resolver = Resolver::new(srv_lookup(&targets)?, &conventions);
    let mut load_test = LoadTest::new(config.name.clone(), conventions.clone())?;
    if let Some(rate) = config.rate {
        load_test.set_rate(rate)?;
    }
    if let Some(duration) = config.duration() {
        load_test.set_duration(duration)?;
    }

    for target in targets {
        let resolved = resolver
            .resolve_target(&target.spec)
            .await
            .with_context(|| format!("failed to resolve target {}", target.spec))?;
        load_test
            .register_with(&resolved.name, resolved.endpoints, target.overrides)
            .with_context(|| format!("failed to register target {}", target.spec.name))?;
    }

    let registry = Registry::new(load_test.name(), &conventions, &RegistryConfig::default())?;
    let (sink, receiver) = result_channel(config.channel_capacity);
    let aggregator = Aggregator::new(receiver, registry);
    let server_state = ServerState::new(
        aggregator.reader(),
        load_test.name(),
        load_test.layers().len(),
        load_test.endpoint_count(),
    );
    let listener = bind_listener(&config.listen).await?;
    let aggregating = tokio::spawn(aggregator.run());

    let generator = Arc::new(HttpAttacker::new(config.attacker_config())?);
    let loops = load_test.run(generator, sink)?;

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(serve(server_state, listener, shutdown.clone()));

    let server_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Shutdown requested");
            None
        }
        result = &mut server => Some(result),
    };

    loops.shutdown().await;
    let report = aggregating.await.context("aggregator task failed")?;
    info!(
        "Aggregated {} results with {} registry upkeeps",
        report.folded, report.upkeeps
    );

    match server_result {
        Some(result) => result.context("metrics server task failed")?,
        None => {
            shutdown.cancel();
            match tokio::time::timeout(Duration::from_secs(5), server).await {
                Ok(result) => result.context("metrics server task failed")?,
                Err(_) => {
                    warn!("Metrics server did not stop within 5s");
                    Ok(())
                }
            }
        }
    }
}

/// System DNS is only consulted when some target is not a literal URL.
fn srv_lookup(targets: &[TargetPlan]) -> Result<Arc<dyn SrvLookup>> {
    if targets
        .iter()
        .all(|target| is_literal_url(&target.spec.locator))
    {
        return Ok(Arc::new(StaticSrvLookup::new()));
    }
    Ok(Arc::new(DnsSrvLookup::from_system_conf()?))
}

async fn check_status(url: &str) -> Result<()> {
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("GET {url}"))?;
    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("parse health response from {url}"))?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        anyhow::bail!("health endpoint returned {status}");
    }
    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}
