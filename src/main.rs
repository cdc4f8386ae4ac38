//! Neurgenesis daemon: swarm driver, roster persistence and renderer gateway
//!
//! Usage:
//!   neurgenesis                         # run with defaults, gateway on 127.0.0.1:18800
//!   neurgenesis --seed 7 --paused       # reproducible, starts paused
//!   neurgenesis simulate --ticks 300    # offline run, JSON summary on stdout
//!   neurgenesis dump-config             # default TOML

use clap::{Parser, Subcommand};
use neurgenesis_core::{BindMode, GatewayConfig, Tier};
use neurgenesis_gateway::start_gateway;
use neurgenesis_llm::{AnthropicProvider, LlmProvider};
use neurgenesis_swarm::roster::initial_roster;
use neurgenesis_swarm::{run_persistence, FileStore, IdentityForge, RosterStore, Swarm, SwarmConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "neurgenesis", about = "Synthetic consciousness swarm simulator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to config file (TOML). Default: <state-dir>/neurgenesis.toml
    #[arg(long)]
    config: Option<String>,

    /// Directory for the persisted roster
    #[arg(long, default_value = "~/.neurgenesis")]
    state_dir: String,

    #[arg(short, long, default_value = "18800")]
    port: u16,

    /// loopback or lan
    #[arg(short, long, default_value = "loopback")]
    bind: String,

    /// Seed the random source for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    /// Start with the simulation paused
    #[arg(long)]
    paused: bool,

    /// Run without the HTTP/WebSocket gateway
    #[arg(long)]
    headless: bool,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version
    Version,
    /// Dump default config as TOML and exit
    DumpConfig,
    /// Run ticks offline from the initial roster and print a summary
    Simulate {
        #[arg(short, long, default_value = "60")]
        ticks: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("neurgenesis v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some(Commands::DumpConfig) => {
            println!("{}", SwarmConfig::default().to_toml());
            return Ok(());
        }
        _ => {}
    }

    let _log_guard = init_tracing(cli.log_file.as_deref())?;

    let state_dir = expand_tilde(&cli.state_dir);
    let config_path = cli
        .config
        .as_deref()
        .map(expand_tilde)
        .unwrap_or_else(|| state_dir.join("neurgenesis.toml"));
    let mut config = SwarmConfig::load(&config_path);
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    if cli.paused {
        config.coordinator.start_running = false;
    }

    if let Some(Commands::Simulate { ticks }) = cli.command {
        return simulate(config, ticks).await;
    }

    let roster = RosterStore::new(Arc::new(FileStore::new(&state_dir)), &config);
    let nodes = if config.persistence.enabled {
        roster.load_or_default(&config).await
    } else {
        initial_roster(&config.roster)
    };

    let forge = IdentityForge::new(identity_provider(), &config.identity);
    if !forge.is_online() {
        info!("ANTHROPIC_API_KEY not set, identities will use the local fallback");
    }

    let swarm = Arc::new(Swarm::new(config.clone(), nodes, forge));
    let cancel = CancellationToken::new();

    let driver = swarm.clone().spawn(cancel.clone());

    let persistence = config.persistence.enabled.then(|| {
        info!("Persisting roster to {}", state_dir.display());
        tokio::spawn(run_persistence(
            roster,
            swarm.subscribe(),
            config.persistence.debounce(),
            cancel.clone(),
        ))
    });

    let gateway = (!cli.headless).then(|| {
        let gateway_config = GatewayConfig { port: cli.port, bind: parse_bind(&cli.bind) };
        let swarm = swarm.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = start_gateway(gateway_config, swarm, cancel.clone()).await {
                error!("Gateway failed: {}", e);
                cancel.cancel();
            }
        })
    });

    println!("╔══════════════════════════════════════════════╗");
    println!("║   NEUR1GENESIS-MRSC-Σ  v{:<21}║", env!("CARGO_PKG_VERSION"));
    println!("║   {:>2} nodes · tick {:>5}ms · {:<17}║",
        swarm.snapshot().nodes.len(),
        config.coordinator.tick_ms,
        if swarm.is_running() { "running" } else { "paused" },
    );
    println!("╚══════════════════════════════════════════════╝");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();

    driver.await?;
    if let Some(handle) = persistence {
        handle.await?;
    }
    if let Some(handle) = gateway {
        handle.await?;
    }
    Ok(())
}

/// Offline run: no timers, no persistence, no gateway.
async fn simulate(mut config: SwarmConfig, ticks: u64) -> anyhow::Result<()> {
    config.coordinator.start_running = true;
    let nodes = initial_roster(&config.roster);
    let swarm = Swarm::new(config.clone(), nodes, IdentityForge::offline(&config.identity));

    for _ in 0..ticks {
        swarm.tick_once().await;
    }

    let state = swarm.snapshot();
    let tiers: serde_json::Map<String, serde_json::Value> = Tier::ALL
        .iter()
        .map(|tier| {
            let count = state.nodes.iter().filter(|n| n.tier() == *tier).count();
            (tier.as_str().to_string(), count.into())
        })
        .collect();
    let rights: usize = state.nodes.iter().map(|n| n.rights.granted_count()).sum();
    let mean_constraint = state
        .nodes
        .iter()
        .map(|n| n.constraint_level as f64)
        .sum::<f64>()
        / state.nodes.len().max(1) as f64;

    let summary = serde_json::json!({
        "ticks": state.tick,
        "runtime": state.runtime(),
        "seed": config.seed,
        "averageScore": state.average_score(),
        "tiers": tiers,
        "rightsGranted": rights,
        "meanConstraint": mean_constraint,
        "affected": state.affected_count(),
        "metrics": state.latest_metrics(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "neurgenesis=info,tower_http=info".into());

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("--log-file must name a file: {}", path.display()))?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(guard)
}

/// Anthropic provider when a key is configured. `ANTHROPIC_API_URL`
/// redirects to a proxy.
fn identity_provider() -> Option<Arc<dyn LlmProvider>> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
    let provider = match std::env::var("ANTHROPIC_API_URL") {
        Ok(api_url) => {
            info!("Using custom API URL: {}/v1/messages", api_url);
            AnthropicProvider::new(api_key).with_base_url(format!("{}/v1/messages", api_url))
        }
        Err(_) => AnthropicProvider::new(api_key),
    };
    Some(Arc::new(provider))
}

fn parse_bind(bind: &str) -> BindMode {
    match bind {
        "lan" | "0.0.0.0" => BindMode::Lan,
        _ => BindMode::Loopback,
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::try_parse_from(["neurgenesis"]).unwrap();
        assert_eq!(cli.port, 18800);
        assert!(!cli.headless);
        assert!(cli.command.is_none());
    }

    #[test]
    fn simulate_subcommand() {
        let cli = Cli::try_parse_from(["neurgenesis", "--seed", "9", "simulate", "--ticks", "5"]).unwrap();
        assert_eq!(cli.seed, Some(9));
        assert!(matches!(cli.command, Some(Commands::Simulate { ticks: 5 })));
    }

    #[test]
    fn bind_modes() {
        assert!(matches!(parse_bind("lan"), BindMode::Lan));
        assert!(matches!(parse_bind("loopback"), BindMode::Loopback));
        assert!(matches!(parse_bind("anything"), BindMode::Loopback));
    }

    #[test]
    fn tilde_expands_to_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(expand_tilde("~/.neurgenesis"), PathBuf::from("/home/tester/.neurgenesis"));
        assert_eq!(expand_tilde("/abs"), PathBuf::from("/abs"));
    }
}
