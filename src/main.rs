//! # Portico CLI
//!
//! Dev harness for the Portico runtime.
//!
//! Usage:
//!   portico run                        # Boot a runtime, log events until Ctrl-C
//!   portico alarms list                # Show persisted alarms
//!   portico store get <key>            # Read from the durable store
//!   portico store set <key> <json>     # Write to the durable store
//!   portico config                     # Show configuration

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use portico_bridge::testing::InProcessExecutor;
use portico_core::PorticoConfig;
use portico_runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "portico",
    version,
    about = "Portico — native-bridge application runtime",
    long_about = "Typed events, fire-once bridge calls, durable storage, notifications,\nand alarms for embedded app runtimes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot a runtime with a loopback executor and log events until Ctrl-C
    Run,

    /// Inspect alarms
    Alarms {
        #[command(subcommand)]
        action: AlarmAction,
    },

    /// Poke the durable store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum AlarmAction {
    /// List persisted alarms
    List,
}

#[derive(Subcommand)]
enum StoreAction {
    /// Read a key from the local area
    Get { key: String },
    /// Write a JSON value to the local area
    Set { key: String, value: String },
}

/// Loopback executor: no native surfaces behind it, so every answer is the
/// honest "nothing happened natively" one, logged for inspection.
fn loopback_executor() -> Arc<InProcessExecutor> {
    let executor = Arc::new(InProcessExecutor::new());
    executor.register("Notifications", "create", |req| {
        tracing::info!("notification created: {}", req.args[0]);
        Ok(serde_json::Value::Null)
    });
    executor.register("Notifications", "update", |req| {
        tracing::info!("notification update requested: {}", req.args[0]);
        Ok(serde_json::json!(false))
    });
    executor.register("Notifications", "clear", |req| {
        tracing::info!("notification cleared: {}", req.args[0]);
        Ok(serde_json::json!(false))
    });
    executor.register("Alarms", "create", |req| {
        tracing::info!("native alarm requested: {}", req.args[0]);
        Ok(serde_json::Value::Null)
    });
    executor.register("Alarms", "clear", |req| {
        tracing::info!("native alarm cleared: {}", req.args[0]);
        Ok(serde_json::Value::Null)
    });
    executor
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "portico=debug,portico_core=debug,portico_runtime=debug,portico_alarms=debug"
    } else {
        "portico=info,portico_runtime=info,portico_alarms=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load config
    let config = if let Some(path) = &cli.config {
        PorticoConfig::load_from(std::path::Path::new(path))?
    } else {
        PorticoConfig::load()?
    };

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Alarms { action } => alarms(config, action).await,
        Commands::Store { action } => store(config, action).await,
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: PorticoConfig) -> Result<()> {
    let runtime = Runtime::new(config, loopback_executor())?;
    runtime.startup().await?;

    runtime
        .alarms()
        .on_alarm
        .add_listener(|alarm: &portico_alarms::Alarm| {
            tracing::info!(
                "alarm '{}' fired (scheduled for {})",
                alarm.name,
                alarm.scheduled_time
            );
        });
    runtime.notifications().on_clicked.add_listener(|id: &String| {
        tracing::info!("notification '{id}' clicked");
    });
    runtime
        .notifications()
        .on_closed
        .add_listener(|(id, by_user): &(String, bool)| {
            tracing::info!("notification '{id}' closed (by_user={by_user})");
        });

    tracing::info!("running; press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

async fn alarms(config: PorticoConfig, action: AlarmAction) -> Result<()> {
    let runtime = Runtime::new(config, loopback_executor())?;
    match action {
        AlarmAction::List => {
            let alarms = runtime.alarms().persisted().await?;
            if alarms.is_empty() {
                println!("no alarms");
            }
            for alarm in alarms {
                match alarm.period_in_minutes {
                    Some(period) => println!(
                        "{}\tnext {}\tevery {period} min",
                        alarm.name, alarm.scheduled_time
                    ),
                    None => println!("{}\tat {}", alarm.name, alarm.scheduled_time),
                }
            }
        }
    }
    Ok(())
}

async fn store(config: PorticoConfig, action: StoreAction) -> Result<()> {
    let runtime = Runtime::new(config, loopback_executor())?;
    let area = runtime.store().local();
    match action {
        StoreAction::Get { key } => match area.get_one(&key).await? {
            Some(value) => println!("{value}"),
            None => println!("(not set)"),
        },
        StoreAction::Set { key, value } => {
            let parsed: serde_json::Value = serde_json::from_str(&value)?;
            area.set_one(&key, parsed).await?;
            println!("ok");
        }
    }
    Ok(())
}
